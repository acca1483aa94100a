//! Benchmarks for dashboard aggregation and local snapshots
//!
//! Run with: cargo bench

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nomina::dashboard::DashboardMetrics;
use nomina::domain::{compute_hours, Employee, EmployeeStatus, HourEntry, PayrollEntry};
use nomina::storage::{KeyValueStore, SqliteStore};
use tempfile::tempdir;

fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days((offset % 365) as i64)
}

fn create_employees(count: usize) -> Vec<Employee> {
    (0..count)
        .map(|i| {
            let status = if i % 10 == 0 {
                EmployeeStatus::Inactive
            } else {
                EmployeeStatus::Active
            };
            Employee::new(format!("{:010}", i), "Nombre", "Apellido", day(i)).status(status)
        })
        .collect()
}

fn create_hours(count: usize) -> Vec<HourEntry> {
    (0..count)
        .map(|i| {
            let mut entry = HourEntry::new(format!("e{}", i % 50), day(i), "22:00", "06:30");
            entry.hours = 8.5;
            entry
        })
        .collect()
}

fn create_payroll(count: usize) -> Vec<PayrollEntry> {
    (0..count)
        .map(|i| {
            let mut entry = PayrollEntry::new(format!("e{}", i % 50), (i % 12) as u32 + 1, 2024, 1000.0);
            entry.total = 1000.0;
            entry
        })
        .collect()
}

fn bench_compute_hours(c: &mut Criterion) {
    c.bench_function("compute_hours_overnight", |b| {
        b.iter(|| compute_hours(black_box("22:15"), black_box("06:45")).unwrap())
    });
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

    for size in [100, 1000, 10000] {
        let employees = create_employees(size / 10);
        let hours = create_hours(size);
        let payroll = create_payroll(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("compute_{}", size), |b| {
            b.iter(|| {
                DashboardMetrics::compute(
                    black_box(&employees),
                    black_box(&hours),
                    black_box(&payroll),
                    today,
                )
            })
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let dir = tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("bench.db")).unwrap();

    for size in [100, 1000] {
        let json = serde_json::to_string(&create_hours(size)).unwrap();

        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_function(format!("write_{}", size), |b| {
            b.iter(|| store.set(black_box("hours_bench"), black_box(&json)).unwrap())
        });
        group.bench_function(format!("read_{}", size), |b| {
            b.iter(|| store.get(black_box("hours_bench")).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_hours, bench_metrics, bench_snapshot);
criterion_main!(benches);
