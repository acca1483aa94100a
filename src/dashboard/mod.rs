//! Dashboard
//!
//! Summary fields and chart series computed from the managers' in-memory
//! lists. Rendering never fetches; reloads go through the managers.

pub mod metrics;

pub use metrics::DashboardMetrics;

use crate::domain::types::same_label;
use crate::domain::Managers;
use crate::view::{format, ChartSeries, ViewSink};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Summary field element ids
pub const TOTAL_EMPLOYEES_FIELD: &str = "totalEmpleados";
pub const MONTH_HOURS_FIELD: &str = "horasMes";
pub const MONTH_PAYROLL_FIELD: &str = "nominaMes";
pub const AVERAGE_HOURS_FIELD: &str = "promedioHoras";

/// Chart canvas ids
pub const HOURS_CHART: &str = "chartHoras";
pub const PAYROLL_CHART: &str = "chartNomina";
pub const DEPARTMENTS_CHART: &str = "chartDepartamentos";

const UNASSIGNED: &str = "Sin departamento";

pub struct Dashboard {
    managers: Managers,
}

impl Dashboard {
    pub fn new(managers: Managers) -> Self {
        Self { managers }
    }

    pub fn managers(&self) -> &Managers {
        &self.managers
    }

    pub fn compute_metrics(&self, today: NaiveDate) -> DashboardMetrics {
        DashboardMetrics::compute(
            &self.managers.employees.employees(),
            &self.managers.hours.entries(),
            &self.managers.payroll.entries(),
            today,
        )
    }

    /// Write the four summary fields
    pub fn render(&self, sink: &dyn ViewSink, today: NaiveDate) {
        let metrics = self.compute_metrics(today);
        sink.set_text(TOTAL_EMPLOYEES_FIELD, &metrics.active_employees.to_string());
        sink.set_text(MONTH_HOURS_FIELD, &format::hours(metrics.month_hours));
        sink.set_text(MONTH_PAYROLL_FIELD, &format::money(metrics.month_payroll));
        sink.set_text(AVERAGE_HOURS_FIELD, &format::hours(metrics.average_hours));
    }

    /// Hours this month per employee
    pub fn hours_chart(&self, today: NaiveDate) -> ChartSeries {
        self.managers
            .hours
            .hours_by_employee(today)
            .into_iter()
            .fold(ChartSeries::new("Horas del mes"), |series, (id, hours)| {
                series.point(self.managers.employees.display_name(&id), hours)
            })
    }

    /// Payroll totals for the last twelve months, oldest first
    pub fn payroll_chart(&self, today: NaiveDate) -> ChartSeries {
        self.managers
            .payroll
            .totals_by_month(today)
            .into_iter()
            .fold(ChartSeries::new("Nómina mensual"), |series, ((year, month), total)| {
                series.point(format!("{}/{}", month, year), total)
            })
    }

    /// Active headcount per department
    pub fn departments_chart(&self) -> ChartSeries {
        let mut counts: BTreeMap<String, f64> = self
            .managers
            .departments
            .departments()
            .into_iter()
            .map(|d| (d.name, 0.0))
            .collect();

        for employee in self.managers.employees.employees() {
            if !employee.is_active() {
                continue;
            }
            let department = employee.department.trim();
            let key = counts
                .keys()
                .find(|name| same_label(name, department))
                .cloned()
                .unwrap_or_else(|| {
                    if department.is_empty() {
                        UNASSIGNED.to_string()
                    } else {
                        department.to_string()
                    }
                });
            *counts.entry(key).or_insert(0.0) += 1.0;
        }

        counts
            .into_iter()
            .fold(ChartSeries::new("Empleados por departamento"), |series, (name, n)| {
                series.point(name, n)
            })
    }

    pub fn render_charts(&self, sink: &dyn ViewSink, today: NaiveDate) {
        sink.draw_chart(HOURS_CHART, self.hours_chart(today));
        sink.draw_chart(PAYROLL_CHART, self.payroll_chart(today));
        sink.draw_chart(DEPARTMENTS_CHART, self.departments_chart());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing::{admin_context, date};
    use crate::domain::{Department, Employee, EmployeeStatus, HourEntry, PayrollEntry};

    #[tokio::test]
    async fn test_render_summary_fields() {
        let ctx = admin_context().await;
        let ana = ctx
            .employees
            .add(Employee::new("1", "Ana", "Torres", date(2023, 1, 9)))
            .await
            .unwrap();
        ctx.hours
            .add(HourEntry::new(&ana.id, date(2024, 3, 4), "22:00", "02:00"))
            .await
            .unwrap();
        ctx.payroll
            .add(PayrollEntry::new(&ana.id, 3, 2024, 1500.0))
            .await
            .unwrap();

        let dashboard = Dashboard::new(ctx.managers.clone());
        dashboard.render(&*ctx.sink, date(2024, 3, 15));

        assert_eq!(ctx.sink.text(TOTAL_EMPLOYEES_FIELD).as_deref(), Some("1"));
        assert_eq!(ctx.sink.text(MONTH_HOURS_FIELD).as_deref(), Some("4.0"));
        assert_eq!(ctx.sink.text(MONTH_PAYROLL_FIELD).as_deref(), Some("$1,500.00"));
        assert_eq!(ctx.sink.text(AVERAGE_HOURS_FIELD).as_deref(), Some("4.0"));
    }

    #[tokio::test]
    async fn test_empty_dashboard_is_neutral() {
        let ctx = admin_context().await;
        let dashboard = Dashboard::new(ctx.managers.clone());

        assert_eq!(dashboard.compute_metrics(date(2024, 3, 1)), DashboardMetrics::default());
        dashboard.render(&*ctx.sink, date(2024, 3, 1));
        assert_eq!(ctx.sink.text(AVERAGE_HOURS_FIELD).as_deref(), Some("0.0"));
    }

    #[tokio::test]
    async fn test_charts() {
        let ctx = admin_context().await;
        ctx.departments.add(Department::new("Ventas")).await.unwrap();
        ctx.departments.add(Department::new("Compras")).await.unwrap();
        ctx.employees
            .add(Employee::new("1", "Ana", "Torres", date(2023, 1, 9)).department("ventas"))
            .await
            .unwrap();
        ctx.employees
            .add(
                Employee::new("2", "Luis", "Paz", date(2023, 1, 9))
                    .department("Ventas")
                    .status(EmployeeStatus::Inactive),
            )
            .await
            .unwrap();
        ctx.employees
            .add(Employee::new("3", "Eva", "Ruiz", date(2023, 1, 9)))
            .await
            .unwrap();

        let dashboard = Dashboard::new(ctx.managers.clone());
        dashboard.render_charts(&*ctx.sink, date(2024, 3, 15));

        let departments = ctx.sink.chart(DEPARTMENTS_CHART).unwrap();
        assert_eq!(departments.labels, vec!["Compras", "Sin departamento", "Ventas"]);
        assert_eq!(departments.values, vec![0.0, 1.0, 1.0]);

        let payroll = ctx.sink.chart(PAYROLL_CHART).unwrap();
        assert_eq!(payroll.len(), 12);
        assert_eq!(payroll.labels.first().map(String::as_str), Some("04/2023"));
        assert_eq!(payroll.labels.last().map(String::as_str), Some("03/2024"));

        assert!(ctx.sink.chart(HOURS_CHART).unwrap().is_empty());
        assert_eq!(ctx.sink.chart_draws(), 3);
    }
}
