//! Aggregate metrics
//!
//! Derived from the in-memory lists on demand, never persisted.

use crate::domain::hours::month_hours;
use crate::domain::payroll::month_total;
use crate::domain::{Employee, HourEntry, PayrollEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Dashboard summary for one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub active_employees: usize,
    pub month_hours: f64,
    pub month_payroll: f64,
    /// Month hours per active employee, one decimal
    pub average_hours: f64,
}

impl DashboardMetrics {
    pub fn compute(
        employees: &[Employee],
        hours: &[HourEntry],
        payroll: &[PayrollEntry],
        today: NaiveDate,
    ) -> Self {
        let active_employees = employees.iter().filter(|e| e.is_active()).count();
        let month_hours = month_hours(hours, today);
        let month_payroll = month_total(payroll, today);

        let average_hours = if active_employees == 0 {
            0.0
        } else {
            round1(month_hours / active_employees as f64)
        };

        Self {
            active_employees,
            month_hours,
            month_payroll,
            average_hours,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{compute_hours, EmployeeStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shift(employee: &str, day: NaiveDate, entry: &str, exit: &str) -> HourEntry {
        let mut e = HourEntry::new(employee, day, entry, exit);
        e.hours = compute_hours(entry, exit).unwrap();
        e
    }

    #[test]
    fn test_metrics_for_month() {
        let today = date(2024, 3, 20);
        let employees = vec![
            Employee::new("1", "Ana", "Torres", date(2020, 1, 1)),
            Employee::new("2", "Luis", "Paz", date(2020, 1, 1)),
            Employee::new("3", "Eva", "Ruiz", date(2020, 1, 1)).status(EmployeeStatus::Suspended),
        ];
        let hours = vec![
            shift("1", date(2024, 3, 1), "08:00", "16:00"),
            shift("2", date(2024, 3, 2), "22:00", "02:00"),
            shift("2", date(2024, 2, 28), "08:00", "18:00"),
        ];
        let mut payroll = vec![
            PayrollEntry::new("1", 3, 2024, 1000.0),
            PayrollEntry::new("2", 3, 2024, 800.0),
            PayrollEntry::new("2", 2, 2024, 800.0),
        ];
        for p in &mut payroll {
            p.total = p.base_salary;
        }

        let metrics = DashboardMetrics::compute(&employees, &hours, &payroll, today);
        assert_eq!(
            metrics,
            DashboardMetrics {
                active_employees: 2,
                month_hours: 12.0,
                month_payroll: 1800.0,
                average_hours: 6.0,
            }
        );
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        let today = date(2024, 3, 20);
        let employees = vec![
            Employee::new("1", "A", "A", date(2020, 1, 1)),
            Employee::new("2", "B", "B", date(2020, 1, 1)),
            Employee::new("3", "C", "C", date(2020, 1, 1)),
        ];
        let hours = vec![shift("1", date(2024, 3, 1), "08:00", "18:00")];

        let metrics = DashboardMetrics::compute(&employees, &hours, &[], today);
        assert_eq!(metrics.average_hours, 3.3);
    }

    #[test]
    fn test_zero_active_employees() {
        let today = date(2024, 3, 20);
        let employees = vec![
            Employee::new("1", "A", "A", date(2020, 1, 1)).status(EmployeeStatus::Inactive),
        ];
        let hours = vec![shift("1", date(2024, 3, 1), "08:00", "12:00")];

        let metrics = DashboardMetrics::compute(&employees, &hours, &[], today);
        assert_eq!(metrics.active_employees, 0);
        assert_eq!(metrics.month_hours, 4.0);
        assert_eq!(metrics.average_hours, 0.0);
    }
}
