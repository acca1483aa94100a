//! Payroll entries
//!
//! Totals are stored with each entry; month and year are kept as the
//! zero-padded strings older snapshots use.

use crate::auth::{permissions, SessionReconciler};
use crate::domain::employees::EmployeeManager;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::records::{LoadSource, RecordSet};
use crate::domain::types::PayrollEntry;
use crate::storage::Backends;
use crate::view::{format, TableRow, ViewSink};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

/// Container the payroll table renders into
pub const PAYROLL_TABLE: &str = "tablaNomina";

/// "MM" and "YYYY" for the month of `date`
pub fn period_of(date: NaiveDate) -> (String, String) {
    (format!("{:02}", date.month()), date.year().to_string())
}

/// Sum of totals for the month of `today`
pub fn month_total(entries: &[PayrollEntry], today: NaiveDate) -> f64 {
    let (month, year) = period_of(today);
    entries
        .iter()
        .filter(|e| e.is_period(&month, &year))
        .map(|e| e.total)
        .sum()
}

fn entry_total(entry: &PayrollEntry) -> f64 {
    let total = entry.base_salary + entry.overtime + entry.bonuses - entry.deductions;
    (total * 100.0).round() / 100.0
}

pub struct PayrollManager {
    records: RecordSet<PayrollEntry>,
    reconciler: Arc<SessionReconciler>,
    employees: Arc<EmployeeManager>,
}

impl PayrollManager {
    pub fn new(
        backends: Backends,
        reconciler: Arc<SessionReconciler>,
        employees: Arc<EmployeeManager>,
    ) -> Self {
        Self {
            records: RecordSet::new(backends),
            reconciler,
            employees,
        }
    }

    async fn scope(&self, permission: &str) -> DomainResult<String> {
        let user = self.reconciler.require_permission(permission)?;
        self.records.ensure_owner(&user.id).await?;
        Ok(user.id)
    }

    /// Reload payroll for the signed-in user; needs payroll visibility
    pub async fn load_data(&self) -> DomainResult<LoadSource> {
        match self.reconciler.require_permission(permissions::VIEW_PAYROLL) {
            Ok(user) => self.records.load(&user.id).await,
            Err(e) => {
                self.records.clear();
                Err(e.into())
            }
        }
    }

    pub fn entries(&self) -> Vec<PayrollEntry> {
        self.records.items()
    }

    /// Entries for one period, e.g. ("03", "2024")
    pub fn entries_for(&self, month: &str, year: &str) -> Vec<PayrollEntry> {
        self.records.with_items(|items| {
            items
                .iter()
                .filter(|e| e.is_period(month, year))
                .cloned()
                .collect()
        })
    }

    pub async fn add(&self, mut entry: PayrollEntry) -> DomainResult<PayrollEntry> {
        let owner = self.scope(permissions::MANAGE_PAYROLL).await?;

        self.employees.ensure_loaded(&owner).await?;
        if self.employees.find(&entry.employee_id).is_none() {
            return Err(DomainError::NotFound {
                kind: "employee",
                id: entry.employee_id,
            });
        }

        entry.total = entry_total(&entry);
        let entry = self.records.insert(&owner, entry).await?;
        tracing::info!(
            employee = %entry.employee_id,
            period = %entry.period(),
            total = entry.total,
            "Payroll entry added"
        );
        Ok(entry)
    }

    pub async fn remove(&self, id: &str) -> DomainResult<PayrollEntry> {
        let owner = self.scope(permissions::MANAGE_PAYROLL).await?;
        self.records.remove(&owner, id).await
    }

    pub fn month_total(&self, today: NaiveDate) -> f64 {
        self.records.with_items(|items| month_total(items, today))
    }

    /// Totals keyed by (year, month) for the twelve months ending with `today`
    pub fn totals_by_month(&self, today: NaiveDate) -> BTreeMap<(String, String), f64> {
        let mut periods = BTreeMap::new();
        let mut year = today.year();
        let mut month = today.month();
        for _ in 0..12 {
            periods.insert((year.to_string(), format!("{:02}", month)), 0.0);
            if month == 1 {
                month = 12;
                year -= 1;
            } else {
                month -= 1;
            }
        }

        self.records.with_items(|items| {
            for entry in items {
                if let Some(total) = periods.get_mut(&(entry.year.clone(), entry.month.clone())) {
                    *total += entry.total;
                }
            }
        });
        periods
    }

    /// Write entries as CSV
    pub fn export_csv<W: Write>(&self, writer: W, period: Option<(&str, &str)>) -> DomainResult<usize> {
        self.reconciler
            .require_permission(permissions::EXPORT_PAYROLL)?;

        let entries = match period {
            Some((month, year)) => self.entries_for(month, year),
            None => self.entries(),
        };

        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "period",
            "cedula",
            "employee",
            "base_salary",
            "overtime",
            "bonuses",
            "deductions",
            "total",
        ])?;
        for entry in &entries {
            let employee = self.employees.find(&entry.employee_id);
            csv.write_record([
                entry.period(),
                employee.as_ref().map(|e| e.cedula.clone()).unwrap_or_default(),
                employee
                    .map(|e| e.full_name())
                    .unwrap_or_else(|| entry.employee_id.clone()),
                format!("{:.2}", entry.base_salary),
                format!("{:.2}", entry.overtime),
                format!("{:.2}", entry.bonuses),
                format!("{:.2}", entry.deductions),
                format!("{:.2}", entry.total),
            ])?;
        }
        csv.flush().map_err(|e| DomainError::Export(e.to_string()))?;
        Ok(entries.len())
    }

    pub fn rows(&self) -> Vec<TableRow> {
        let mut entries = self.entries();
        entries.sort_by(|a, b| (&b.year, &b.month).cmp(&(&a.year, &a.month)));

        entries
            .iter()
            .map(|e| {
                vec![
                    e.period(),
                    self.employees.display_name(&e.employee_id),
                    format::money(e.base_salary),
                    format::money(e.overtime),
                    format::money(e.bonuses),
                    format::money(e.deductions),
                    format::money(e.total),
                ]
            })
            .collect()
    }

    pub fn render(&self, sink: &dyn ViewSink) {
        sink.replace_children(PAYROLL_TABLE, self.rows());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, Role};
    use crate::domain::testing::{admin_context, context_with_role, date};
    use crate::domain::types::Employee;

    #[test]
    fn test_month_total_matches_padded_period() {
        let today = date(2024, 3, 15);
        let mut entries = vec![
            PayrollEntry::new("e1", 3, 2024, 1000.0),
            PayrollEntry::new("e2", 3, 2024, 500.0),
            PayrollEntry::new("e1", 2, 2024, 999.0),
            PayrollEntry::new("e1", 3, 2023, 999.0),
        ];
        for entry in &mut entries {
            entry.total = entry.base_salary;
        }
        // Unpadded month strings never match
        let mut legacy = PayrollEntry::new("e3", 3, 2024, 50.0);
        legacy.month = "3".to_string();
        legacy.total = 50.0;
        entries.push(legacy);

        assert_eq!(month_total(&entries, today), 1500.0);
    }

    #[tokio::test]
    async fn test_add_computes_total() {
        let ctx = admin_context().await;
        let ana = ctx
            .employees
            .add(Employee::new("1", "Ana", "Torres", date(2023, 1, 9)))
            .await
            .unwrap();

        let entry = ctx
            .payroll
            .add(
                PayrollEntry::new(&ana.id, 3, 2024, 1000.0)
                    .overtime(120.5)
                    .bonuses(50.0)
                    .deductions(94.5),
            )
            .await
            .unwrap();

        assert_eq!(entry.total, 1076.0);
        assert_eq!(ctx.payroll.month_total(date(2024, 3, 1)), 1076.0);
        assert_eq!(ctx.payroll.entries_for("03", "2024").len(), 1);

        let by_month = ctx.payroll.totals_by_month(date(2024, 4, 2));
        assert_eq!(by_month.len(), 12);
        assert_eq!(by_month[&("2024".to_string(), "03".to_string())], 1076.0);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let ctx = admin_context().await;
        let ana = ctx
            .employees
            .add(Employee::new("0102", "Ana", "Torres", date(2023, 1, 9)))
            .await
            .unwrap();
        ctx.payroll
            .add(PayrollEntry::new(&ana.id, 3, 2024, 1000.0))
            .await
            .unwrap();

        let mut out = Vec::new();
        let written = ctx.payroll.export_csv(&mut out, Some(("03", "2024"))).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(written, 1);
        assert!(text.starts_with("period,cedula,employee"));
        assert!(text.contains("03/2024,0102,Ana Torres,1000.00,0.00,0.00,0.00,1000.00"));
    }

    #[tokio::test]
    async fn test_empleado_cannot_see_payroll() {
        let ctx = context_with_role(Role::Empleado).await;
        let err = ctx.payroll.load_data().await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(AuthError::Forbidden(_))));
        assert!(ctx.payroll.entries().is_empty());
    }
}
