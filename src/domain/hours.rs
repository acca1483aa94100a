//! Timesheets
//!
//! Hours are derived from the entry and exit time of day. An exit earlier
//! than the entry belongs to the next day (overnight shift).

use crate::auth::{permissions, SessionReconciler};
use crate::domain::employees::EmployeeManager;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::records::{LoadSource, RecordSet};
use crate::domain::types::HourEntry;
use crate::storage::Backends;
use crate::view::{format, TableRow, ViewSink};
use chrono::{Datelike, NaiveDate, NaiveTime};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Container the timesheet table renders into
pub const HOURS_TABLE: &str = "tablaHoras";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Parse "HH:MM" (seconds tolerated)
pub fn parse_time(value: &str) -> DomainResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| DomainError::Invalid {
            kind: "time",
            reason: format!("'{}' is not a HH:MM time", value),
        })
}

/// Hours between two times of day, wrapping past midnight
pub fn compute_hours(entry: &str, exit: &str) -> DomainResult<f64> {
    let start = parse_time(entry)?;
    let end = parse_time(exit)?;

    let mut seconds = end.signed_duration_since(start).num_seconds();
    if seconds < 0 {
        seconds += SECONDS_PER_DAY;
    }
    Ok(round2(seconds as f64 / 3600.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether `date` falls in the month of `today`
pub fn same_month(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() && date.month() == today.month()
}

/// Timesheet manager
pub struct HourManager {
    records: RecordSet<HourEntry>,
    reconciler: Arc<SessionReconciler>,
    employees: Arc<EmployeeManager>,
}

impl HourManager {
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

    /// Reload entries for the signed-in user
    pub async fn load_data(&self) -> DomainResult<LoadSource> {
        match self.reconciler.require_permission(permissions::VIEW_DASHBOARD) {
            Ok(user) => self.records.load(&user.id).await,
            Err(e) => {
                self.records.clear();
                Err(e.into())
            }
        }
    }

    pub fn entries(&self) -> Vec<HourEntry> {
        self.records.items()
    }

    /// Record a shift; `hours` is computed from the times
    pub async fn add(&self, mut entry: HourEntry) -> DomainResult<HourEntry> {
        let owner = self.scope(permissions::LOG_HOURS).await?;

        self.employees.ensure_loaded(&owner).await?;
        if self.employees.find(&entry.employee_id).is_none() {
            return Err(DomainError::NotFound {
                kind: "employee",
                id: entry.employee_id,
            });
        }

        entry.hours = compute_hours(&entry.entry_time, &entry.exit_time)?;
        let entry = self.records.insert(&owner, entry).await?;
        tracing::info!(
            employee = %entry.employee_id,
            date = %entry.date,
            hours = entry.hours,
            "Hours recorded"
        );
        Ok(entry)
    }

    pub async fn remove(&self, id: &str) -> DomainResult<HourEntry> {
        let owner = self.scope(permissions::MANAGE_HOURS).await?;
        self.records.remove(&owner, id).await
    }

    /// Sum of hours with a date in the month of `today`
    pub fn month_hours(&self, today: NaiveDate) -> f64 {
        self.records.with_items(|items| month_hours(items, today))
    }

    /// Hours per employee id in the month of `today`
    pub fn hours_by_employee(&self, today: NaiveDate) -> BTreeMap<String, f64> {
        self.records.with_items(|items| {
            let mut totals = BTreeMap::new();
            for entry in items.iter().filter(|e| same_month(e.date, today)) {
                *totals.entry(entry.employee_id.clone()).or_insert(0.0) += entry.hours;
            }
            totals
        })
    }

    /// Rows newest first
    pub fn rows(&self) -> Vec<TableRow> {
        let mut entries = self.entries();
        entries.sort_by(|a, b| b.date.cmp(&a.date).then(b.entry_time.cmp(&a.entry_time)));

        entries
            .iter()
            .map(|entry| {
                vec![
                    format::date(entry.date),
                    self.employees.display_name(&entry.employee_id),
                    entry.entry_time.clone(),
                    entry.exit_time.clone(),
                    format::hours(entry.hours),
                ]
            })
            .collect()
    }

    pub fn render(&self, sink: &dyn ViewSink) {
        sink.replace_children(HOURS_TABLE, self.rows());
    }
}

/// Sum of `hours` for entries in the month of `today`
pub fn month_hours(entries: &[HourEntry], today: NaiveDate) -> f64 {
    entries
        .iter()
        .filter(|e| same_month(e.date, today))
        .map(|e| e.hours)
        .sum()
}
