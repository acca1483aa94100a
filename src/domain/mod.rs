//! Business records and their managers
//!
//! Every manager holds one in-memory list scoped to the signed-in user,
//! loads it remote-first with the local snapshot as fallback, and renders
//! it as table rows.
//!
//! - **types**: `Employee`, `HourEntry`, `PayrollEntry`, `Department`
//! - **records**: the shared load/save machinery
//! - **employees**, **departments**, **hours**, **payroll**: managers
//! - **error**: error types

pub mod departments;
pub mod employees;
pub mod error;
pub mod hours;
pub mod payroll;
pub mod records;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use departments::{DepartmentManager, DEPARTMENTS_TABLE};
pub use employees::{EmployeeManager, EMPLOYEES_TABLE};
pub use error::{DomainError, DomainResult};
pub use hours::{compute_hours, HourManager, HOURS_TABLE};
pub use payroll::{PayrollManager, PAYROLL_TABLE};
pub use records::{LoadSource, RecordSet};
pub use types::{Department, Employee, EmployeeStatus, HourEntry, PayrollEntry, Record};

use crate::auth::SessionReconciler;
use crate::storage::Backends;
use std::sync::Arc;

/// All four managers wired to the same backends and reconciler
#[derive(Clone)]
pub struct Managers {
    pub employees: Arc<EmployeeManager>,
    pub departments: Arc<DepartmentManager>,
    pub hours: Arc<HourManager>,
    pub payroll: Arc<PayrollManager>,
}

impl Managers {
    pub fn new(backends: Backends, reconciler: Arc<SessionReconciler>) -> Self {
        let employees = Arc::new(EmployeeManager::new(backends.clone(), reconciler.clone()));
        Self {
            departments: Arc::new(DepartmentManager::new(
                backends.clone(),
                reconciler.clone(),
                employees.clone(),
            )),
            hours: Arc::new(HourManager::new(
                backends.clone(),
                reconciler.clone(),
                employees.clone(),
            )),
            payroll: Arc::new(PayrollManager::new(backends, reconciler, employees.clone())),
            employees,
        }
    }
}
