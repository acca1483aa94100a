//! Fixtures shared by the manager tests

use crate::auth::{AuthConfig, Credential, MemoryIdentityProvider, Role, SessionReconciler};
use crate::domain::{DepartmentManager, EmployeeManager, HourManager, Managers, PayrollManager};
use crate::storage::{Backends, MemoryDocumentStore};
use crate::view::MemorySink;
use chrono::NaiveDate;
use std::sync::Arc;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub struct TestContext {
    pub backends: Backends,
    pub remote: Arc<MemoryDocumentStore>,
    pub provider: Arc<MemoryIdentityProvider>,
    pub reconciler: Arc<SessionReconciler>,
    pub sink: Arc<MemorySink>,
    pub managers: Managers,
    pub employees: Arc<EmployeeManager>,
    pub departments: Arc<DepartmentManager>,
    pub hours: Arc<HourManager>,
    pub payroll: Arc<PayrollManager>,
}

/// Signed in as `role`, with in-memory backends and no session expiry
pub async fn context_with_role(role: Role) -> TestContext {
    let (backends, remote) = Backends::in_memory();
    let provider = Arc::new(MemoryIdentityProvider::new());
    let email = format!("{}@empresa.test", role);
    provider.add_account(&email, "secreto", role);

    let sink = Arc::new(MemorySink::new());
    let reconciler = SessionReconciler::builder(backends.local.clone())
        .provider(provider.clone())
        .sink(sink.clone())
        .config(AuthConfig {
            session_timeout: None,
            mirror_legacy_keys: true,
        })
        .build();
    reconciler.check_auth_status().await;
    reconciler
        .login(&Credential::new(email, "secreto"))
        .await
        .unwrap();

    let managers = Managers::new(backends.clone(), reconciler.clone());
    TestContext {
        backends,
        remote,
        provider,
        reconciler,
        sink,
        employees: managers.employees.clone(),
        departments: managers.departments.clone(),
        hours: managers.hours.clone(),
        payroll: managers.payroll.clone(),
        managers,
    }
}

pub async fn admin_context() -> TestContext {
    context_with_role(Role::Admin).await
}
