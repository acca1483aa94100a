//! Department management
//!
//! Names are unique per owner (case-insensitive). A department that still
//! has employees assigned cannot be removed.

use crate::auth::{permissions, SessionReconciler};
use crate::domain::employees::EmployeeManager;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::records::{LoadSource, RecordSet};
use crate::domain::types::Department;
use crate::storage::Backends;
use crate::view::{TableRow, ViewSink};
use std::sync::Arc;

/// Container the department table renders into
pub const DEPARTMENTS_TABLE: &str = "tablaDepartamentos";

pub struct DepartmentManager {
    records: RecordSet<Department>,
    reconciler: Arc<SessionReconciler>,
    employees: Arc<EmployeeManager>,
}

impl DepartmentManager {
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

    pub async fn load_data(&self) -> DomainResult<LoadSource> {
        match self.reconciler.require_permission(permissions::VIEW_DASHBOARD) {
            Ok(user) => self.records.load(&user.id).await,
            Err(e) => {
                self.records.clear();
                Err(e.into())
            }
        }
    }

    pub fn departments(&self) -> Vec<Department> {
        self.records.items()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Department> {
        self.records
            .with_items(|items| items.iter().find(|d| d.same_name(name)).cloned())
    }

    pub async fn add(&self, mut department: Department) -> DomainResult<Department> {
        let owner = self.scope(permissions::MANAGE_DEPARTMENTS).await?;

        department.name = department.name.trim().to_string();
        if self.find_by_name(&department.name).is_some() {
            return Err(DomainError::DuplicateDepartment(department.name));
        }

        let department = self.records.insert(&owner, department).await?;
        tracing::info!(name = %department.name, "Department added");
        Ok(department)
    }

    /// Update description or manager; renaming keeps names unique
    pub async fn update(&self, mut department: Department) -> DomainResult<Department> {
        let owner = self.scope(permissions::MANAGE_DEPARTMENTS).await?;

        department.name = department.name.trim().to_string();
        let clash = self.records.with_items(|items| {
            items
                .iter()
                .any(|d| d.id != department.id && d.same_name(&department.name))
        });
        if clash {
            return Err(DomainError::DuplicateDepartment(department.name));
        }

        self.records.replace(&owner, department).await
    }

    /// Remove by id, refused while employees reference it
    pub async fn remove(&self, id: &str) -> DomainResult<Department> {
        let owner = self.scope(permissions::MANAGE_DEPARTMENTS).await?;

        let department = self.records.get(id).ok_or_else(|| DomainError::NotFound {
            kind: "department",
            id: id.to_string(),
        })?;

        // The reference count needs the same owner's employees
        self.employees.ensure_loaded(&owner).await?;
        let count = self.employees.count_in_department(&department.name);
        if count > 0 {
            return Err(DomainError::DepartmentInUse {
                name: department.name,
                count,
            });
        }

        let removed = self.records.remove(&owner, id).await?;
        tracing::info!(name = %removed.name, "Department removed");
        Ok(removed)
    }

    pub fn rows(&self) -> Vec<TableRow> {
        let mut departments = self.departments();
        departments.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        departments
            .iter()
            .map(|d| {
                vec![
                    d.name.clone(),
                    d.description.clone(),
                    d.manager.clone().unwrap_or_default(),
                    self.employees.count_in_department(&d.name).to_string(),
                ]
            })
            .collect()
    }

    pub fn render(&self, sink: &dyn ViewSink) {
        sink.replace_children(DEPARTMENTS_TABLE, self.rows());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, AuthState, Role, Session, SessionCache};
    use crate::domain::testing::{admin_context, date};
    use crate::domain::types::Employee;
    use crate::domain::Managers;

    #[tokio::test]
    async fn test_names_are_unique_ignoring_case() {
        let ctx = admin_context().await;
        ctx.departments.add(Department::new("Ventas")).await.unwrap();

        let err = ctx
            .departments
            .add(Department::new("  VENTAS "))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateDepartment(_)));
        assert_eq!(ctx.departments.departments().len(), 1);
    }

    #[tokio::test]
    async fn test_referenced_department_cannot_be_removed() {
        let ctx = admin_context().await;
        let ventas = ctx.departments.add(Department::new("Ventas")).await.unwrap();
        for cedula in ["1", "2"] {
            ctx.employees
                .add(Employee::new(cedula, "E", cedula, date(2023, 1, 1)).department("Ventas"))
                .await
                .unwrap();
        }

        let err = ctx.departments.remove(&ventas.id).await.unwrap_err();

        assert!(err.to_string().contains("2 employee(s)"));
        assert!(matches!(err, DomainError::DepartmentInUse { count: 2, .. }));
        assert_eq!(ctx.departments.departments().len(), 1);
    }

    #[tokio::test]
    async fn test_reference_check_without_dashboard_access() {
        let (backends, _remote) = Backends::in_memory();
        let session = Session::new("u1", "rrhh@empresa.test", Role::Empleado).permissions(vec![
            permissions::MANAGE_EMPLOYEES.to_string(),
            permissions::MANAGE_DEPARTMENTS.to_string(),
        ]);
        SessionCache::new(backends.local.clone(), false)
            .write(&session)
            .unwrap();
        let reconciler = SessionReconciler::builder(backends.local.clone())
            .config(AuthConfig {
                session_timeout: None,
                mirror_legacy_keys: false,
            })
            .build();
        assert_eq!(reconciler.check_auth_status().await, AuthState::Authenticated);

        let managers = Managers::new(backends.clone(), reconciler.clone());
        let ventas = managers
            .departments
            .add(Department::new("Ventas"))
            .await
            .unwrap();
        managers
            .employees
            .add(Employee::new("1", "E", "Uno", date(2023, 1, 1)).department("VENTAS"))
            .await
            .unwrap();

        let fresh = Managers::new(backends, reconciler);
        let err = fresh.departments.remove(&ventas.id).await.unwrap_err();
        assert!(matches!(err, DomainError::DepartmentInUse { count: 1, .. }));
    }

    #[tokio::test]
    async fn test_unreferenced_department_is_removed() {
        let ctx = admin_context().await;
        ctx.departments.add(Department::new("Ventas")).await.unwrap();
        let compras = ctx.departments.add(Department::new("Compras")).await.unwrap();
        ctx.employees
            .add(Employee::new("1", "E", "Uno", date(2023, 1, 1)).department("Ventas"))
            .await
            .unwrap();

        let removed = ctx.departments.remove(&compras.id).await.unwrap();

        assert_eq!(removed.name, "Compras");
        let remaining = ctx.departments.departments();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Ventas");
    }

    #[tokio::test]
    async fn test_rows_include_headcount() {
        let ctx = admin_context().await;
        ctx.departments
            .add(Department::new("Ventas").manager("Ana"))
            .await
            .unwrap();
        ctx.employees
            .add(Employee::new("1", "E", "Uno", date(2023, 1, 1)).department("Ventas"))
            .await
            .unwrap();

        assert_eq!(
            ctx.departments.rows(),
            vec![vec![
                "Ventas".to_string(),
                String::new(),
                "Ana".to_string(),
                "1".to_string()
            ]]
        );
    }
}
