//! Employee management

use crate::auth::{permissions, SessionReconciler};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::records::{LoadSource, RecordSet};
use crate::domain::types::Employee;
use crate::storage::Backends;
use crate::view::{format, TableRow, ViewSink};
use std::sync::Arc;

/// Container the employee table renders into
pub const EMPLOYEES_TABLE: &str = "tablaEmpleados";

pub struct EmployeeManager {
    records: RecordSet<Employee>,
    reconciler: Arc<SessionReconciler>,
}

impl EmployeeManager {
    pub fn new(backends: Backends, reconciler: Arc<SessionReconciler>) -> Self {
        Self {
            records: RecordSet::new(backends),
            reconciler,
        }
    }

    /// Require `permission` and make sure the list belongs to the current user
    ///
    /// Fails when that list cannot be read, so nothing is written over it.
    async fn scope(&self, permission: &str) -> DomainResult<String> {
        let user = self.reconciler.require_permission(permission)?;
        self.records.ensure_owner(&user.id).await?;
        Ok(user.id)
    }

    /// Reload employees for the signed-in user
    pub async fn load_data(&self) -> DomainResult<LoadSource> {
        match self.reconciler.require_permission(permissions::VIEW_DASHBOARD) {
            Ok(user) => self.records.load(&user.id).await,
            Err(e) => {
                self.records.clear();
                Err(e.into())
            }
        }
    }

    /// Load `owner`'s employees unless they are already held
    ///
    /// Used for reference checks by the other managers, which have already
    /// checked their own permission; this does not require dashboard access.
    pub async fn ensure_loaded(&self, owner: &str) -> DomainResult<()> {
        self.records.ensure_owner(owner).await
    }

    pub fn employees(&self) -> Vec<Employee> {
        self.records.items()
    }

    pub fn find(&self, id: &str) -> Option<Employee> {
        self.records.get(id)
    }

    pub fn find_by_cedula(&self, cedula: &str) -> Option<Employee> {
        let cedula = cedula.trim();
        self.records
            .with_items(|items| items.iter().find(|e| e.cedula.trim() == cedula).cloned())
    }

    /// Full name for display, the id itself if unknown
    pub fn display_name(&self, id: &str) -> String {
        self.find(id)
            .map(|e| e.full_name())
            .unwrap_or_else(|| id.to_string())
    }

    pub async fn add(&self, mut employee: Employee) -> DomainResult<Employee> {
        let owner = self.scope(permissions::MANAGE_EMPLOYEES).await?;

        employee.cedula = employee.cedula.trim().to_string();
        if self.find_by_cedula(&employee.cedula).is_some() {
            return Err(DomainError::DuplicateCedula(employee.cedula));
        }

        let employee = self.records.insert(&owner, employee).await?;
        tracing::info!(id = %employee.id, cedula = %employee.cedula, "Employee added");
        Ok(employee)
    }

    pub async fn update(&self, mut employee: Employee) -> DomainResult<Employee> {
        let owner = self.scope(permissions::MANAGE_EMPLOYEES).await?;

        employee.cedula = employee.cedula.trim().to_string();
        let clash = self.records.with_items(|items| {
            items
                .iter()
                .any(|e| e.id != employee.id && e.cedula.trim() == employee.cedula)
        });
        if clash {
            return Err(DomainError::DuplicateCedula(employee.cedula));
        }

        self.records.replace(&owner, employee).await
    }

    pub async fn remove(&self, id: &str) -> DomainResult<Employee> {
        let owner = self.scope(permissions::MANAGE_EMPLOYEES).await?;
        let removed = self.records.remove(&owner, id).await?;
        tracing::info!(id, cedula = %removed.cedula, "Employee removed");
        Ok(removed)
    }

    pub fn active_count(&self) -> usize {
        self.records
            .with_items(|items| items.iter().filter(|e| e.is_active()).count())
    }

    /// Employees assigned to the named department
    pub fn count_in_department(&self, name: &str) -> usize {
        self.records
            .with_items(|items| items.iter().filter(|e| e.in_department(name)).count())
    }

    pub fn rows(&self) -> Vec<TableRow> {
        let mut employees = self.employees();
        employees.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));

        employees
            .iter()
            .map(|e| {
                vec![
                    e.cedula.clone(),
                    e.full_name(),
                    e.department.clone(),
                    e.position.clone(),
                    format::money(e.salary),
                    e.status.to_string(),
                ]
            })
            .collect()
    }

    pub fn render(&self, sink: &dyn ViewSink) {
        sink.replace_children(EMPLOYEES_TABLE, self.rows());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::domain::testing::{admin_context, context_with_role, date};
    use crate::auth::Role;
    use crate::domain::records::snapshot_key;
    use crate::domain::types::EmployeeStatus;
    use crate::storage::KeyValueStore;

    fn ana() -> Employee {
        Employee::new("0102030405", "Ana", "Torres", date(2023, 1, 9))
            .department("Ventas")
            .salary(1200.0)
    }

    #[tokio::test]
    async fn test_duplicate_cedula_leaves_list_unchanged() {
        let ctx = admin_context().await;
        ctx.employees.add(ana()).await.unwrap();

        let duplicate = Employee::new(" 0102030405 ", "Otra", "Persona", date(2024, 2, 1));
        let err = ctx.employees.add(duplicate).await.unwrap_err();

        assert!(matches!(err, DomainError::DuplicateCedula(ref c) if c == "0102030405"));
        assert_eq!(ctx.employees.employees().len(), 1);
    }

    #[tokio::test]
    async fn test_update_checks_cedula_against_others() {
        let ctx = admin_context().await;
        let first = ctx.employees.add(ana()).await.unwrap();
        let second = ctx
            .employees
            .add(Employee::new("999", "Luis", "Paz", date(2023, 5, 2)))
            .await
            .unwrap();

        // Keeping its own cedula is fine
        let mut renamed = first.clone();
        renamed.position = "Supervisora".to_string();
        ctx.employees.update(renamed).await.unwrap();

        let mut clash = second.clone();
        clash.cedula = first.cedula.clone();
        assert!(ctx.employees.update(clash).await.is_err());
        assert_eq!(ctx.employees.find(&second.id).unwrap().cedula, "999");
    }

    #[tokio::test]
    async fn test_active_count_and_department_count() {
        let ctx = admin_context().await;
        ctx.employees.add(ana()).await.unwrap();
        ctx.employees
            .add(
                Employee::new("2", "Luis", "Paz", date(2023, 5, 2))
                    .department("ventas")
                    .status(EmployeeStatus::Inactive),
            )
            .await
            .unwrap();

        assert_eq!(ctx.employees.active_count(), 1);
        assert_eq!(ctx.employees.count_in_department("Ventas"), 2);
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let ctx = admin_context().await;
        ctx.employees.add(ana()).await.unwrap();
        ctx.employees
            .add(Employee::new("2", "Luis", "Paz", date(2023, 5, 2)))
            .await
            .unwrap();
        ctx.remote.set_available(false);

        let reloaded = EmployeeManager::new(ctx.backends.clone(), ctx.reconciler.clone());
        assert_eq!(reloaded.load_data().await.unwrap(), LoadSource::Local);

        let mut before = ctx.employees.employees();
        let mut after = reloaded.employees();
        before.sort_by(|a, b| a.id.cmp(&b.id));
        after.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_blocks_writes() {
        let ctx = admin_context().await;
        ctx.employees.add(ana()).await.unwrap();
        ctx.remote.set_available(false);

        let key = snapshot_key::<Employee>(&ctx.reconciler.user_id().unwrap());
        let stored = ctx.backends.local.get(&key).unwrap().unwrap();
        let truncated = stored[..stored.len() / 2].to_string();
        ctx.backends.local.set(&key, &truncated).unwrap();

        let fresh = EmployeeManager::new(ctx.backends.clone(), ctx.reconciler.clone());
        let duplicate = Employee::new("0102030405", "Dup", "Licado", date(2024, 2, 1));
        assert!(matches!(
            fresh.add(duplicate).await,
            Err(DomainError::Storage(_))
        ));

        // A failed read does not make the next write think the list is loaded
        assert!(fresh.load_data().await.is_err());
        let other = Employee::new("777", "Luis", "Paz", date(2024, 2, 1));
        assert!(fresh.add(other).await.is_err());
        assert!(fresh.employees().is_empty());

        assert_eq!(ctx.backends.local.get(&key).unwrap().unwrap(), truncated);
    }

    #[tokio::test]
    async fn test_other_statuses_are_listed_but_not_active() {
        let ctx = admin_context().await;
        ctx.remote.set_available(false);
        let user_id = ctx.reconciler.user_id().unwrap();
        let snapshot = format!(
            r#"[{{"id": "e1", "userId": "{0}", "cedula": "1", "firstName": "Ana",
                  "hireDate": "2023-01-09", "status": "active"}},
                {{"id": "e2", "userId": "{0}", "cedula": "2", "firstName": "Eva",
                  "hireDate": "2022-05-01", "status": "vacaciones"}}]"#,
            user_id
        );
        ctx.backends
            .local
            .set(&snapshot_key::<Employee>(&user_id), &snapshot)
            .unwrap();

        let fresh = EmployeeManager::new(ctx.backends.clone(), ctx.reconciler.clone());
        fresh.load_data().await.unwrap();

        assert_eq!(fresh.employees().len(), 2);
        assert_eq!(fresh.active_count(), 1);
        assert_eq!(fresh.find("e2").unwrap().status.to_string(), "vacaciones");
    }

    #[tokio::test]
    async fn test_empleado_cannot_add() {
        let ctx = context_with_role(Role::Empleado).await;
        let err = ctx.employees.add(ana()).await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(AuthError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_load_without_session_resets_list() {
        let ctx = admin_context().await;
        ctx.employees.add(ana()).await.unwrap();
        ctx.reconciler.logout().await.unwrap();

        assert!(ctx.employees.load_data().await.is_err());
        assert!(ctx.employees.employees().is_empty());
    }

    #[tokio::test]
    async fn test_render_rows() {
        let ctx = admin_context().await;
        ctx.employees.add(ana()).await.unwrap();
        ctx.employees.render(&*ctx.sink);

        let rows = ctx.sink.rows(EMPLOYEES_TABLE);
        assert_eq!(
            rows,
            vec![vec![
                "0102030405".to_string(),
                "Ana Torres".to_string(),
                "Ventas".to_string(),
                String::new(),
                "$1,200.00".to_string(),
                "active".to_string(),
            ]]
        );
    }
}
