//! Role → permission table
//!
//! Sessions that carry an explicit permission list are checked against that
//! list only. Otherwise the role decides, and `admin` holds the wildcard.

use crate::auth::session::{Role, Session};

/// Grants every permission
pub const WILDCARD: &str = "*";

pub const VIEW_DASHBOARD: &str = "ver_dashboard";
pub const MANAGE_EMPLOYEES: &str = "gestionar_empleados";
pub const MANAGE_DEPARTMENTS: &str = "gestionar_departamentos";
pub const LOG_HOURS: &str = "registrar_horas";
pub const MANAGE_HOURS: &str = "gestionar_horas";
pub const VIEW_PAYROLL: &str = "ver_nomina";
pub const MANAGE_PAYROLL: &str = "gestionar_nomina";
pub const EXPORT_PAYROLL: &str = "exportar_nomina";

/// Static grants per role
pub fn role_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[WILDCARD],
        Role::Gerente => &[
            VIEW_DASHBOARD,
            MANAGE_EMPLOYEES,
            MANAGE_DEPARTMENTS,
            LOG_HOURS,
            MANAGE_HOURS,
            VIEW_PAYROLL,
        ],
        Role::Contador => &[VIEW_DASHBOARD, VIEW_PAYROLL, MANAGE_PAYROLL, EXPORT_PAYROLL],
        Role::Empleado => &[VIEW_DASHBOARD, LOG_HOURS],
    }
}

/// Whether `session` grants `permission`
pub fn allows(session: &Session, permission: &str) -> bool {
    match &session.permissions {
        Some(explicit) => explicit.iter().any(|p| p == permission),
        None => {
            let granted = role_permissions(session.role);
            granted.contains(&WILDCARD) || granted.contains(&permission)
        }
    }
}
