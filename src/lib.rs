//! # Nomina
//!
//! Business management core: employees, timesheets, payroll and
//! departments, stored remotely or locally, with a live dashboard.
//!
//! ## Features
//!
//! - **Session reconciliation**: one current user, converged from the
//!   identity provider and locally cached sessions
//! - **Remote-first storage**: records load from the document store and fall
//!   back to per-user local snapshots
//! - **Role permissions**: admin, gerente, contador and empleado
//! - **Dashboard**: monthly metrics and chart series pushed to a view sink
//!
//! ## Modules
//!
//! - [`storage`]: key-value and document store backends
//! - [`auth`]: sessions, permissions and the session reconciler
//! - [`domain`]: record types and their managers
//! - [`dashboard`]: aggregate metrics and charts
//! - [`refresh`]: reload and re-render timers
//! - [`view`]: the rendering target
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nomina::auth::{Credential, MemoryIdentityProvider, Role, SessionReconciler};
//! use nomina::domain::{Employee, Managers};
//! use nomina::storage::Backends;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (backends, _remote) = Backends::in_memory();
//!
//!     let provider = Arc::new(MemoryIdentityProvider::new());
//!     provider.add_account("admin@empresa.com", "secreto", Role::Admin);
//!
//!     let reconciler = SessionReconciler::builder(backends.local.clone())
//!         .provider(provider)
//!         .build();
//!     reconciler.check_auth_status().await;
//!     reconciler
//!         .login(&Credential::new("admin@empresa.com", "secreto"))
//!         .await?;
//!
//!     let managers = Managers::new(backends, reconciler);
//!     let hired = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//!     managers
//!         .employees
//!         .add(Employee::new("0102030405", "Ana", "Torres", hired).department("Ventas"))
//!         .await?;
//!
//!     println!("{} active employees", managers.employees.active_count());
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod refresh;
pub mod storage;
pub mod view;

pub use app::App;
pub use auth::{AuthEvent, AuthState, Credential, Role, Session, SessionReconciler};
pub use config::Config;
pub use dashboard::{Dashboard, DashboardMetrics};
pub use domain::{DomainError, DomainResult, Managers};
pub use refresh::{RefreshConfig, Refresher};
pub use storage::{Backends, StorageError, StorageResult};
pub use view::{ChartSeries, MemorySink, ViewSink};
