//! Authentication
//!
//! - **session**: session record, auth state, the local session cache
//! - **permissions**: role → permission table
//! - **provider**: identity providers (HTTP, in-memory)
//! - **reconciler**: the session reconciler, sole owner of the auth state
//! - **expiry**: deferred logout timer
//! - **error**: error types

pub mod error;
pub mod expiry;
pub mod permissions;
pub mod provider;
pub mod reconciler;
pub mod session;

pub use error::{AuthError, AuthResult};
pub use expiry::SessionTimeout;
pub use provider::{HttpIdentityProvider, IdentityProvider, MemoryIdentityProvider};
pub use reconciler::{AuthConfig, SessionReconciler, SessionReconcilerBuilder, REQUIRES_AUTH_CLASS};
pub use session::{
    AuthEvent, AuthState, Credential, Role, Session, SessionCache, SessionSource,
    ALL_SESSION_KEYS, LEGACY_SESSION_KEYS, SESSION_KEY,
};
