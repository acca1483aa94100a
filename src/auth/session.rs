//! Session records and the local session cache
//!
//! The canonical cache key holds a versioned envelope. Two legacy keys are
//! still understood on read (and mirrored on write when enabled) so older
//! clients sharing the same storage keep working.

use crate::auth::error::{AuthError, AuthResult};
use crate::storage::{KeyValueStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Canonical session key
pub const SESSION_KEY: &str = "nomina.session";

/// Keys written by older clients
pub const LEGACY_SESSION_KEYS: [&str; 2] = ["currentUser", "user"];

/// Every session key, in probe order
pub const ALL_SESSION_KEYS: [&str; 3] = [SESSION_KEY, LEGACY_SESSION_KEYS[0], LEGACY_SESSION_KEYS[1]];

/// Current envelope version
pub const SESSION_VERSION: u32 = 2;

/// Authentication state, owned by the session reconciler
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    Checking,
    Authenticated,
    Unauthenticated,
    Error,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Checking => write!(f, "checking"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Unauthenticated => write!(f, "unauthenticated"),
            AuthState::Error => write!(f, "error"),
        }
    }
}

/// User role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access
    Admin,
    /// Manages staff, departments and timesheets
    Gerente,
    /// Manages payroll
    Contador,
    /// Logs own hours, sees the dashboard
    Empleado,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Gerente, Role::Contador, Role::Empleado]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Gerente => write!(f, "gerente"),
            Role::Contador => write!(f, "contador"),
            Role::Empleado => write!(f, "empleado"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "gerente" => Ok(Role::Gerente),
            "contador" => Ok(Role::Contador),
            "empleado" => Ok(Role::Empleado),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Where a session came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    /// Identity provider
    Remote,
    /// Local cache or in-process provider
    Local,
}

/// The current-user record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    /// Explicit grants; when absent the role table applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    pub source: SessionSource,
    pub authenticated: bool,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        let email = email.into();
        Self {
            id: id.into(),
            display_name: email.clone(),
            email,
            role,
            permissions: None,
            source: SessionSource::Local,
            authenticated: true,
            signed_in_at: Utc::now(),
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn source(mut self, source: SessionSource) -> Self {
        self.source = source;
        self
    }

    /// A record counts only if it is flagged authenticated and has an id
    pub fn is_valid(&self) -> bool {
        self.authenticated && !self.id.trim().is_empty()
    }
}

/// Login credential
#[derive(Debug, Clone)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject obviously malformed credentials before contacting a provider
    pub fn validate(&self) -> AuthResult<()> {
        if !email_pattern().is_match(self.email.trim()) {
            return Err(AuthError::InvalidCredential(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        if self.password.is_empty() {
            return Err(AuthError::InvalidCredential(
                "password must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Broadcast on every auth transition
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub user: Option<Session>,
    pub state: AuthState,
}

/// Versioned envelope stored under [`SESSION_KEY`]
#[derive(Serialize, Deserialize)]
struct SessionEnvelope {
    version: u32,
    session: Session,
}

/// Shape written by older clients under the legacy keys
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySession {
    #[serde(alias = "id")]
    uid: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default = "legacy_default_role")]
    role: String,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default, alias = "authenticated")]
    is_authenticated: bool,
    #[serde(default)]
    login_time: Option<String>,
}

fn legacy_default_role() -> String {
    "empleado".to_string()
}

impl LegacySession {
    fn into_session(self) -> StorageResult<Session> {
        let role = self.role.parse().map_err(StorageError::Serialization)?;
        let source = match self.provider.as_deref() {
            Some("local") | None => SessionSource::Local,
            Some(_) => SessionSource::Remote,
        };
        let signed_in_at = self
            .login_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Session {
            display_name: self.display_name.unwrap_or_else(|| self.email.clone()),
            id: self.uid,
            email: self.email,
            role,
            permissions: self.permissions,
            source,
            authenticated: self.is_authenticated,
            signed_in_at,
        })
    }

    fn from_session(session: &Session) -> Self {
        Self {
            uid: session.id.clone(),
            email: session.email.clone(),
            display_name: Some(session.display_name.clone()),
            role: session.role.to_string(),
            permissions: session.permissions.clone(),
            provider: Some(match session.source {
                SessionSource::Remote => "remote".to_string(),
                SessionSource::Local => "local".to_string(),
            }),
            is_authenticated: session.authenticated,
            login_time: Some(session.signed_in_at.to_rfc3339()),
        }
    }
}

/// Read/write access to the session keys in local storage
#[derive(Clone)]
pub struct SessionCache {
    local: Arc<dyn KeyValueStore>,
    mirror_legacy: bool,
}

impl SessionCache {
    pub fn new(local: Arc<dyn KeyValueStore>, mirror_legacy: bool) -> Self {
        Self {
            local,
            mirror_legacy,
        }
    }

    /// Decode a raw value stored under `key`
    pub fn decode(key: &str, raw: &str) -> StorageResult<Session> {
        if key == SESSION_KEY {
            let envelope: SessionEnvelope = serde_json::from_str(raw)?;
            if envelope.version > SESSION_VERSION {
                return Err(StorageError::Serialization(format!(
                    "unsupported session version {}",
                    envelope.version
                )));
            }
            Ok(envelope.session)
        } else {
            let legacy: LegacySession = serde_json::from_str(raw)?;
            legacy.into_session()
        }
    }

    /// Read one key
    pub fn read(&self, key: &str) -> StorageResult<Option<Session>> {
        match self.local.get(key)? {
            Some(raw) => Self::decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Write the session to the canonical key, and the legacy keys if mirroring
    pub fn write(&self, session: &Session) -> StorageResult<()> {
        let envelope = SessionEnvelope {
            version: SESSION_VERSION,
            session: session.clone(),
        };
        self.local
            .set(SESSION_KEY, &serde_json::to_string(&envelope)?)?;

        if self.mirror_legacy {
            let legacy = serde_json::to_string(&LegacySession::from_session(session))?;
            for key in LEGACY_SESSION_KEYS {
                self.local.set(key, &legacy)?;
            }
        }

        tracing::debug!(user = %session.email, "Session cached");
        Ok(())
    }

    /// Remove every session key. All keys are attempted; the first error is returned.
    pub fn clear(&self) -> StorageResult<()> {
        let mut first_error = None;
        for key in ALL_SESSION_KEYS {
            if let Err(e) = self.local.remove(key) {
                tracing::warn!(key, error = %e, "Failed to clear session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" empleado ".parse::<Role>().unwrap(), Role::Empleado);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_credential_validation() {
        assert!(Credential::new("ana@empresa.com", "secret").validate().is_ok());
        assert!(matches!(
            Credential::new("not-an-email", "secret").validate(),
            Err(AuthError::InvalidCredential(_))
        ));
        assert!(Credential::new("ana@empresa.com", "").validate().is_err());
    }

    #[test]
    fn test_session_validity() {
        let session = Session::new("u1", "ana@empresa.com", Role::Admin);
        assert!(session.is_valid());

        let mut inactive = session.clone();
        inactive.authenticated = false;
        assert!(!inactive.is_valid());

        let blank = Session::new("  ", "ana@empresa.com", Role::Admin);
        assert!(!blank.is_valid());
    }

    #[test]
    fn test_cache_write_mirrors_legacy_keys() {
        let store = Arc::new(MemoryStore::new());
        let cache = SessionCache::new(store.clone(), true);
        let session = Session::new("u1", "ana@empresa.com", Role::Contador).display_name("Ana");

        cache.write(&session).unwrap();

        for key in ALL_SESSION_KEYS {
            let read = cache.read(key).unwrap().unwrap();
            assert_eq!(read.id, "u1");
            assert_eq!(read.role, Role::Contador);
            assert_eq!(read.display_name, "Ana");
        }

        cache.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_cache_without_mirroring() {
        let store = Arc::new(MemoryStore::new());
        let cache = SessionCache::new(store.clone(), false);
        cache
            .write(&Session::new("u1", "ana@empresa.com", Role::Admin))
            .unwrap();

        assert_eq!(store.keys().unwrap(), vec![SESSION_KEY.to_string()]);
    }

    #[test]
    fn test_decode_legacy_shape() {
        let raw = r#"{
            "uid": "abc",
            "email": "luis@empresa.com",
            "displayName": "Luis",
            "role": "gerente",
            "provider": "firebase",
            "isAuthenticated": true,
            "loginTime": "2024-03-01T08:00:00Z"
        }"#;

        let session = SessionCache::decode("currentUser", raw).unwrap();
        assert_eq!(session.id, "abc");
        assert_eq!(session.role, Role::Gerente);
        assert_eq!(session.source, SessionSource::Remote);
        assert!(session.is_valid());
        assert_eq!(session.signed_in_at.to_rfc3339(), "2024-03-01T08:00:00+00:00");
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let session = Session::new("u1", "ana@empresa.com", Role::Admin);
        let raw = serde_json::json!({ "version": 99, "session": session }).to_string();
        assert!(SessionCache::decode(SESSION_KEY, &raw).is_err());
    }
}
