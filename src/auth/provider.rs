//! Identity providers
//!
//! The identity provider owns the "live" session: the one the reconciler
//! probes first. [`HttpIdentityProvider`] talks to a REST identity service;
//! [`MemoryIdentityProvider`] keeps seeded accounts in process.

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::session::{Credential, Role, Session, SessionSource};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Common trait for identity sources
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// The provider's live session, if any
    async fn current_session(&self) -> AuthResult<Option<Session>>;

    /// Authenticate and start a live session
    async fn sign_in(&self, credential: &Credential) -> AuthResult<Session>;

    /// End the live session
    async fn sign_out(&self) -> AuthResult<()>;
}

/// User payload returned by the identity service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteUser {
    id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    role: Role,
    #[serde(default)]
    permissions: Option<Vec<String>>,
}

impl RemoteUser {
    fn into_session(self) -> Session {
        Session {
            display_name: self.display_name.unwrap_or_else(|| self.email.clone()),
            id: self.id,
            email: self.email,
            role: self.role,
            permissions: self.permissions,
            source: SessionSource::Remote,
            authenticated: true,
            signed_in_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SignInResponse {
    token: String,
    user: RemoteUser,
}

/// REST client for the identity service
///
/// ```text
/// POST {base}/v1/auth/sign-in    {email, password} → {token, user}
/// GET  {base}/v1/auth/session    Bearer token      → user | 401
/// POST {base}/v1/auth/sign-out   Bearer token
/// ```
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    /// Bearer token of the live session, in memory only
    token: Mutex<Option<String>>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, request_timeout_ms: u64) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = token;
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn current_session(&self) -> AuthResult<Option<Session>> {
        let Some(token) = self.token() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(format!("{}/v1/auth/session", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: RemoteUser = response.json().await?;
                Ok(Some(user.into_session()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                self.set_token(None);
                Ok(None)
            }
            status => Err(AuthError::ProviderUnavailable(format!(
                "session probe returned {}",
                status
            ))),
        }
    }

    async fn sign_in(&self, credential: &Credential) -> AuthResult<Session> {
        let response = self
            .client
            .post(format!("{}/v1/auth/sign-in", self.base_url))
            .json(&SignInRequest {
                email: credential.email.trim(),
                password: &credential.password,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::LoginFailed(
                "invalid email or password".to_string(),
            ));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::ProviderUnavailable(format!("{}: {}", status, text)));
        }

        let body: SignInResponse = response.json().await?;
        self.set_token(Some(body.token));
        Ok(body.user.into_session())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Some(token) = self.token() else {
            return Ok(());
        };
        // Local token goes away whatever the service answers
        self.set_token(None);

        let response = self
            .client
            .post(format!("{}/v1/auth/sign-out", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(AuthError::ProviderUnavailable(format!(
                "sign-out returned {}",
                response.status()
            )))
        }
    }
}

struct Account {
    password: String,
    session: Session,
}

/// In-process identity provider with seeded accounts
pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    available: AtomicBool,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            available: AtomicBool::new(true),
        }
    }

    /// Register an account under a fresh user id; returns the id
    pub fn add_account(&self, email: &str, password: &str, role: Role) -> String {
        let id = Uuid::new_v4().to_string();
        self.add_account_with_id(&id, email, password, role);
        id
    }

    /// Register an account with a stable user id
    pub fn add_account_with_id(&self, id: &str, email: &str, password: &str, role: Role) {
        let session = Session::new(id, email, role);
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(
                email.to_lowercase(),
                Account {
                    password: password.to_string(),
                    session,
                },
            );
        }
    }

    /// Simulate the provider going offline
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> AuthResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::ProviderUnavailable(
                "identity provider offline".to_string(),
            ))
        }
    }

    fn set_current(&self, session: Option<Session>) {
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn current_session(&self) -> AuthResult<Option<Session>> {
        self.ensure_available()?;
        Ok(self.current.read().ok().and_then(|c| c.clone()))
    }

    async fn sign_in(&self, credential: &Credential) -> AuthResult<Session> {
        self.ensure_available()?;

        let session = {
            let accounts = self
                .accounts
                .read()
                .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
            match accounts.get(&credential.email.trim().to_lowercase()) {
                Some(account) if account.password == credential.password => {
                    let mut session = account.session.clone();
                    session.signed_in_at = Utc::now();
                    session
                }
                _ => {
                    return Err(AuthError::LoginFailed(
                        "invalid email or password".to_string(),
                    ))
                }
            }
        };

        self.set_current(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.ensure_available()?;
        self.set_current(None);
        Ok(())
    }
}
