//! Session Reconciler
//!
//! Decides whether a user is signed in by probing, in this order:
//!
//! ```text
//! 1. identity provider live session
//! 2. local cache: nomina.session → currentUser → user
//! ```
//!
//! The first valid record wins and is mirrored back into the cache. Probe
//! failures are logged and the next probe runs; only when every probe failed
//! does the state become `error`.
//!
//! The reconciler is the only writer of [`AuthState`]. Each transition is
//! broadcast as an [`AuthEvent`] and toggles the `requires-auth` class on the
//! attached view sink.

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::expiry::SessionTimeout;
use crate::auth::permissions;
use crate::auth::provider::IdentityProvider;
use crate::auth::session::{
    AuthEvent, AuthState, Credential, Session, SessionCache, ALL_SESSION_KEYS,
};
use crate::storage::{KeyValueStore, StorageEvent};
use crate::view::ViewSink;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Element class shown only while authenticated
pub const REQUIRES_AUTH_CLASS: &str = "requires-auth";

/// Capacity of the auth event channel
const EVENT_CAPACITY: usize = 64;

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Log out after this long; `None` disables expiry
    pub session_timeout: Option<Duration>,
    /// Also write the legacy session keys
    pub mirror_legacy_keys: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_timeout: Some(Duration::from_secs(8 * 60 * 60)),
            mirror_legacy_keys: true,
        }
    }
}

#[derive(Debug, Clone)]
struct AuthSnapshot {
    state: AuthState,
    user: Option<Session>,
}

/// Builder for [`SessionReconciler`]
pub struct SessionReconcilerBuilder {
    local: Arc<dyn KeyValueStore>,
    provider: Option<Arc<dyn IdentityProvider>>,
    sink: Option<Arc<dyn ViewSink>>,
    config: AuthConfig,
}

impl SessionReconcilerBuilder {
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ViewSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<SessionReconciler> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (ready, _) = watch::channel(false);
        let cache = SessionCache::new(self.local.clone(), self.config.mirror_legacy_keys);

        Arc::new_cyclic(|this| SessionReconciler {
            local: self.local,
            cache,
            provider: self.provider,
            sink: self.sink,
            config: self.config,
            snapshot: RwLock::new(AuthSnapshot {
                state: AuthState::Checking,
                user: None,
            }),
            events,
            ready,
            expiry: SessionTimeout::new(),
            this: this.clone(),
        })
    }
}

/// Converges the identity provider and the local cache on one current user
pub struct SessionReconciler {
    local: Arc<dyn KeyValueStore>,
    cache: SessionCache,
    provider: Option<Arc<dyn IdentityProvider>>,
    sink: Option<Arc<dyn ViewSink>>,
    config: AuthConfig,
    snapshot: RwLock<AuthSnapshot>,
    events: broadcast::Sender<AuthEvent>,
    /// Flips to true after the first completed check
    ready: watch::Sender<bool>,
    expiry: SessionTimeout,
    this: Weak<SessionReconciler>,
}

impl SessionReconciler {
    pub fn builder(local: Arc<dyn KeyValueStore>) -> SessionReconcilerBuilder {
        SessionReconcilerBuilder {
            local,
            provider: None,
            sink: None,
            config: AuthConfig::default(),
        }
    }

    fn snapshot(&self) -> AuthSnapshot {
        match self.snapshot.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        let snapshot = self.snapshot();
        snapshot.state == AuthState::Authenticated && snapshot.user.is_some()
    }

    pub fn current_user(&self) -> Option<Session> {
        self.snapshot().user
    }

    pub fn auth_state(&self) -> AuthState {
        self.snapshot().state
    }

    /// Id that scopes every domain record, if signed in
    pub fn user_id(&self) -> Option<String> {
        self.current_user().map(|u| u.id)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.current_user()
            .map(|user| permissions::allows(&user, permission))
            .unwrap_or(false)
    }

    /// The current user, provided it holds `permission`
    pub fn require_permission(&self, permission: &str) -> AuthResult<Session> {
        let user = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        if permissions::allows(&user, permission) {
            Ok(user)
        } else {
            Err(AuthError::Forbidden(permission.to_string()))
        }
    }

    /// Subscribe to auth transitions
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Resolves once the first auth check has completed
    pub async fn wait_ready(&self) -> AuthState {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as self
        let _ = rx.wait_for(|ready| *ready).await;
        self.auth_state()
    }

    /// Whether an expiry timer is pending
    pub fn expiry_armed(&self) -> bool {
        self.expiry.is_armed()
    }

    fn transition(&self, state: AuthState, user: Option<Session>) {
        let changed = {
            let mut snapshot = match self.snapshot.write() {
                Ok(snapshot) => snapshot,
                Err(poisoned) => poisoned.into_inner(),
            };
            let changed = snapshot.state != state
                || snapshot.user.as_ref().map(|u| &u.id) != user.as_ref().map(|u| &u.id);
            snapshot.state = state;
            snapshot.user = user.clone();
            changed
        };

        match state {
            AuthState::Authenticated => self.arm_expiry(),
            AuthState::Unauthenticated | AuthState::Error => self.expiry.cancel(),
            AuthState::Checking => {}
        }

        if state != AuthState::Checking {
            self.ready.send_replace(true);
        }

        if !changed {
            return;
        }

        tracing::info!(
            state = %state,
            user = user.as_ref().map(|u| u.email.as_str()).unwrap_or("-"),
            "Auth state changed"
        );

        if let Some(sink) = &self.sink {
            sink.set_visible(REQUIRES_AUTH_CLASS, state == AuthState::Authenticated);
        }

        // No subscribers is fine
        let _ = self.events.send(AuthEvent { user, state });
    }

    fn arm_expiry(&self) {
        let Some(after) = self.config.session_timeout else {
            return;
        };
        let this = self.this.clone();
        self.expiry.schedule(after, async move {
            if let Some(reconciler) = this.upgrade() {
                reconciler.expire().await;
            }
        });
    }

    async fn expire(&self) {
        // Runs inside the timer task; a login may have re-armed it meanwhile
        if !self.expiry.release_current() {
            tracing::debug!("Session renewed before expiry ran");
            return;
        }
        tracing::info!("Session expired");
        if let Err(e) = self.logout().await {
            tracing::warn!(error = %e, "Logout after expiry failed");
        }
    }

    /// Adopt `session` as the current user and mirror it into the cache
    fn accept(&self, session: Session, source: &str) -> AuthState {
        tracing::debug!(source, user = %session.email, "Session accepted");
        if let Err(e) = self.cache.write(&session) {
            tracing::warn!(error = %e, "Failed to mirror session into local cache");
        }
        self.transition(AuthState::Authenticated, Some(session));
        AuthState::Authenticated
    }

    /// Probe every source in priority order and settle the auth state
    pub async fn check_auth_status(&self) -> AuthState {
        let current = self.current_user();
        self.transition(AuthState::Checking, current);

        let mut probes = 0usize;
        let mut failures = 0usize;

        if let Some(provider) = &self.provider {
            probes += 1;
            match provider.current_session().await {
                Ok(Some(session)) if session.is_valid() => {
                    return self.accept(session, provider.name());
                }
                Ok(Some(_)) => {
                    tracing::debug!(provider = provider.name(), "Provider session not active")
                }
                Ok(None) => tracing::debug!(provider = provider.name(), "No provider session"),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(provider = provider.name(), error = %e, "Provider probe failed");
                }
            }
        }

        for key in ALL_SESSION_KEYS {
            probes += 1;
            match self.cache.read(key) {
                Ok(Some(session)) if session.is_valid() => {
                    return self.accept(session, key);
                }
                Ok(Some(_)) => tracing::debug!(key, "Cached session not active"),
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    tracing::warn!(key, error = %e, "Cached session unreadable");
                }
            }
        }

        if failures == probes {
            tracing::error!(probes, "Every session source failed");
            self.transition(AuthState::Error, None);
            AuthState::Error
        } else {
            self.transition(AuthState::Unauthenticated, None);
            AuthState::Unauthenticated
        }
    }

    /// Sign in through the identity provider
    ///
    /// On failure the auth state is left as it was.
    pub async fn login(&self, credential: &Credential) -> AuthResult<Session> {
        credential.validate()?;

        let provider = self.provider.as_ref().ok_or_else(|| {
            AuthError::ProviderUnavailable("no identity provider configured".to_string())
        })?;

        let session = provider.sign_in(credential).await.map_err(|e| {
            tracing::warn!(email = %credential.email, error = %e, "Login failed");
            e
        })?;

        if !session.is_valid() {
            return Err(AuthError::LoginFailed(
                "identity provider returned an inactive session".to_string(),
            ));
        }

        self.accept(session.clone(), provider.name());
        Ok(session)
    }

    /// Sign out everywhere
    ///
    /// The cache is cleared and the state set to unauthenticated even when the
    /// provider's sign-out fails. Safe to call repeatedly.
    pub async fn logout(&self) -> AuthResult<()> {
        self.expiry.cancel();

        if let Some(provider) = &self.provider {
            if let Err(e) = provider.sign_out().await {
                tracing::warn!(provider = provider.name(), error = %e, "Remote sign-out failed");
            }
        }

        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "Failed to clear session cache");
        }

        self.transition(AuthState::Unauthenticated, None);
        Ok(())
    }

    /// React to a change of a session key made elsewhere
    pub fn handle_storage_event(&self, event: &StorageEvent) {
        if !ALL_SESSION_KEYS.contains(&event.key.as_str()) {
            return;
        }

        match &event.new_value {
            Some(raw) => match SessionCache::decode(&event.key, raw) {
                Ok(session) if session.is_valid() => {
                    let same_user = self.is_authenticated()
                        && self.user_id().as_deref() == Some(session.id.as_str());
                    if !same_user {
                        self.transition(AuthState::Authenticated, Some(session));
                    }
                }
                Ok(_) => self.drop_if_no_cached_session(),
                Err(e) => {
                    tracing::warn!(key = %event.key, error = %e, "Ignoring unreadable session write")
                }
            },
            None => self.drop_if_no_cached_session(),
        }
    }

    fn drop_if_no_cached_session(&self) {
        if !self.is_authenticated() {
            return;
        }
        let still_cached = ALL_SESSION_KEYS.iter().any(|key| {
            matches!(self.cache.read(key), Ok(Some(session)) if session.is_valid())
        });
        if !still_cached {
            self.transition(AuthState::Unauthenticated, None);
        }
    }

    /// Follow local storage changes until the store goes away
    pub fn watch_storage(self: &Arc<Self>) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        let mut rx = self.local.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => reconciler.handle_storage_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed storage events, re-checking session");
                        reconciler.check_auth_status().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
