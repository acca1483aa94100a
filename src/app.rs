//! Application wiring
//!
//! Builds the backends, identity provider, reconciler and managers from a
//! [`Config`]. Both binaries start here.

use crate::auth::{
    HttpIdentityProvider, IdentityProvider, MemoryIdentityProvider, SessionReconciler,
    ALL_SESSION_KEYS,
};
use crate::config::{Config, LoggingConfig};
use crate::dashboard::Dashboard;
use crate::domain::Managers;
use crate::refresh::Refresher;
use crate::storage::{Backends, DocumentStore, HttpDocumentStore, KeyValueStore, SqliteStore};
use crate::view::ViewSink;
use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing from the `[logging]` section
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr so
/// command output on stdout stays clean.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nomina={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Everything a running instance needs, wired together
pub struct App {
    pub config: Config,
    /// The local database, shared with other processes using the same file
    pub store: Arc<SqliteStore>,
    pub backends: Backends,
    pub reconciler: Arc<SessionReconciler>,
    pub managers: Managers,
    pub dashboard: Arc<Dashboard>,
    pub sink: Arc<dyn ViewSink>,
}

impl App {
    pub fn build(config: Config, sink: Arc<dyn ViewSink>) -> anyhow::Result<Self> {
        let db_path = config.storage.database_path();
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data directory {:?}", dir))?;
        }
        let store = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("opening local storage {:?}", db_path))?,
        );
        store
            .watch_keys(&ALL_SESSION_KEYS)
            .context("reading session keys")?;
        let local: Arc<dyn KeyValueStore> = store.clone();
        tracing::info!("Local storage: {:?}", db_path);

        let remote: Option<Arc<dyn DocumentStore>> = if config.remote.enabled {
            tracing::info!("Remote document store: {}", config.remote.url);
            Some(Arc::new(
                HttpDocumentStore::new(config.remote.remote_config())
                    .context("building remote document store client")?,
            ))
        } else {
            tracing::info!("Remote document store disabled, using local snapshots");
            None
        };
        let backends = Backends::new(local.clone(), remote);

        let provider = build_provider(&config)?;
        let reconciler = SessionReconciler::builder(local)
            .provider(provider)
            .sink(sink.clone())
            .config(config.auth.auth_config())
            .build();

        let managers = Managers::new(backends.clone(), reconciler.clone());
        let dashboard = Arc::new(Dashboard::new(managers.clone()));

        Ok(Self {
            config,
            store,
            backends,
            reconciler,
            managers,
            dashboard,
            sink,
        })
    }

    /// Turn sign-ins and sign-outs written by other processes into storage
    /// events; pair with [`SessionReconciler::watch_storage`]
    pub fn watch_external_writes(&self) -> JoinHandle<()> {
        self.store
            .spawn_external_poll(self.config.storage.external_poll_interval())
    }

    pub fn refresher(&self) -> Arc<Refresher> {
        Arc::new(Refresher::new(
            self.reconciler.clone(),
            self.dashboard.clone(),
            self.sink.clone(),
            self.config.refresh.refresh_config(),
        ))
    }
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    if let Some(url) = &config.auth.provider_url {
        tracing::info!("Identity provider: {}", url);
        let provider = HttpIdentityProvider::new(url.clone(), config.remote.request_timeout_ms)
            .context("building identity provider client")?;
        return Ok(Arc::new(provider));
    }

    let provider = MemoryIdentityProvider::new();
    for account in &config.auth.accounts {
        provider.add_account_with_id(
            &account.user_id(),
            &account.email,
            &account.password,
            account.role,
        );
    }
    if config.auth.accounts.is_empty() {
        tracing::warn!("No identity provider URL and no [[auth.accounts]]; login will fail");
    } else {
        tracing::info!(
            accounts = config.auth.accounts.len(),
            "Using configured accounts"
        );
    }
    Ok(Arc::new(provider))
}
