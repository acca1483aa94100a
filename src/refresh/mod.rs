//! View refresher
//!
//! Two timers: a long one reloads every manager and re-renders
//! everything, a short one redraws the charts from the lists already in
//! memory. An auth transition triggers a full refresh outside the cycle.

use crate::auth::{AuthError, SessionReconciler};
use crate::dashboard::Dashboard;
use crate::domain::{
    DepartmentManager, DomainError, DomainResult, EmployeeManager, HourManager, LoadSource,
    PayrollManager,
};
use crate::view::ViewSink;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A record list that can be reloaded and rendered
#[async_trait]
pub trait Refreshable: Send + Sync {
    fn name(&self) -> &str;

    async fn load_data(&self) -> DomainResult<LoadSource>;

    fn render(&self, sink: &dyn ViewSink);
}

#[async_trait]
impl Refreshable for EmployeeManager {
    fn name(&self) -> &str {
        "employees"
    }

    async fn load_data(&self) -> DomainResult<LoadSource> {
        EmployeeManager::load_data(self).await
    }

    fn render(&self, sink: &dyn ViewSink) {
        EmployeeManager::render(self, sink)
    }
}

#[async_trait]
impl Refreshable for DepartmentManager {
    fn name(&self) -> &str {
        "departments"
    }

    async fn load_data(&self) -> DomainResult<LoadSource> {
        DepartmentManager::load_data(self).await
    }

    fn render(&self, sink: &dyn ViewSink) {
        DepartmentManager::render(self, sink)
    }
}

#[async_trait]
impl Refreshable for HourManager {
    fn name(&self) -> &str {
        "hours"
    }

    async fn load_data(&self) -> DomainResult<LoadSource> {
        HourManager::load_data(self).await
    }

    fn render(&self, sink: &dyn ViewSink) {
        HourManager::render(self, sink)
    }
}

#[async_trait]
impl Refreshable for PayrollManager {
    fn name(&self) -> &str {
        "payroll"
    }

    async fn load_data(&self) -> DomainResult<LoadSource> {
        PayrollManager::load_data(self).await
    }

    fn render(&self, sink: &dyn ViewSink) {
        PayrollManager::render(self, sink)
    }
}

/// Timer periods
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshConfig {
    pub full_interval: Duration,
    pub chart_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            full_interval: Duration::from_secs(300),
            chart_interval: Duration::from_secs(30),
        }
    }
}

/// Counters exposed for status output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshStats {
    pub full_cycles: u64,
    pub chart_cycles: u64,
    pub failed_loads: u64,
    pub last_full: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Drives the reload and render cycles
pub struct Refresher {
    reconciler: Arc<SessionReconciler>,
    dashboard: Arc<Dashboard>,
    sources: Vec<Arc<dyn Refreshable>>,
    sink: Arc<dyn ViewSink>,
    config: RefreshConfig,
    running: Arc<RwLock<bool>>,
    shutdown: Notify,
    stats: RwLock<RefreshStats>,
}

impl Refresher {
    pub fn new(
        reconciler: Arc<SessionReconciler>,
        dashboard: Arc<Dashboard>,
        sink: Arc<dyn ViewSink>,
        config: RefreshConfig,
    ) -> Self {
        let managers = dashboard.managers();
        let sources: Vec<Arc<dyn Refreshable>> = vec![
            managers.employees.clone(),
            managers.departments.clone(),
            managers.hours.clone(),
            managers.payroll.clone(),
        ];

        Self {
            reconciler,
            dashboard,
            sources,
            sink,
            config,
            running: Arc::new(RwLock::new(false)),
            shutdown: Notify::new(),
            stats: RwLock::new(RefreshStats::default()),
        }
    }

    pub async fn stats(&self) -> RefreshStats {
        self.stats.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Reload and re-render everything for the current date
    pub async fn refresh_all(&self) -> usize {
        self.refresh_all_at(Local::now().date_naive()).await
    }

    /// Reload every source and re-render; returns the number of failed loads
    ///
    /// A failed load leaves that list empty, so the views show neutral
    /// values instead of stale or placeholder data.
    pub async fn refresh_all_at(&self, today: NaiveDate) -> usize {
        let mut failed = 0;
        let mut last_error = None;

        for source in &self.sources {
            match source.load_data().await {
                Ok(from) => {
                    tracing::debug!(source = source.name(), from = %from, "Loaded");
                }
                Err(DomainError::Auth(e @ (AuthError::NotAuthenticated | AuthError::Forbidden(_)))) => {
                    tracing::debug!(source = source.name(), reason = %e, "Skipped");
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "Load failed");
                    failed += 1;
                    last_error = Some(format!("{}: {}", source.name(), e));
                }
            }
            source.render(self.sink.as_ref());
        }

        self.dashboard.render(self.sink.as_ref(), today);
        self.dashboard.render_charts(self.sink.as_ref(), today);

        let mut stats = self.stats.write().await;
        stats.full_cycles += 1;
        stats.failed_loads += failed as u64;
        stats.last_full = Some(Utc::now());
        if last_error.is_some() {
            stats.last_error = last_error;
        }

        tracing::info!(
            state = %self.reconciler.auth_state(),
            failed,
            "Views refreshed"
        );
        failed
    }

    /// Redraw charts from memory; nothing is fetched
    pub async fn refresh_charts(&self) {
        self.refresh_charts_at(Local::now().date_naive()).await
    }

    pub async fn refresh_charts_at(&self, today: NaiveDate) {
        self.dashboard.render_charts(self.sink.as_ref(), today);
        self.stats.write().await.chart_cycles += 1;
    }

    /// Start the timers once the first auth check has completed
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let refresher = self.clone();

        tokio::spawn(async move {
            *refresher.running.write().await = true;
            let mut events = refresher.reconciler.subscribe();

            let state = refresher.reconciler.wait_ready().await;
            tracing::info!(%state, "Auth ready, starting refresh cycles");
            refresher.refresh_all().await;

            let full_period = refresher.config.full_interval;
            let chart_period = refresher.config.chart_interval;
            let mut full = interval_at(Instant::now() + full_period, full_period);
            let mut charts = interval_at(Instant::now() + chart_period, chart_period);
            full.set_missed_tick_behavior(MissedTickBehavior::Delay);
            charts.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                if !*refresher.running.read().await {
                    break;
                }

                tokio::select! {
                    _ = refresher.shutdown.notified() => break,
                    _ = full.tick() => {
                        refresher.refresh_all().await;
                    }
                    _ = charts.tick() => {
                        refresher.refresh_charts().await;
                    }
                    event = events.recv() => match event {
                        Ok(event) => {
                            tracing::info!(state = %event.state, "Auth changed, refreshing");
                            refresher.refresh_all().await;
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Auth events lagged, refreshing");
                            refresher.refresh_all().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            *refresher.running.write().await = false;
            tracing::info!("Refresh cycles stopped");
        })
    }

    /// Stop the timers after the current cycle
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.shutdown.notify_one();
    }
}
