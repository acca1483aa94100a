//! Session expiry timer
//!
//! At most one deferred task is pending. Scheduling again aborts the
//! previous task first.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct SessionTimeout {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTimeout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_expire` after `after`, replacing any pending timer
    ///
    /// Outside a tokio runtime nothing is scheduled.
    pub fn schedule<F>(&self, after: Duration, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, session expiry disabled");
            return;
        };

        let handle = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            on_expire.await;
        });

        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Abort the pending timer, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.take() {
            handle.abort();
        }
    }

    /// Drop the pending handle without aborting, if it is the calling task's
    ///
    /// Returns `false` when the timer was re-armed in the meantime; the
    /// newer handle stays pending.
    pub fn release_current(&self) -> bool {
        let Some(current) = tokio::task::try_id() else {
            return false;
        };
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.as_ref() {
            Some(handle) if handle.id() == current => {
                pending.take();
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }

    fn take(&self) -> Option<JoinHandle<()>> {
        self.pending.lock().ok().and_then(|mut p| p.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fires_once() {
        let timeout = SessionTimeout::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        timeout.schedule(Duration::from_millis(20), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timeout.is_armed());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timeout.is_armed());
    }

    #[tokio::test]
    async fn test_reschedule_cancels_previous() {
        let timeout = SessionTimeout::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = fired.clone();
            timeout.schedule(Duration::from_millis(40), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel() {
        let timeout = SessionTimeout::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        timeout.schedule(Duration::from_millis(20), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timeout.cancel();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timeout.is_armed());
    }

    #[tokio::test]
    async fn test_release_only_from_owning_task() {
        let timeout = Arc::new(SessionTimeout::new());
        timeout.schedule(Duration::from_secs(60), async {});

        let other = timeout.clone();
        let released = tokio::spawn(async move { other.release_current() })
            .await
            .unwrap();
        assert!(!released);
        assert!(timeout.is_armed());

        let (tx, rx) = tokio::sync::oneshot::channel();
        let inner = timeout.clone();
        timeout.schedule(Duration::from_millis(20), async move {
            let _ = tx.send(inner.release_current());
        });
        assert!(rx.await.unwrap());
        assert!(!timeout.is_armed());
    }
}
