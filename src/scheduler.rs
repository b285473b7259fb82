//! Decides when to pull a fresh snapshot.
//!
//! One optional timer task is the whole state: arming a new timer always
//! cancels the pending one, so at most one refresh can ever be scheduled.
//! After each refresh the scheduler re-arms itself (short interval while
//! the embedding surface is in the foreground, long while backgrounded),
//! which bounds staleness even when the push channel is silent.
//!
//! A failed refresh is logged and otherwise ignored: the last good
//! snapshot stays on display and the next poll is the retry. Command
//! failures are *not* handled here; those surface to the user.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::store::StateStore;

/// Short delay before a kicked refresh, so near-simultaneous triggers
/// (command + visibility change) collapse into one request.
pub const KICK_DELAY: Duration = Duration::from_millis(10);
pub const FOREGROUND_INTERVAL: Duration = Duration::from_millis(3141);
pub const BACKGROUND_INTERVAL: Duration = Duration::from_millis(6666);

pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    api: Arc<ApiClient>,
    store: Arc<StateStore>,
    foreground: AtomicBool,
    foreground_interval: Duration,
    background_interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(api: Arc<ApiClient>, store: Arc<StateStore>) -> Self {
        Self::with_intervals(api, store, FOREGROUND_INTERVAL, BACKGROUND_INTERVAL)
    }

    pub fn with_intervals(
        api: Arc<ApiClient>,
        store: Arc<StateStore>,
        foreground_interval: Duration,
        background_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                api,
                store,
                foreground: AtomicBool::new(true),
                foreground_interval,
                background_interval,
                timer: Mutex::new(None),
            }),
        }
    }

    /// Refresh after [`KICK_DELAY`], cancelling any pending timer. Used at
    /// startup and when the surface returns to the foreground.
    pub fn schedule_immediate(&self) {
        SchedulerInner::arm(&self.inner, KICK_DELAY);
    }

    /// Refresh after a mutating call succeeded. The command endpoints
    /// don't return a snapshot, so the effect is only observable by
    /// re-pulling.
    pub fn schedule_after_command(&self) {
        SchedulerInner::arm(&self.inner, KICK_DELAY);
    }

    /// Tell the scheduler whether the embedding surface is being watched.
    /// A background-to-foreground transition kicks an immediate refresh.
    pub fn set_foreground(&self, foreground: bool) {
        let was = self.inner.foreground.swap(foreground, Ordering::SeqCst);
        if foreground && !was {
            self.schedule_immediate();
        }
    }

    /// Cancel the pending timer, if any. The scheduler can be re-armed
    /// afterwards with `schedule_immediate`.
    pub fn shutdown(&self) {
        if let Some(pending) = self.inner.timer.lock().unwrap().take() {
            pending.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending_timer(&self) -> bool {
        self.inner.timer.lock().unwrap().is_some()
    }
}

impl SchedulerInner {
    /// Cancel-then-reschedule, atomically under the timer lock.
    fn arm(inner: &Arc<SchedulerInner>, delay: Duration) {
        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            SchedulerInner::refresh_and_rearm(task_inner).await;
        });

        let mut slot = inner.timer.lock().unwrap();
        if let Some(previous) = slot.replace(handle) {
            // When the running timer task re-arms itself, `previous` is its
            // own already-past handle and this abort has nothing to cancel.
            previous.abort();
        }
    }

    async fn refresh_and_rearm(inner: Arc<SchedulerInner>) {
        match inner.api.now().await {
            Ok(snapshot) => inner.store.apply_full_snapshot(snapshot),
            Err(e) => warn!(error = %e, "scheduled refresh failed, keeping last snapshot"),
        }

        let interval = if inner.foreground.load(Ordering::SeqCst) {
            inner.foreground_interval
        } else {
            inner.background_interval
        };
        debug!(?interval, "re-arming poll timer");
        Self::arm(&inner, interval);
    }
}
