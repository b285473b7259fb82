//! User-initiated transport controls.
//!
//! Every command is a single remote call followed by a scheduler-driven
//! refresh: the mutating endpoints only acknowledge, so the resulting
//! state is always observed through the next `/now` pull rather than
//! assumed locally. On failure nothing is scheduled and the error reaches
//! the caller untouched; the user asked for the action and needs to know
//! it did not happen.
//!
//! Commands are not serialized against each other; concurrent calls are
//! independent requests and the server arbitrates.

use std::sync::Arc;
use tracing::debug;

use crate::api::ApiClient;
use crate::error::Result;
use crate::scheduler::RefreshScheduler;

pub struct CommandDispatcher {
    api: Arc<ApiClient>,
    scheduler: Arc<RefreshScheduler>,
}

impl CommandDispatcher {
    pub fn new(api: Arc<ApiClient>, scheduler: Arc<RefreshScheduler>) -> Self {
        Self { api, scheduler }
    }

    /// Toggle pause. The server decides the resulting state.
    pub async fn pause(&self) -> Result<()> {
        debug!("dispatching pause");
        self.api.pause().await?;
        self.scheduler.schedule_after_command();
        Ok(())
    }

    /// Queue the current clip to play once more.
    pub async fn repeat(&self) -> Result<()> {
        debug!("dispatching repeat");
        self.api.repeat().await?;
        self.scheduler.schedule_after_command();
        Ok(())
    }

    /// Skip the current clip.
    pub async fn skip(&self) -> Result<()> {
        debug!("dispatching skip");
        self.api.skip().await?;
        self.scheduler.schedule_after_command();
        Ok(())
    }

    /// Enqueue a library clip by id. Fails with a business error when the
    /// server does not know the id.
    pub async fn schedule(&self, file_id: &str) -> Result<()> {
        debug!(file_id, "dispatching schedule");
        self.api.schedule(file_id).await?;
        self.scheduler.schedule_after_command();
        Ok(())
    }

    /// Inject the news clip. Gated by the server's `news` config flag; a
    /// call while disabled comes back as a clean business error.
    pub async fn inject_news(&self) -> Result<()> {
        debug!("dispatching news injection");
        self.api.schedule_news().await?;
        self.scheduler.schedule_after_command();
        Ok(())
    }
}
