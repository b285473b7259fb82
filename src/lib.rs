//! Client synchronization layer for a wavestreamer-style internet-radio
//! playout server.
//!
//! The crate maintains one eventually-consistent view of remote playout
//! state (current clip, pause flag, history, connectivity) on top of an
//! unreliable push channel with a polling fallback:
//!
//! - [`ApiClient`]: single-attempt HTTP transport with the server's
//!   JSON envelope decoded into a typed error taxonomy.
//! - [`EventChannel`]: consumes the server-push stream and derives
//!   connectivity from its lifecycle.
//! - [`StateStore`]: the single authoritative snapshot plus observer
//!   fan-out; updated replace-wholesale, never merged.
//! - [`RefreshScheduler`]: owns the one outstanding poll timer
//!   (foreground/background intervals, post-command kicks).
//! - [`CommandDispatcher`]: transport controls (pause, repeat, skip,
//!   schedule, news), each confirmed by a follow-up refresh.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod scheduler;
pub mod sse;
pub mod store;

pub use api::ApiClient;
pub use commands::CommandDispatcher;
pub use config::Config;
pub use error::{ApiError, Result};
pub use events::{EventChannel, EventChannelHandle, FeedSignal, PushFeed, SseFeed};
pub use model::{
    HistoryEntry, LibraryStats, NowPlayingInfo, PlayoutSnapshot, SearchResultEntry, ServerConfig,
};
pub use scheduler::RefreshScheduler;
pub use store::{ObserverId, StateStore, StoreState};
