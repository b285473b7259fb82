//! Domain models for playout state.
//!
//! A [`PlayoutSnapshot`] is the complete, authoritative description of the
//! server's state at one instant. Snapshots are value types: a refresh
//! replaces the whole snapshot, it never patches fields in place.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Sentinel the server reports as `current` when nothing is airing.
pub const IDLE_CLIP: &str = "-";

/// Full playout state: the now-playing fragment plus library counters and
/// server uptime. `library` and `uptime` only change on a full `/now` read;
/// push events carry just the [`NowPlayingInfo`] fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayoutSnapshot {
    pub now: NowPlayingInfo,
    #[serde(default)]
    pub library: LibraryStats,
    #[serde(default)]
    pub uptime: String,
}

impl PlayoutSnapshot {
    /// A new snapshot with the now-playing fragment replaced wholesale and
    /// everything else carried over.
    pub fn with_now(&self, now: NowPlayingInfo) -> Self {
        Self {
            now,
            library: self.library.clone(),
            uptime: self.uptime.clone(),
        }
    }
}

/// What is airing right now. This is the payload of `now-playing` push
/// events and the `now` sub-object of a full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingInfo {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub is_pause: bool,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl NowPlayingInfo {
    /// True when nothing is airing (`"-"` sentinel or empty title).
    pub fn is_idle(&self) -> bool {
        self.current.is_empty() || self.current == IDLE_CLIP
    }
}

/// One played clip. The server keeps history chronologically ascending by
/// `start` and bounds its length; entries are never mutated after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// RFC 3339, possibly with sub-millisecond precision.
    pub start: DateTime<FixedOffset>,
    pub title: String,
    /// Manually skipped before natural completion.
    #[serde(default)]
    pub skipped: bool,
    /// Injected by an operator rather than the automatic rotation.
    #[serde(default)]
    pub user_scheduled: bool,
}

impl HistoryEntry {
    /// Time-of-day string (`HH:MM`) in the timestamp's own zone offset,
    /// which is the server's local time. Sub-minute precision is dropped.
    pub fn local_time_of_day(&self) -> String {
        self.start.format("%H:%M").to_string()
    }
}

/// Library composition counters, informational only. `night` is reported
/// by the server but was never displayed by the original panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    #[serde(default)]
    pub music: u32,
    #[serde(default)]
    pub hosts: u32,
    #[serde(default)]
    pub other: u32,
    #[serde(default)]
    pub night: u32,
}

/// One hit from `/library/search`. Ephemeral: owned by whoever ran the
/// query, never stored in the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    pub id: String,
    /// Path-like, e.g. `music/album/track.mp3`.
    pub name: String,
}

/// Server-side feature flags from `/config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Whether the news-injection feature is enabled on this server.
    #[serde(default)]
    pub news: bool,
}
