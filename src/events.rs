//! Server-push event channel.
//!
//! On subscribe the channel pulls one full snapshot (covering the gap
//! before the first push frame), then consumes the `/events` stream and
//! writes into the injected [`StateStore`]. The binding to the concrete
//! transport sits behind [`PushFeed`], so tests drive the channel with a
//! scripted feed instead of a socket.
//!
//! Connectivity is derived from stream lifecycle only: an established
//! (re)connection or any decodable event means connected; a dropped
//! stream that is about to be retried leaves the flag untouched, so
//! normal reconnects do not flap it; a failed (re)connect attempt means
//! lost, until a later retry succeeds.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, Result};
use crate::model::NowPlayingInfo;
use crate::sse::{SseDecoder, SseEvent};
use crate::store::StateStore;

/// The only push event type carrying state; everything else is ignored.
pub const NOW_PLAYING_EVENT: &str = "now-playing";

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What a push feed yields to the channel.
#[derive(Debug)]
pub enum FeedSignal {
    /// Connection established (or re-established).
    Opened,
    /// A named push frame.
    Event(SseEvent),
    /// The stream dropped but the feed is about to reconnect. Not
    /// terminal: connectivity must not change on this signal.
    Interrupted,
    /// A (re)connect attempt failed. The channel is closed until a later
    /// retry succeeds.
    Lost,
}

/// Source of push signals. The production implementation is [`SseFeed`];
/// tests script their own.
#[async_trait]
pub trait PushFeed: Send {
    async fn next(&mut self) -> FeedSignal;
}

pub struct EventChannel;

impl EventChannel {
    /// Subscribe with the production SSE feed.
    pub fn subscribe(api: Arc<ApiClient>, store: Arc<StateStore>) -> Result<EventChannelHandle> {
        let feed = SseFeed::new(&api)?;
        Ok(Self::subscribe_with_feed(api, store, feed))
    }

    /// Subscribe with an explicit feed (testing, alternative transports).
    pub fn subscribe_with_feed(
        api: Arc<ApiClient>,
        store: Arc<StateStore>,
        feed: impl PushFeed + 'static,
    ) -> EventChannelHandle {
        let gate = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(Self::run(api, store, Arc::clone(&gate), feed));
        EventChannelHandle { gate, task }
    }

    async fn run(
        api: Arc<ApiClient>,
        store: Arc<StateStore>,
        gate: Arc<AtomicBool>,
        mut feed: impl PushFeed,
    ) {
        // Initial authoritative read; a failure here is not fatal, the
        // refresh scheduler polls independently.
        match api.now().await {
            Ok(snapshot) => {
                if gate.load(Ordering::SeqCst) {
                    store.apply_full_snapshot(snapshot);
                }
            }
            Err(e) => warn!(error = %e, "initial snapshot read failed, waiting for push/poll"),
        }

        loop {
            let signal = feed.next().await;
            if !gate.load(Ordering::SeqCst) {
                return;
            }
            match signal {
                FeedSignal::Opened => {
                    info!("push channel open");
                    store.apply_connectivity(true);
                }
                FeedSignal::Event(event) => Self::handle_event(&store, event),
                FeedSignal::Interrupted => {
                    debug!("push stream interrupted, reconnecting");
                }
                FeedSignal::Lost => {
                    warn!("push channel lost");
                    store.apply_connectivity(false);
                }
            }
        }
    }

    fn handle_event(store: &StateStore, event: SseEvent) {
        match event.name.as_str() {
            NOW_PLAYING_EVENT => match serde_json::from_str::<NowPlayingInfo>(&event.data) {
                Ok(now) => {
                    // A decodable frame proves the server is reachable.
                    store.apply_connectivity(true);
                    store.apply_now_playing(now);
                }
                Err(e) => warn!(error = %e, "undecodable now-playing payload"),
            },
            other => debug!(event = other, "ignoring unknown push event"),
        }
    }
}

/// Owns the channel task. [`unsubscribe`](Self::unsubscribe) (or drop)
/// tears the channel down; afterwards no store mutation from this channel
/// instance occurs, even for signals already in flight.
pub struct EventChannelHandle {
    gate: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl EventChannelHandle {
    /// Idempotent; safe to call from anywhere, including a store observer
    /// running on the channel's own task.
    pub fn unsubscribe(&self) {
        self.gate.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for EventChannelHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ── Production feed: SSE over reqwest ────────────────────────────────

type ChunkStream = futures_util::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>;

enum FeedState {
    Disconnected { backoff: bool },
    Connected(ConnectedFeed),
}

struct ConnectedFeed {
    stream: ChunkStream,
    decoder: SseDecoder,
    queued: VecDeque<SseEvent>,
}

/// `/events` consumer with exponential reconnect backoff. The feed never
/// gives up; teardown happens by dropping it (the channel task owns it).
pub struct SseFeed {
    http: reqwest::Client,
    url: String,
    state: FeedState,
    failures: u32,
}

impl SseFeed {
    pub fn new(api: &ApiClient) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url: api.events_url(),
            state: FeedState::Disconnected { backoff: false },
            failures: 0,
        })
    }

    async fn connect(&self) -> Result<ChunkStream> {
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // e.g. 406 while the server is load-shedding.
            return Err(ApiError::Protocol(format!(
                "event stream refused (HTTP {status})"
            )));
        }
        Ok(response.bytes_stream().boxed())
    }

    fn backoff_delay(failures: u32) -> Duration {
        let doublings = failures.min(6);
        BACKOFF_BASE
            .saturating_mul(1 << doublings)
            .min(BACKOFF_CAP)
    }
}

#[async_trait]
impl PushFeed for SseFeed {
    async fn next(&mut self) -> FeedSignal {
        loop {
            if let FeedState::Connected(connected) = &mut self.state {
                if let Some(event) = connected.queued.pop_front() {
                    self.failures = 0;
                    return FeedSignal::Event(event);
                }
                match connected.stream.next().await {
                    Some(Ok(chunk)) => {
                        connected.queued.extend(connected.decoder.push(&chunk));
                        continue;
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "event stream read failed");
                        self.state = FeedState::Disconnected { backoff: true };
                        return FeedSignal::Interrupted;
                    }
                    None => {
                        debug!("event stream ended");
                        self.state = FeedState::Disconnected { backoff: true };
                        return FeedSignal::Interrupted;
                    }
                }
            }

            if matches!(self.state, FeedState::Disconnected { backoff: true }) {
                tokio::time::sleep(Self::backoff_delay(self.failures)).await;
            }

            match self.connect().await {
                Ok(stream) => {
                    self.failures = 0;
                    self.state = FeedState::Connected(ConnectedFeed {
                        stream,
                        decoder: SseDecoder::new(),
                        queued: VecDeque::new(),
                    });
                    return FeedSignal::Opened;
                }
                Err(e) => {
                    debug!(error = %e, failures = self.failures, "event stream connect failed");
                    self.failures = self.failures.saturating_add(1);
                    self.state = FeedState::Disconnected { backoff: true };
                    return FeedSignal::Lost;
                }
            }
        }
    }
}
