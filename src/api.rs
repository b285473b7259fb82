//! HTTP transport for the playout server API.
//!
//! Every endpoint replies with a JSON envelope: `{"status":"ok", ...}` on
//! success or `{"status":"error","message":...}` on failure, regardless of
//! the HTTP status code. [`ApiClient`] is a single-attempt abstraction:
//! it classifies each exchange into the [`ApiError`] taxonomy and never
//! retries; retry policy belongs to the refresh scheduler.

use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::model::{
    HistoryEntry, LibraryStats, NowPlayingInfo, PlayoutSnapshot, SearchResultEntry, ServerConfig,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Client for a server reachable at `host` (e.g. `"radio.local:8080"`).
    pub fn new(host: &str) -> Result<Self> {
        Self::with_base_url(format!("http://{host}/api"))
    }

    /// Client with an explicit API base URL, no trailing slash.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }

    /// One request, one classified result. `form` is sent as an
    /// `application/x-www-form-urlencoded` body when present.
    pub async fn call(
        &self,
        path: &str,
        method: Method,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "api request");

        let mut request = self
            .http
            .request(method, &url)
            .header(header::CACHE_CONTROL, "no-cache");
        if let Some(fields) = form {
            request = request.form(fields);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_redirection() {
            return Err(ApiError::Redirect(status));
        }

        // The server wraps business errors in a 400 + error envelope, so
        // the body has to be parsed before the HTTP status means anything.
        let body = response.text().await?;
        decode_envelope(&body, status)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Full snapshot read. Both observed wire shapes (nested `now`
    /// sub-object, legacy flat fields) decode to the canonical snapshot.
    pub async fn now(&self) -> Result<PlayoutSnapshot> {
        let value = self.call("/now", Method::GET, None).await?;
        let wire: NowWire = decode_payload(value)?;
        Ok(wire.into_snapshot())
    }

    /// Server-side feature flags.
    pub async fn server_config(&self) -> Result<ServerConfig> {
        let value = self.call("/config", Method::POST, None).await?;
        decode_payload(value)
    }

    /// Search the clip library. A blank query resolves to no results
    /// without touching the network.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResultEntry>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!("/library/search?query={}", urlencoding::encode(query));
        let value = self.call(&path, Method::GET, None).await?;
        let results: SearchResultsWire = decode_payload(value)?;
        Ok(results.results)
    }

    /// URL a browser (or curl) can fetch the raw clip from. Constructed
    /// only; this client never downloads clip audio itself.
    pub fn download_url(&self, file_id: &str) -> String {
        format!(
            "{}/library/download?file={}",
            self.base_url,
            urlencoding::encode(file_id)
        )
    }

    // ── Mutations (single attempt, no follow-up refresh here) ────────

    pub async fn skip(&self) -> Result<()> {
        self.call("/skip", Method::PUT, None).await.map(drop)
    }

    pub async fn pause(&self) -> Result<()> {
        self.call("/pause", Method::POST, None).await.map(drop)
    }

    pub async fn repeat(&self) -> Result<()> {
        self.call("/repeat", Method::PUT, None).await.map(drop)
    }

    pub async fn schedule(&self, file_id: &str) -> Result<()> {
        self.call("/schedule", Method::POST, Some(&[("file", file_id)]))
            .await
            .map(drop)
    }

    pub async fn schedule_news(&self) -> Result<()> {
        self.call("/schedule/news", Method::POST, None).await.map(drop)
    }
}

/// Classify a response body against the envelope contract.
fn decode_envelope(body: &str, status: StatusCode) -> Result<Value> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| ApiError::Protocol(format!("response is not valid JSON (HTTP {status})")))?;

    match value.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(value),
        Some("error") => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("operation failed");
            Err(ApiError::Api(message.to_string()))
        }
        _ => Err(ApiError::Protocol("envelope has no status field".to_string())),
    }
}

fn decode_payload<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ApiError::Protocol(e.to_string()))
}

/// `/now` wire shape. Newer servers nest the now-playing fragment under
/// `now`; older ones report `current`/`history` at the top level and have
/// no pause flag at all.
#[derive(serde::Deserialize)]
struct NowWire {
    now: Option<NowPlayingInfo>,
    #[serde(default)]
    current: Option<String>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    library: LibraryStats,
    #[serde(default)]
    uptime: String,
}

impl NowWire {
    fn into_snapshot(self) -> PlayoutSnapshot {
        let now = self.now.unwrap_or(NowPlayingInfo {
            current: self.current.unwrap_or_default(),
            is_pause: false,
            history: self.history,
        });
        PlayoutSnapshot {
            now,
            library: self.library,
            uptime: self.uptime,
        }
    }
}

#[derive(serde::Deserialize)]
struct SearchResultsWire {
    results: Vec<SearchResultEntry>,
}
