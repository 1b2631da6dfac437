//! HTTP live source
//!
//! Talks to the commentary server:
//! - `POST /go-live/`      start a session
//! - `GET  /recordings/`   cumulative segment list, grouped by session
//! - `GET  /replies/next/` pop at most one rendered reply
//!
//! Media URLs in responses may be server-relative; they are resolved against
//! the configured base URL before they reach the audio sink.

use super::{LiveSource, SegmentDescriptor, SegmentPoll, SessionInfo};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("livecast-player/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 240;

#[derive(Debug, Serialize)]
struct GoLiveRequest<'a> {
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct GoLiveResponse {
    #[serde(default)]
    session_ts: Option<Value>,
    #[serde(default)]
    total_chunks: Option<u64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordingsResponse {
    #[serde(default)]
    sessions: Vec<RecordingSession>,
}

#[derive(Debug, Deserialize)]
struct RecordingSession {
    session: Value,
    #[serde(default)]
    files: Vec<RecordingFile>,
}

#[derive(Debug, Deserialize)]
struct RecordingFile {
    filename: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct NextReplyResponse {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    url: Option<String>,
}

/// Session ids arrive as JSON numbers or strings; compare them as text
fn token_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn excerpt(body: &str) -> String {
    body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// `LiveSource` backed by the commentary server's JSON endpoints
#[derive(Debug, Clone)]
pub struct HttpLiveSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpLiveSource {
    /// Create a source for `server_url` with a per-request timeout
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let mut normalized = server_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("invalid server_url '{}': {}", server_url, e)))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Base URL all endpoints and media paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Resolve a possibly server-relative media URL
    pub fn resolve_media_url(&self, url: &str) -> Result<String> {
        self.base_url
            .join(url)
            .map(String::from)
            .map_err(|e| Error::Protocol(format!("invalid media url '{}': {}", url, e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "Polling live source");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SourceUnavailable(format!(
                "GET {} returned HTTP {} ({})",
                path,
                status.as_u16(),
                excerpt(&body)
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl LiveSource for HttpLiveSource {
    async fn start_session(&self, language: &str) -> Result<SessionInfo> {
        let url = self.endpoint("go-live/")?;
        info!(language = %language, "Requesting live session");

        let response = self
            .client
            .post(url)
            .json(&GoLiveRequest { language })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<GoLiveResponse> = serde_json::from_str(&body).ok();

        let Some(parsed) = parsed else {
            return Err(if status.is_success() {
                Error::Protocol(format!("go-live response is not JSON ({})", excerpt(&body)))
            } else {
                Error::SessionRejected(format!("HTTP {} ({})", status.as_u16(), excerpt(&body)))
            });
        };

        let session_id = parsed.session_ts.as_ref().and_then(token_text);
        match (status, parsed.status.as_deref(), session_id) {
            (status, Some("queued"), Some(session_id)) if status.is_success() => {
                let expected_segments = parsed.total_chunks.unwrap_or(0) as usize;
                info!(
                    session_id = %session_id,
                    expected_segments,
                    "Live session queued"
                );
                Ok(SessionInfo {
                    session_id,
                    expected_segments,
                })
            }
            (status, _, _) => {
                let reason = parsed
                    .error
                    .unwrap_or_else(|| "Failed to queue live session".to_string());
                Err(Error::SessionRejected(if status == StatusCode::OK {
                    reason
                } else {
                    format!("HTTP {}: {}", status.as_u16(), reason)
                }))
            }
        }
    }

    async fn poll_segments(&self, session_id: &str) -> Result<SegmentPoll> {
        let payload: RecordingsResponse = self.get_json("recordings/").await?;

        let Some(found) = payload
            .sessions
            .into_iter()
            .find(|s| token_text(&s.session).as_deref() == Some(session_id))
        else {
            return Ok(SegmentPoll::default());
        };

        let segments = found
            .files
            .into_iter()
            .map(|file| {
                let url = self.resolve_media_url(&file.url)?;
                Ok(SegmentDescriptor::new(file.filename, url))
            })
            .collect::<Result<Vec<_>>>()?;

        // This server has no completion marker; completion arrives out of band.
        Ok(SegmentPoll {
            segments,
            complete: false,
        })
    }

    async fn poll_next_reply(&self) -> Result<Option<String>> {
        let payload: NextReplyResponse = self.get_json("replies/next/").await?;

        match (payload.found, payload.url) {
            (true, Some(url)) if !url.is_empty() => Ok(Some(self.resolve_media_url(&url)?)),
            _ => Ok(None),
        }
    }
}
