use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use homepage_status::{FeedResponse, IndexStatus, ResponseError, SyncStatus};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Feed {
    Bitcoin,
    Fulcrum,
}

impl Feed {
    pub const ALL: [Feed; 2] = [Feed::Bitcoin, Feed::Fulcrum];

    pub fn path(self) -> &'static str {
        match self {
            Feed::Bitcoin => "/api/bitcoin",
            Feed::Fulcrum => "/api/fulcrum",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Feed::Bitcoin => "bitcoin",
            Feed::Fulcrum => "fulcrum",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeedPayload {
    Bitcoin(SyncStatus),
    Fulcrum(IndexStatus),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollError {
    Client(String),
    Request(String),
    Decode(ResponseError),
    /// The backend answered with an `error` body.
    Backend(String),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Client(message) => write!(f, "http client: {message}"),
            PollError::Request(message) => write!(f, "request failed: {message}"),
            PollError::Decode(err) => write!(f, "{err}"),
            PollError::Backend(message) => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for PollError {}

impl From<ResponseError> for PollError {
    fn from(err: ResponseError) -> Self {
        PollError::Decode(err)
    }
}

/// One finished fetch, tagged with the order in which it was issued.
#[derive(Clone, Debug, PartialEq)]
pub struct PollOutcome {
    pub feed: Feed,
    pub seq: u64,
    pub result: Result<FeedPayload, PollError>,
}

pub struct StatusClient {
    http: reqwest::Client,
    base_url: String,
    next_seq: AtomicU64,
}

impl StatusClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PollError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PollError::Client(err.to_string()))?;
        Ok(Self {
            http,
            base_url: endpoint.trim_end_matches('/').to_string(),
            next_seq: AtomicU64::new(1),
        })
    }

    pub fn url(&self, feed: Feed) -> String {
        format!("{}{}", self.base_url, feed.path())
    }

    /// Fetches one feed. The sequence number is taken before the request
    /// goes out, so a slow answer keeps its place in line.
    pub async fn poll(&self, feed: Feed) -> PollOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let result = self.fetch(feed).await;
        PollOutcome { feed, seq, result }
    }

    async fn fetch(&self, feed: Feed) -> Result<FeedPayload, PollError> {
        // The body is read whatever the status code: the backend reports
        // failures as JSON `error` bodies.
        let body = self
            .http
            .get(self.url(feed))
            .send()
            .await
            .map_err(|err| PollError::Request(err.to_string()))?
            .text()
            .await
            .map_err(|err| PollError::Request(err.to_string()))?;
        match feed {
            Feed::Bitcoin => decode::<SyncStatus>(&body).map(FeedPayload::Bitcoin),
            Feed::Fulcrum => decode::<IndexStatus>(&body).map(FeedPayload::Fulcrum),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, PollError> {
    match FeedResponse::<T>::from_json(body)? {
        FeedResponse::Ready(status) => Ok(status),
        FeedResponse::Failed(message) => Err(PollError::Backend(message)),
    }
}

/// Runs one poll on the runtime and hands the outcome to the UI loop.
pub fn spawn_poll(handle: &Handle, client: Arc<StatusClient>, feed: Feed, tx: Sender<PollOutcome>) {
    handle.spawn(async move {
        let outcome = client.poll(feed).await;
        if tx.send(outcome).is_err() {
            log_debug!("{} poll finished after the dashboard closed", feed.label());
        }
    });
}

pub fn spawn_poll_all(handle: &Handle, client: &Arc<StatusClient>, tx: &Sender<PollOutcome>) {
    for feed in Feed::ALL {
        spawn_poll(handle, Arc::clone(client), feed, tx.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_endpoint_and_path() {
        let client = StatusClient::new("http://node.local:8088/", Duration::from_secs(1))
            .expect("client");
        assert_eq!(client.url(Feed::Bitcoin), "http://node.local:8088/api/bitcoin");
        assert_eq!(client.url(Feed::Fulcrum), "http://node.local:8088/api/fulcrum");
    }

    #[test]
    fn error_body_becomes_backend_error() {
        let err = decode::<IndexStatus>(r#"{"error":"fulcrum unreachable"}"#).expect_err("error body");
        assert_eq!(err, PollError::Backend("fulcrum unreachable".to_string()));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = decode::<SyncStatus>("<html>502</html>").expect_err("html body");
        assert!(matches!(err, PollError::Decode(ResponseError::Json(_))), "{err:?}");
    }
}
