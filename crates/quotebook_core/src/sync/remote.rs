//! Remote quote source contract and HTTP implementation.
//!
//! # Responsibility
//! - Fetch the remote quote collection and push the local one.
//! - Map JSONPlaceholder-style post records onto quotes.
//!
//! # Invariants
//! - Fetch and push are independent calls; one failing says nothing about
//!   the other.
//! - Decoded remote quotes keep the remote id and pass `Quote::validate()`.

use crate::config::SyncConfig;
use crate::model::quote::{Quote, QuoteId};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Categories assigned to remote records by `id % 3`.
pub const REMOTE_CATEGORIES: [&str; 3] = ["inspiration", "humor", "life"];

const MAX_ERROR_BODY_CHARS: usize = 200;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote fetch/push failure.
#[derive(Debug)]
pub enum RemoteError {
    /// Connection, timeout or client setup failure.
    Transport(reqwest::Error),
    /// Remote answered with a non-success status.
    Status { status: u16, body: String },
    /// Response body is not the expected shape.
    Decode(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "remote request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "remote returned status {status}: {body}")
            }
            Self::Decode(message) => write!(f, "remote response malformed: {message}"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Status { .. } | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

/// Remote collaborator used by the sync engine.
#[async_trait]
pub trait RemoteQuoteSource: Send + Sync {
    /// Reads the remote quote collection.
    async fn fetch_quotes(&self) -> RemoteResult<Vec<Quote>>;
    /// Sends the full local collection.
    async fn push_quotes(&self, quotes: &[Quote]) -> RemoteResult<()>;
}

#[derive(Deserialize)]
struct RemotePost {
    id: u64,
    #[serde(default)]
    title: Option<String>,
}

/// Decodes a JSON array of post records into at most `limit` quotes.
///
/// Posts with a missing, null or blank title are skipped and do not count
/// toward `limit`.
pub fn decode_remote_posts(body: &str, limit: usize) -> RemoteResult<Vec<Quote>> {
    let posts: Vec<RemotePost> =
        serde_json::from_str(body).map_err(|err| RemoteError::Decode(err.to_string()))?;

    Ok(posts
        .into_iter()
        .filter_map(|post| {
            let category = REMOTE_CATEGORIES[(post.id % 3) as usize];
            Quote::with_id(QuoteId::from(post.id), post.title?, category).ok()
        })
        .take(limit)
        .collect())
}

/// HTTP remote against a `/posts`-style endpoint.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    client: reqwest::Client,
    endpoint: String,
    fetch_limit: usize,
}

impl HttpQuoteSource {
    /// Builds a client with a request timeout.
    ///
    /// # Errors
    /// - `Transport` when the HTTP client cannot be constructed.
    pub fn new(endpoint: &str, fetch_limit: usize, timeout: Duration) -> RemoteResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
            fetch_limit,
        })
    }

    pub fn from_config(config: &SyncConfig) -> RemoteResult<Self> {
        Self::new(
            &config.endpoint,
            config.fetch_limit,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn checked_body(response: reqwest::Response) -> RemoteResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteQuoteSource for HttpQuoteSource {
    async fn fetch_quotes(&self) -> RemoteResult<Vec<Quote>> {
        let response = self.client.get(&self.endpoint).send().await?;
        let body = Self::checked_body(response).await?;
        let quotes = decode_remote_posts(&body, self.fetch_limit)?;
        debug!(
            "event=remote_fetch module=sync status=ok count={}",
            quotes.len()
        );
        Ok(quotes)
    }

    async fn push_quotes(&self, quotes: &[Quote]) -> RemoteResult<()> {
        let response = self.client.post(&self.endpoint).json(quotes).send().await?;
        Self::checked_body(response).await?;
        debug!(
            "event=remote_push module=sync status=ok count={}",
            quotes.len()
        );
        Ok(())
    }
}
