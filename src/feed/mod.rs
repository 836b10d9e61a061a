//! The message feed seen by the engine: the gateway trait, its error type,
//! and feed id resolution.
//!
//! [`ChatGateway`] is the only way the engine talks to the remote API.
//! [`crate::youtube::YouTubeClient`] implements it over HTTP; tests plug in
//! scripted implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::youtube::types::{LiveBroadcast, LiveChatMessage, LiveChatMessageListResponse};

pub mod resolver;

pub use resolver::resolve_feed_id;

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One page of new messages plus the server's paging hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBatch {
    /// Messages received since the previous page token.
    pub messages: Vec<LiveChatMessage>,
    /// Token to request the next page with.
    pub next_page_token: String,
    /// Server-suggested delay before the next poll, when given.
    pub polling_interval: Option<Duration>,
}

impl From<LiveChatMessageListResponse> for MessageBatch {
    fn from(response: LiveChatMessageListResponse) -> Self {
        Self {
            messages: response.items,
            next_page_token: response.next_page_token.unwrap_or_default(),
            polling_interval: response.polling_interval_millis.map(Duration::from_millis),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by a [`ChatGateway`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request timed out or was cancelled. The only retryable kind.
    #[error("request timed out")]
    Timeout,
    /// HTTP transport failure other than a timeout.
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    /// The API responded with a non-success status.
    #[error("non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized, truncated response body.
        body: String,
    },
    /// The response body did not match the expected schema.
    #[error("response parse error: {0}")]
    Parse(String),
}

impl GatewayError {
    /// Whether the polling loop may retry after this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Request/response surface of the remote chat API.
///
/// Implementations are shared between the polling task and callers of
/// `send_message`, so they must be safe to use concurrently.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// List the broadcasts visible to the authorized account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on transport, status or parse failure.
    async fn list_broadcasts(&self) -> Result<Vec<LiveBroadcast>, GatewayError>;

    /// Fetch messages posted after `page_token` (empty for the start of the feed).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] for transient failures and other
    /// variants for everything else.
    async fn fetch_batch(
        &self,
        feed_id: &str,
        page_token: &str,
    ) -> Result<MessageBatch, GatewayError>;

    /// Post a text message to the feed and return the created record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the request fails. Never retried.
    async fn post_message(&self, feed_id: &str, text: &str)
        -> Result<LiveChatMessage, GatewayError>;
}
