//! HTTP client for the live chat endpoints of the YouTube Data API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{check_http_response, http_client};
use super::types::{
    LiveBroadcast, LiveBroadcastListResponse, LiveChatMessage, LiveChatMessageListResponse,
    TEXT_MESSAGE_EVENT,
};
use crate::config::ApiConfig;
use crate::feed::{ChatGateway, GatewayError, MessageBatch};

/// HTTP connect timeout used by [`YouTubeClient::new`].
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout used by [`YouTubeClient::new`].
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Parts requested when listing chat messages.
const MESSAGE_PARTS: &str = "snippet,authorDetails";

/// Authorized client for one YouTube account.
///
/// Cheap to share: `reqwest::Client` is internally reference counted and
/// safe to use from several tasks at once.
pub struct YouTubeClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl YouTubeClient {
    /// Create a client with the default timeouts.
    pub fn new(base_url: String, access_token: String) -> Self {
        Self::with_timeouts(
            base_url,
            access_token,
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    /// Create a client from the `[api]` config section.
    pub fn from_config(api: &ApiConfig, access_token: String) -> Self {
        Self::with_timeouts(
            api.base_url.clone(),
            access_token,
            Duration::from_secs(api.connect_timeout_secs),
            Duration::from_secs(api.request_timeout_secs),
        )
    }

    /// Create a client with explicit connect and request timeouts.
    pub fn with_timeouts(
        base_url: String,
        access_token: String,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(connect_timeout, request_timeout),
            base_url: base_url.trim_end_matches('/').to_owned(),
            access_token,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;
        let body = check_http_response(response).await?;
        parse_body(&body)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Parse(e.to_string()))
}

/// Build the JSON body for `liveChat/messages.insert`.
///
/// Exported for testing.
#[doc(hidden)]
pub fn insert_message_body(feed_id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "snippet": {
            "liveChatId": feed_id,
            "type": TEXT_MESSAGE_EVENT,
            "textMessageDetails": { "messageText": text },
        }
    })
}

#[async_trait]
impl ChatGateway for YouTubeClient {
    async fn list_broadcasts(&self) -> Result<Vec<LiveBroadcast>, GatewayError> {
        let response: LiveBroadcastListResponse = self
            .get_json(
                "liveBroadcasts",
                &[
                    ("part", "snippet"),
                    ("broadcastType", "all"),
                    ("broadcastStatus", "all"),
                ],
            )
            .await?;
        Ok(response.items)
    }

    async fn fetch_batch(
        &self,
        feed_id: &str,
        page_token: &str,
    ) -> Result<MessageBatch, GatewayError> {
        let mut query = vec![("liveChatId", feed_id), ("part", MESSAGE_PARTS)];
        if !page_token.trim().is_empty() {
            query.push(("pageToken", page_token));
        }

        let response: LiveChatMessageListResponse =
            self.get_json("liveChat/messages", &query).await?;
        if let Some(offline_at) = &response.offline_at {
            debug!(feed_id, offline_at = %offline_at, "live chat reported offline");
        }
        Ok(MessageBatch::from(response))
    }

    async fn post_message(
        &self,
        feed_id: &str,
        text: &str,
    ) -> Result<LiveChatMessage, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("liveChat/messages"))
            .bearer_auth(&self.access_token)
            .query(&[("part", "snippet")])
            .json(&insert_message_body(feed_id, text))
            .send()
            .await?;
        let body = check_http_response(response).await?;
        let message: LiveChatMessage = parse_body(&body)?;
        debug!(feed_id, message_id = %message.id, "chat message inserted");
        Ok(message)
    }
}
