//! Feed id resolution over a fixed broadcast list.

use async_trait::async_trait;

use livechat::feed::{resolve_feed_id, ChatGateway, GatewayError, MessageBatch};
use livechat::youtube::types::{LiveBroadcast, LiveBroadcastSnippet, LiveChatMessage};

struct Broadcasts(Result<Vec<LiveBroadcast>, u16>);

#[async_trait]
impl ChatGateway for Broadcasts {
    async fn list_broadcasts(&self) -> Result<Vec<LiveBroadcast>, GatewayError> {
        match &self.0 {
            Ok(items) => Ok(items.clone()),
            Err(status) => Err(GatewayError::HttpStatus {
                status: *status,
                body: String::new(),
            }),
        }
    }

    async fn fetch_batch(&self, _: &str, _: &str) -> Result<MessageBatch, GatewayError> {
        Ok(MessageBatch::default())
    }

    async fn post_message(&self, _: &str, _: &str) -> Result<LiveChatMessage, GatewayError> {
        Ok(LiveChatMessage::default())
    }
}

fn broadcast(chat_id: Option<&str>) -> LiveBroadcast {
    LiveBroadcast {
        id: None,
        snippet: Some(LiveBroadcastSnippet {
            title: None,
            live_chat_id: chat_id.map(str::to_owned),
        }),
    }
}

#[tokio::test]
async fn picks_first_broadcast_with_chat() {
    let gateway = Broadcasts(Ok(vec![
        broadcast(None),
        broadcast(Some("chat-a")),
        broadcast(Some("chat-b")),
    ]));
    let feed_id = resolve_feed_id(&gateway).await.expect("resolve should succeed");
    assert_eq!(feed_id.as_deref(), Some("chat-a"));
}

#[tokio::test]
async fn skips_blank_chat_ids() {
    let gateway = Broadcasts(Ok(vec![broadcast(Some("")), broadcast(Some("chat-b"))]));
    let feed_id = resolve_feed_id(&gateway).await.expect("resolve should succeed");
    assert_eq!(feed_id.as_deref(), Some("chat-b"));
}

#[tokio::test]
async fn no_broadcasts_resolves_to_none() {
    let gateway = Broadcasts(Ok(Vec::new()));
    let feed_id = resolve_feed_id(&gateway).await.expect("resolve should succeed");
    assert_eq!(feed_id, None);
}

#[tokio::test]
async fn listing_failure_propagates() {
    let gateway = Broadcasts(Err(401));
    let err = resolve_feed_id(&gateway).await.expect_err("should fail");
    assert!(matches!(err, GatewayError::HttpStatus { status: 401, .. }));
}
