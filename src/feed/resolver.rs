//! Finds the live chat to poll for the authorized account.

use tracing::{debug, info};

use super::{ChatGateway, GatewayError};

/// Resolve the feed id of the first broadcast that has a live chat.
///
/// Returns `Ok(None)` when no broadcast carries a chat id, which is the
/// normal "nothing is live" case.
///
/// # Errors
///
/// Propagates the gateway error when listing broadcasts fails.
pub async fn resolve_feed_id(gateway: &dyn ChatGateway) -> Result<Option<String>, GatewayError> {
    let broadcasts = gateway.list_broadcasts().await?;
    debug!(count = broadcasts.len(), "listed broadcasts");

    let feed_id = broadcasts
        .iter()
        .find_map(|broadcast| broadcast.live_chat_id())
        .map(str::to_owned);

    match &feed_id {
        Some(id) => info!(feed_id = %id, "resolved live chat"),
        None => info!("no broadcast with a live chat found"),
    }
    Ok(feed_id)
}
