//! Wire types for the subset of the YouTube Data API v3 used by the client.
//!
//! Only the fields the crate reads are modelled. Everything is optional or
//! defaulted because the API omits fields that were not requested via
//! `part`/`fields`.

use serde::{Deserialize, Serialize};

/// Message type for plain text chat messages.
pub const TEXT_MESSAGE_EVENT: &str = "textMessageEvent";

/// A single live chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    /// Server-assigned message id.
    #[serde(default)]
    pub id: String,
    /// Message body and metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<LiveChatMessageSnippet>,
    /// Information about the author, present when `authorDetails` was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_details: Option<AuthorDetails>,
}

impl LiveChatMessage {
    /// The text shown in chat, preferring `displayMessage` over the raw text details.
    pub fn text(&self) -> Option<&str> {
        let snippet = self.snippet.as_ref()?;
        snippet.display_message.as_deref().or_else(|| {
            snippet
                .text_message_details
                .as_ref()
                .map(|details| details.message_text.as_str())
        })
    }

    /// The author's display name, if author details were returned.
    pub fn author_name(&self) -> Option<&str> {
        self.author_details
            .as_ref()
            .map(|author| author.display_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// The `snippet` part of a live chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageSnippet {
    /// Message type, e.g. `textMessageEvent`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Live chat the message belongs to.
    #[serde(default)]
    pub live_chat_id: String,
    /// Channel id of the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_channel_id: Option<String>,
    /// RFC 3339 publication time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Rendered message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_message: Option<String>,
    /// Details for `textMessageEvent` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_message_details: Option<TextMessageDetails>,
}

/// Text payload of a `textMessageEvent`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageDetails {
    /// The message text as typed by the author.
    pub message_text: String,
}

/// The `authorDetails` part of a live chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetails {
    /// Author channel id.
    #[serde(default)]
    pub channel_id: String,
    /// Author display name.
    #[serde(default)]
    pub display_name: String,
    /// Whether the author owns the chat.
    #[serde(default)]
    pub is_chat_owner: bool,
    /// Whether the author is a moderator.
    #[serde(default)]
    pub is_chat_moderator: bool,
    /// Whether the author is a channel member.
    #[serde(default)]
    pub is_chat_sponsor: bool,
    /// Whether the channel is verified.
    #[serde(default)]
    pub is_verified: bool,
}

/// Response body of `liveChat/messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageListResponse {
    /// Token for the next page; absent when the server has nothing to page to.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Server-suggested delay before the next poll.
    #[serde(default)]
    pub polling_interval_millis: Option<u64>,
    /// Set when the chat went offline.
    #[serde(default)]
    pub offline_at: Option<String>,
    /// Messages since the requested page token.
    #[serde(default)]
    pub items: Vec<LiveChatMessage>,
}

/// Response body of `liveBroadcasts.list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveBroadcastListResponse {
    /// Matching broadcasts.
    #[serde(default)]
    pub items: Vec<LiveBroadcast>,
}

/// A live broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LiveBroadcast {
    /// Broadcast (video) id.
    #[serde(default)]
    pub id: Option<String>,
    /// Broadcast metadata.
    #[serde(default)]
    pub snippet: Option<LiveBroadcastSnippet>,
}

impl LiveBroadcast {
    /// The broadcast's live chat id, ignoring blank values.
    pub fn live_chat_id(&self) -> Option<&str> {
        self.snippet
            .as_ref()
            .and_then(|snippet| snippet.live_chat_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

/// The `snippet` part of a live broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastSnippet {
    /// Broadcast title.
    #[serde(default)]
    pub title: Option<String>,
    /// Id of the chat attached to the broadcast.
    #[serde(default)]
    pub live_chat_id: Option<String>,
}
