//! Event handling for Slack events.
//!
//! Handles the events the bot subscribes to:
//! - `app_mention` - When the bot is @mentioned
//! - `message.im` - Direct messages to the bot
//! - `app_home_opened` - A user opened the bot's home tab
//!
//! Events are received via Socket Mode WebSocket connection.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SlackError, SlackResult};
use crate::messages::unescape_mrkdwn;

/// Slack event types that we handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    /// App mention event (@buildreq in a channel).
    AppMention(AppMentionEvent),
    /// Message event.
    Message(MessageEvent),
    /// Home tab opened.
    AppHomeOpened(AppHomeOpenedEvent),
    /// Unknown event type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

/// Event payload for app mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMentionEvent {
    /// User who mentioned the bot.
    pub user: String,
    /// Text of the message (including the mention).
    pub text: String,
    /// Channel where the mention occurred.
    pub channel: String,
    /// Timestamp of the message.
    pub ts: String,
    /// Thread timestamp (if in a thread).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
}

/// Event payload for messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// User who sent the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    /// Channel type (im, channel, group, mpim).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
    /// Subtype of message (e.g., "bot_message", "message_changed").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Bot ID (if message is from a bot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Check if this is a direct message.
    pub fn is_direct_message(&self) -> bool {
        self.channel.starts_with('D') || self.channel_type.as_deref() == Some("im")
    }

    /// Check if this is a bot message (should be ignored).
    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    /// Edits, deletions and other subtyped messages carry no new request.
    pub fn is_plain_message(&self) -> bool {
        self.subtype.is_none()
    }
}

/// Event payload for a home tab being opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppHomeOpenedEvent {
    /// User who opened the tab.
    pub user: String,
    /// Which tab was opened (`home` or `messages`).
    #[serde(default)]
    pub tab: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
}

impl AppHomeOpenedEvent {
    pub fn is_home_tab(&self) -> bool {
        self.tab == "home"
    }
}

/// Socket Mode envelope wrapping events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeEnvelope {
    /// Envelope ID for acknowledgment. Absent on `hello` and `disconnect`.
    #[serde(default)]
    pub envelope_id: Option<String>,
    /// Type of payload.
    #[serde(rename = "type")]
    pub envelope_type: String,
    /// Payload; its shape depends on the envelope type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts_response_payload: Option<bool>,
}

/// Event callback payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_app_id: Option<String>,
    /// The actual event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub payload_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<u64>,
}

/// Socket Mode acknowledgment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeAck {
    /// Envelope ID being acknowledged.
    pub envelope_id: String,
    /// Optional response payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl SocketModeAck {
    /// Create a simple acknowledgment.
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: None,
        }
    }

    /// Create an acknowledgment with a response payload.
    pub fn with_payload(envelope_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: Some(payload),
        }
    }
}

/// Turn message text into the request text: drop `<@U...>` mentions, decode
/// Slack's entity escapes, trim.
///
/// # Example
///
/// ```rust
/// use buildreq_slack::events::extract_query;
///
/// assert_eq!(extract_query("<@U12345> search Smith &amp; Co"), "search Smith & Co");
/// ```
pub fn extract_query(text: &str) -> String {
    let mut result = text.to_string();

    while let Some(start) = result.find("<@") {
        if let Some(end) = result[start..].find('>') {
            result = format!("{}{}", &result[..start], &result[start + end + 1..]);
        } else {
            break;
        }
    }

    unescape_mrkdwn(result.trim())
}

/// Where a reply to an event goes.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// User ID who triggered the event.
    pub user_id: String,
    /// Channel ID where the event occurred.
    pub channel_id: String,
    /// Thread to reply in.
    pub thread_ts: String,
}

impl EventContext {
    /// Create context from an app mention event.
    pub fn from_app_mention(event: &AppMentionEvent) -> Self {
        Self {
            user_id: event.user.clone(),
            channel_id: event.channel.clone(),
            // Start a thread on the mention unless it is already in one
            thread_ts: event.thread_ts.clone().unwrap_or_else(|| event.ts.clone()),
        }
    }

    /// Create context from a message event; `None` for messages without a user.
    pub fn from_message(event: &MessageEvent) -> Option<Self> {
        let user_id = event.user.clone()?;

        Some(Self {
            user_id,
            channel_id: event.channel.clone(),
            thread_ts: event.thread_ts.clone().unwrap_or_else(|| event.ts.clone()),
        })
    }
}

/// Parse a raw event from the Socket Mode envelope.
pub fn parse_event(payload: &EventPayload) -> SlackResult<SlackEvent> {
    let event_json = payload
        .event
        .as_ref()
        .ok_or_else(|| SlackError::InvalidPayload("Missing event field".to_string()))?;

    let event_type = event_json
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");

    debug!("Parsing event type: {}", event_type);

    match event_type {
        "app_mention" => Ok(SlackEvent::AppMention(serde_json::from_value(
            event_json.clone(),
        )?)),
        "message" => Ok(SlackEvent::Message(serde_json::from_value(
            event_json.clone(),
        )?)),
        "app_home_opened" => Ok(SlackEvent::AppHomeOpened(serde_json::from_value(
            event_json.clone(),
        )?)),
        _ => {
            warn!("Unknown event type: {}", event_type);
            Ok(SlackEvent::Unknown)
        }
    }
}
