//! Slack slash command handling.
//!
//! `/buildreq <text>` is parsed with the same command table as mentions and
//! direct messages. Over Socket Mode the envelope acknowledgement carries the
//! immediate reply; the result follows via the command's `response_url`.

use buildreq_tracker::{Command, CommandTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{SlackError, SlackResult};
use crate::messages::{SlackBlock, SlackMessageContent};

/// Slash command the bot answers to.
pub const DEFAULT_SLASH_COMMAND: &str = "/buildreq";

/// Slack slash command payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashCommandPayload {
    pub team_id: String,
    #[serde(default)]
    pub team_domain: String,
    /// Channel ID where command was invoked.
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,
    /// User ID who invoked the command.
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    /// The command (e.g., "/buildreq").
    pub command: String,
    /// Text after the command.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub api_app_id: String,
    /// URL for delayed responses.
    pub response_url: String,
    #[serde(default)]
    pub trigger_id: String,
}

/// Response type for slash command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Only visible to the user who invoked the command.
    #[default]
    Ephemeral,
    /// Visible to everyone in the channel.
    InChannel,
}

/// Immediate response to a slash command.
///
/// Must be sent within 3 seconds of receiving the command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlashCommandResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SlashCommandResponse {
    /// Create a simple text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Only visible to the invoker.
    pub fn ephemeral(mut self) -> Self {
        self.response_type = Some(ResponseType::Ephemeral);
        self
    }
}

/// Delayed response sent via response_url.
///
/// Can be sent up to 30 minutes after the original command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<SlackBlock>>,
}

impl DelayedResponse {
    /// Carry over the text and blocks of a rendered message.
    pub fn from_content(content: SlackMessageContent) -> Self {
        Self {
            text: content.text,
            blocks: content.blocks,
            ..Default::default()
        }
    }

    /// Set response type to in_channel.
    pub fn in_channel(mut self) -> Self {
        self.response_type = Some(ResponseType::InChannel);
        self
    }
}

/// Send a delayed response to the response_url.
pub async fn send_delayed_response(
    client: &reqwest::Client,
    response_url: &str,
    response: &DelayedResponse,
) -> SlackResult<()> {
    debug!("Sending delayed response to: {}", response_url);

    let resp = client.post(response_url).json(response).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        error!("Failed to send delayed response: {} - {}", status, body);
        return Err(SlackError::Api(format!(
            "Failed to send delayed response: {} - {}",
            status, body
        )));
    }

    debug!("Delayed response sent successfully");
    Ok(())
}

/// Context information from a slash command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user_id: String,
    pub channel_id: String,
    pub team_id: String,
    /// URL for delayed responses.
    pub response_url: String,
}

impl From<&SlashCommandPayload> for CommandContext {
    fn from(payload: &SlashCommandPayload) -> Self {
        Self {
            user_id: payload.user_id.clone(),
            channel_id: payload.channel_id.clone(),
            team_id: payload.team_id.clone(),
            response_url: payload.response_url.clone(),
        }
    }
}

/// Parsed slash command.
#[derive(Debug, Clone)]
pub enum ParsedCommand {
    /// A command for the dispatcher.
    BuildReq {
        command: Command,
        context: CommandContext,
    },
    /// A slash command this bot does not own.
    Unknown {
        command: String,
        context: CommandContext,
    },
}

/// Parse a slash command payload. Empty text asks for help.
pub fn parse_command(
    payload: &SlashCommandPayload,
    table: &CommandTable,
    slash_command: &str,
) -> ParsedCommand {
    let context = CommandContext::from(payload);

    if !payload.command.eq_ignore_ascii_case(slash_command) {
        return ParsedCommand::Unknown {
            command: payload.command.clone(),
            context,
        };
    }

    let text = crate::messages::unescape_mrkdwn(payload.text.trim());
    ParsedCommand::BuildReq {
        command: table.parse(&text).unwrap_or(Command::Help),
        context,
    }
}

/// Create an acknowledgment response for a command.
pub fn create_ack_response(command: &ParsedCommand) -> SlashCommandResponse {
    match command {
        ParsedCommand::BuildReq { command, .. } => match command {
            Command::Search { query } => {
                SlashCommandResponse::text(format!("🔎 Searching for \"{}\"...", query))
                    .ephemeral()
            }
            Command::Dashboard => {
                SlashCommandResponse::text("📋 Building the dashboard...").ephemeral()
            }
            Command::Show { gid } => {
                SlashCommandResponse::text(format!("🔎 Looking up request {}...", gid)).ephemeral()
            }
            Command::Help => SlashCommandResponse::default(),
        },
        ParsedCommand::Unknown { command, .. } => {
            SlashCommandResponse::text(format!("❓ Unknown command: {}", command)).ephemeral()
        }
    }
}
