//! Main Slack bot implementation.
//!
//! The `BuildReqBot` is the central component that:
//! - Connects to Slack via Socket Mode (WebSocket)
//! - Turns mentions, direct messages and slash commands into dispatcher calls
//! - Publishes the home tab dashboard
//! - Manages the connection lifecycle
//!
//! # Example
//!
//! ```rust,ignore
//! use buildreq_slack::{BuildReqBot, SlackConfig};
//!
//! let bot = BuildReqBot::new(SlackConfig::from_env()?, dispatcher)?;
//! bot.start().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use buildreq_tracker::Dispatcher;
use chrono::Local;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::commands::{
    DEFAULT_SLASH_COMMAND, DelayedResponse, ParsedCommand, SlashCommandPayload,
    create_ack_response, parse_command, send_delayed_response,
};
use crate::config::SlackConfig;
use crate::error::{SlackApiError, SlackError, SlackResult};
use crate::events::{
    EventContext, EventPayload, SlackEvent, SocketModeAck, SocketModeEnvelope, extract_query,
    parse_event,
};
use crate::home::{HomeView, build_error_view, build_home_view};
use crate::messages::{
    SlackMessageContent, format_error_response, format_help, format_outcome,
};

/// Type alias for the WebSocket connection.
type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default Slack Web API root.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Configuration for bot behavior.
#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Web API root, without trailing slash.
    pub api_base: String,
    /// Timeout for API requests.
    pub api_timeout: Duration,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Ping interval for WebSocket keep-alive.
    pub ping_interval: Duration,
    /// Slash command the bot answers to.
    pub slash_command: String,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            slash_command: DEFAULT_SLASH_COMMAND.to_string(),
        }
    }
}

/// How a Socket Mode connection ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    /// Shutdown was requested.
    Shutdown,
    /// Slack closed the socket; a new one should be opened.
    Closed,
}

/// The client build request bot.
pub struct BuildReqBot {
    config: SlackConfig,
    /// HTTP client for API calls.
    client: reqwest::Client,
    options: BotOptions,
    dispatcher: Dispatcher,
    /// Bot's own user ID (set after auth.test).
    bot_user_id: Arc<RwLock<Option<String>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BuildReqBot {
    /// Create a bot with default options.
    pub fn new(config: SlackConfig, dispatcher: Dispatcher) -> SlackResult<Self> {
        Self::with_options(config, dispatcher, BotOptions::default())
    }

    /// Create a bot with custom options.
    pub fn with_options(
        config: SlackConfig,
        dispatcher: Dispatcher,
        mut options: BotOptions,
    ) -> SlackResult<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(options.api_timeout)
            .build()
            .map_err(|e| SlackError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        options.api_base = options.api_base.trim_end_matches('/').to_string();
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            client,
            options,
            dispatcher,
            bot_user_id: Arc::new(RwLock::new(None)),
            shutdown_tx,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get the bot's user ID (if known).
    pub async fn bot_user_id(&self) -> Option<String> {
        self.bot_user_id.read().await.clone()
    }

    /// Authenticate, then run Socket Mode until shutdown.
    pub async fn start(&self) -> SlackResult<()> {
        info!(project = %self.dispatcher.project_id(), "Starting build request bot");

        self.test_auth().await?;
        self.run_socket_mode().await
    }

    /// Shutdown the bot gracefully.
    pub fn shutdown(&self) {
        info!("Shutting down Slack bot...");
        let _ = self.shutdown_tx.send(());
    }

    /// Call auth.test and remember the bot's user ID.
    async fn test_auth(&self) -> SlackResult<()> {
        debug!("Testing Slack authentication...");

        let response = self
            .api_call("auth.test", &serde_json::json!({}))
            .await
            .map_err(|e| match e {
                SlackError::Api(msg) => SlackError::Auth(msg),
                other => other,
            })?;

        if let Some(user_id) = response.get("user_id").and_then(|v| v.as_str()) {
            *self.bot_user_id.write().await = Some(user_id.to_string());
            info!("Authenticated as bot user: {}", user_id);
        }

        Ok(())
    }

    /// Run the Socket Mode connection loop.
    async fn run_socket_mode(&self) -> SlackResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            let result = match self.get_socket_mode_url().await {
                Ok(ws_url) => {
                    info!("Connecting to Socket Mode...");
                    self.connect_and_run(&ws_url, &mut shutdown_rx).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(ConnectionEnd::Shutdown) => break,
                Ok(ConnectionEnd::Closed) => {
                    info!("Socket Mode connection closed, reconnecting");
                }
                Err(SlackError::Auth(msg)) => {
                    error!("Socket Mode authentication failed: {}", msg);
                    return Err(SlackError::Auth(msg));
                }
                Err(e) => {
                    error!("Socket Mode connection error: {}", e);
                    info!("Reconnecting in {:?}...", self.options.reconnect_delay);

                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(self.options.reconnect_delay) => {}
                    }
                }
            }
        }

        info!("Socket Mode stopped");
        Ok(())
    }

    /// Get the WebSocket URL for Socket Mode.
    async fn get_socket_mode_url(&self) -> SlackResult<String> {
        let response = self
            .post("apps.connections.open", self.config.app_token(), None)
            .await?;

        response
            .get("url")
            .and_then(|u| u.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("Missing url in response".to_string()))
    }

    /// Connect to WebSocket and run event loop.
    async fn connect_and_run(
        &self,
        ws_url: &str,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SlackResult<ConnectionEnd> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (mut write, read) = ws_stream.split();

        // Channel for outgoing messages
        let (msg_tx, mut msg_rx) = mpsc::channel::<WsMessage>(100);

        let write_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
        });

        let ping_tx = msg_tx.clone();
        let ping_interval = self.options.ping_interval;
        let ping_task = tokio::spawn(async move {
            let mut interval = interval(ping_interval);
            loop {
                interval.tick().await;
                if ping_tx.send(WsMessage::Ping(vec![])).await.is_err() {
                    break;
                }
            }
        });

        let result = self.process_messages(read, msg_tx, shutdown_rx).await;

        ping_task.abort();
        write_task.abort();

        result
    }

    /// Process incoming WebSocket messages.
    async fn process_messages(
        &self,
        mut read: SplitStream<WsConnection>,
        msg_tx: mpsc::Sender<WsMessage>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SlackResult<ConnectionEnd> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    let _ = msg_tx.send(WsMessage::Close(None)).await;
                    return Ok(ConnectionEnd::Shutdown);
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.handle_socket_message(&text, &msg_tx).await;
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            let _ = msg_tx.send(WsMessage::Pong(data)).await;
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("WebSocket closed by server");
                            return Ok(ConnectionEnd::Closed);
                        }
                        Some(Err(e)) => {
                            return Err(SlackError::WebSocket(e.to_string()));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Acknowledge a Socket Mode envelope, then act on it.
    async fn handle_socket_message(&self, text: &str, msg_tx: &mpsc::Sender<WsMessage>) {
        debug!("Received Socket Mode message: {}", text);

        let envelope: SocketModeEnvelope = match serde_json::from_str(text) {
            Ok(env) => env,
            Err(e) => {
                warn!("Failed to parse Socket Mode envelope: {}", e);
                return;
            }
        };

        let slash_command = if envelope.envelope_type == "slash_commands" {
            envelope.payload.clone().and_then(|p| {
                serde_json::from_value::<SlashCommandPayload>(p)
                    .map_err(|e| warn!("Failed to parse slash command payload: {}", e))
                    .ok()
            })
        } else {
            None
        };
        let parsed = slash_command.as_ref().map(|payload| {
            parse_command(
                payload,
                self.dispatcher.table(),
                &self.options.slash_command,
            )
        });

        // Acknowledge before any slow work; the slash command ack carries
        // the immediate reply
        if let Some(envelope_id) = &envelope.envelope_id {
            let ack = match parsed.as_ref().map(create_ack_response) {
                Some(reply) => match serde_json::to_value(&reply) {
                    Ok(payload) => SocketModeAck::with_payload(envelope_id, payload),
                    Err(_) => SocketModeAck::new(envelope_id),
                },
                None => SocketModeAck::new(envelope_id),
            };
            match serde_json::to_string(&ack) {
                Ok(ack_json) => {
                    let _ = msg_tx.send(WsMessage::Text(ack_json)).await;
                }
                Err(e) => error!("Failed to serialize acknowledgment: {}", e),
            }
        }

        match envelope.envelope_type.as_str() {
            "events_api" => {
                let payload = envelope
                    .payload
                    .map(serde_json::from_value::<EventPayload>);
                match payload {
                    Some(Ok(payload)) => self.handle_event_payload(payload).await,
                    Some(Err(e)) => warn!("Failed to parse event payload: {}", e),
                    None => warn!("Events API envelope without payload"),
                }
            }
            "slash_commands" => {
                if let Some(parsed) = parsed {
                    self.handle_slash_command(parsed).await;
                }
            }
            "hello" => {
                info!("Socket Mode connection established");
            }
            "disconnect" => {
                info!("Received disconnect request from Slack");
            }
            _ => {
                debug!("Unhandled envelope type: {}", envelope.envelope_type);
            }
        }
    }

    /// Handle an events API payload.
    async fn handle_event_payload(&self, payload: EventPayload) {
        match parse_event(&payload) {
            Ok(SlackEvent::AppMention(event)) => {
                if self.is_own_user(Some(&event.user)).await {
                    return;
                }
                let ctx = EventContext::from_app_mention(&event);
                info!(
                    "Handling app mention from user {} in channel {}",
                    ctx.user_id, ctx.channel_id
                );
                self.reply(&ctx, &extract_query(&event.text)).await;
            }
            Ok(SlackEvent::Message(event)) => {
                if event.is_bot_message()
                    || !event.is_plain_message()
                    || self.is_own_user(event.user.as_deref()).await
                {
                    return;
                }
                if event.is_direct_message()
                    && let Some(ctx) = EventContext::from_message(&event)
                {
                    info!("Handling DM from user {}", ctx.user_id);
                    self.reply(&ctx, &extract_query(&event.text)).await;
                }
            }
            Ok(SlackEvent::AppHomeOpened(event)) => {
                if event.is_home_tab()
                    && let Err(e) = self.refresh_home(&event.user).await
                {
                    error!("Failed to publish home view for {}: {}", event.user, e);
                }
            }
            Ok(SlackEvent::Unknown) => {
                debug!("Received unknown event type");
            }
            Err(e) => {
                warn!("Failed to parse event: {}", e);
            }
        }
    }

    /// Whether `user` is the bot itself, as reported by auth.test.
    async fn is_own_user(&self, user: Option<&str>) -> bool {
        match (user, self.bot_user_id.read().await.as_deref()) {
            (Some(user), Some(own)) => user == own,
            _ => false,
        }
    }

    /// Answer a request in the thread it came from.
    async fn reply(&self, ctx: &EventContext, text: &str) {
        let message = self.respond(text).await.in_thread(&ctx.thread_ts);
        if let Err(e) = self.send_message(&ctx.channel_id, message).await {
            error!("Failed to send response: {}", e);
        }
    }

    /// Run request text through the dispatcher and render the outcome.
    ///
    /// Failures are logged in full and rendered as a generic error.
    pub async fn respond(&self, text: &str) -> SlackMessageContent {
        match self.dispatcher.handle_text(text).await {
            Ok(Some(outcome)) => format_outcome(&outcome),
            Ok(None) => format_help(),
            Err(e) => {
                error!(error = %e, request = %text, "Request failed");
                format_error_response()
            }
        }
    }

    /// Run a parsed slash command and post the result to its response URL.
    async fn handle_slash_command(&self, parsed: ParsedCommand) {
        match parsed {
            ParsedCommand::BuildReq { command, context } => {
                info!(
                    "Handling slash command from user {} in channel {}",
                    context.user_id, context.channel_id
                );
                let content = match self.dispatcher.dispatch(command).await {
                    Ok(outcome) => format_outcome(&outcome),
                    Err(e) => {
                        error!(error = %e, "Slash command failed");
                        format_error_response()
                    }
                };
                let response = DelayedResponse::from_content(content).in_channel();
                if let Err(e) =
                    send_delayed_response(&self.client, &context.response_url, &response).await
                {
                    error!("Failed to send slash command response: {}", e);
                }
            }
            ParsedCommand::Unknown { command, .. } => {
                debug!("Ignoring slash command {}", command);
            }
        }
    }

    /// Rebuild and publish a user's home tab.
    pub async fn refresh_home(&self, user_id: &str) -> SlackResult<()> {
        let view = match self
            .dispatcher
            .dashboard_pipeline()
            .run(self.dispatcher.project_id())
            .await
        {
            Ok(grouped) => build_home_view(&grouped, Local::now()),
            Err(e) => {
                error!(error = %e, user = %user_id, "Failed to build dashboard");
                build_error_view()
            }
        };
        self.publish_home_view(user_id, &view).await
    }

    /// Publish a home tab view for a user.
    pub async fn publish_home_view(&self, user_id: &str, view: &HomeView) -> SlackResult<()> {
        let payload = serde_json::json!({
            "user_id": user_id,
            "view": view,
        });
        self.api_call("views.publish", &payload).await?;
        debug!("Published home view for {}", user_id);
        Ok(())
    }

    /// Send a message to a channel; returns the message timestamp.
    pub async fn send_message(
        &self,
        channel: &str,
        content: SlackMessageContent,
    ) -> SlackResult<String> {
        let mut payload = serde_json::to_value(&content)?;
        payload["channel"] = serde_json::json!(channel);

        let response = self.api_call("chat.postMessage", &payload).await?;

        response
            .get("ts")
            .and_then(|ts| ts.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("Missing ts in response".to_string()))
    }

    /// Call a Web API method with the bot token.
    async fn api_call(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> SlackResult<serde_json::Value> {
        self.post(method, self.config.bot_token(), Some(payload))
            .await
    }

    /// POST to a Web API method and check the `ok` flag.
    async fn post(
        &self,
        method: &str,
        token: &str,
        payload: Option<&serde_json::Value>,
    ) -> SlackResult<serde_json::Value> {
        let url = format!("{}/{}", self.options.api_base, method);
        debug!("POST {}", url);

        let mut request = self.client.post(&url).bearer_auth(token);
        request = match payload {
            Some(payload) => request
                .header("Content-Type", "application/json; charset=utf-8")
                .json(payload),
            None => request.header("Content-Type", "application/x-www-form-urlencoded"),
        };
        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);
            warn!("{} rate limited, retry after {}s", method, retry_after);
            return Err(SlackError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{}: {}", status, body)));
        }

        let json: serde_json::Value = response.json().await?;
        if json.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            return Err(SlackApiError::from_response(method, &json).into());
        }
        Ok(json)
    }
}
