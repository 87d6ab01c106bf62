//! Slack front end for client build requests.
//!
//! This crate provides:
//! - A Slack bot over Socket Mode answering @mentions and direct messages
//! - The `/buildreq` slash command
//! - A per-user home tab dashboard rebuilt on every open
//! - Block Kit rendering of search results and dashboards
//!
//! # Architecture
//!
//! `BuildReqBot` owns the Socket Mode connection and hands every request's
//! text to a [`buildreq_tracker::Dispatcher`]; it never looks at tasks
//! itself beyond formatting the dispatcher's outcome.
//!
//! # Example
//!
//! ```rust,ignore
//! use buildreq_slack::{BuildReqBot, SlackConfig};
//!
//! let config = SlackConfig::from_env()?;
//! let bot = BuildReqBot::new(config, dispatcher)?;
//! bot.start().await?;
//! ```
//!
//! # Configuration
//!
//! Required environment variables:
//! - `SLACK_BOT_TOKEN` - Bot OAuth token (xoxb-...)
//! - `SLACK_APP_TOKEN` - App-level token for Socket Mode (xapp-...)

pub mod bot;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod home;
pub mod messages;

// Re-export main types
pub use bot::{BotOptions, BuildReqBot};
pub use config::SlackConfig;
pub use error::{SlackError, SlackResult};
pub use events::SlackEvent;
pub use home::{HomeView, build_home_view};
pub use messages::{SlackMessageBuilder, escape_mrkdwn};
