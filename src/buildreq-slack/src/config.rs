//! Configuration for the Slack bot.
//!
//! Tokens come from the process environment; nothing is persisted.

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::{SlackError, SlackResult};

const ENV_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
const ENV_APP_TOKEN: &str = "SLACK_APP_TOKEN";

/// Configuration for Slack integration.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...).
    bot_token: SecretString,
    /// App-level token for Socket Mode (xapp-...).
    app_token: SecretString,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .finish()
    }
}

impl SlackConfig {
    /// Create a new configuration with required tokens.
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            bot_token: SecretString::new(bot_token.into().into()),
            app_token: SecretString::new(app_token.into().into()),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `SLACK_BOT_TOKEN`
    /// - `SLACK_APP_TOKEN`
    pub fn from_env() -> SlackResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SlackResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(ENV_BOT_TOKEN)
            .ok_or_else(|| SlackError::Config(format!("{} not set", ENV_BOT_TOKEN)))?;
        let app_token = lookup(ENV_APP_TOKEN)
            .ok_or_else(|| SlackError::Config(format!("{} not set", ENV_APP_TOKEN)))?;

        if !bot_token.starts_with("xoxb-") {
            warn!("Bot token doesn't start with 'xoxb-', this may be incorrect");
        }
        if !app_token.starts_with("xapp-") {
            warn!("App token doesn't start with 'xapp-', this may be incorrect");
        }

        Ok(Self::new(bot_token, app_token))
    }

    /// Get the bot token.
    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    /// Get the app token for Socket Mode.
    pub fn app_token(&self) -> &str {
        self.app_token.expose_secret()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SlackResult<()> {
        if self.bot_token().is_empty() {
            return Err(SlackError::Config("Bot token is empty".to_string()));
        }
        if self.app_token().is_empty() {
            return Err(SlackError::Config("App token is empty".to_string()));
        }
        if !self.bot_token().starts_with("xoxb-") {
            return Err(SlackError::Config(
                "Bot token must start with 'xoxb-'".to_string(),
            ));
        }
        if !self.app_token().starts_with("xapp-") {
            return Err(SlackError::Config(
                "App token must start with 'xapp-'".to_string(),
            ));
        }
        Ok(())
    }
}
