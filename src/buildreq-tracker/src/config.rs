//! Configuration for the tracker connection and normalization rules.
//!
//! Built once at process start and shared read-only afterwards. Supports
//! loading from:
//! - Environment variables (`ASANA_PAT`, `RB_TRACKER_P`, ...)
//! - A TOML file

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::group::UnsectionedPolicy;
use crate::window::DEFAULT_DAYS_BACK;

/// Default tracker API root.
pub const DEFAULT_TRACKER_URL: &str = "https://app.asana.com/api/1.0";

/// Default token substituted for absent fields.
pub const DEFAULT_PLACEHOLDER: &str = "N/A";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_TOKEN: &str = "ASANA_PAT";
const ENV_PROJECT: &str = "RB_TRACKER_P";
const ENV_URL: &str = "BUILDREQ_TRACKER_URL";
const ENV_DAYS_BACK: &str = "BUILDREQ_DAYS_BACK";
const ENV_PLACEHOLDER: &str = "BUILDREQ_PLACEHOLDER";
const ENV_UNSECTIONED: &str = "BUILDREQ_UNSECTIONED";
const ENV_TIMEOUT: &str = "BUILDREQ_TIMEOUT_SECS";

/// Tracker configuration.
#[derive(Clone)]
pub struct TrackerConfig {
    /// Personal access token for the tracker API.
    access_token: SecretString,
    /// Project holding the client build requests.
    pub project_id: String,
    /// API root, without trailing slash.
    pub base_url: String,
    /// Size of the "recently completed" window in days.
    pub days_back: u32,
    /// Token substituted when a field is absent.
    pub missing_field_placeholder: String,
    /// What to do with tasks that belong to no section.
    pub unsectioned: UnsectionedPolicy,
    /// HTTP timeout for tracker requests.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("access_token", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("base_url", &self.base_url)
            .field("days_back", &self.days_back)
            .field("missing_field_placeholder", &self.missing_field_placeholder)
            .field("unsectioned", &self.unsectioned)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// On-disk shape of the TOML configuration file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    access_token: String,
    project_id: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_days_back")]
    days_back: u32,
    #[serde(default = "default_placeholder")]
    missing_field_placeholder: String,
    #[serde(default)]
    unsectioned: UnsectionedPolicy,
    #[serde(default = "default_timeout_secs")]
    request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_TRACKER_URL.to_string()
}

fn default_days_back() -> u32 {
    DEFAULT_DAYS_BACK
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl TrackerConfig {
    /// Create a configuration with defaults for everything but the credentials.
    pub fn new(access_token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into().into()),
            project_id: project_id.into(),
            base_url: default_base_url(),
            days_back: DEFAULT_DAYS_BACK,
            missing_field_placeholder: default_placeholder(),
            unsectioned: UnsectionedPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the placeholder token for absent fields.
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.missing_field_placeholder = placeholder.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `ASANA_PAT`
    /// - `RB_TRACKER_P`
    ///
    /// Optional variables:
    /// - `BUILDREQ_TRACKER_URL`
    /// - `BUILDREQ_DAYS_BACK`
    /// - `BUILDREQ_PLACEHOLDER`
    /// - `BUILDREQ_UNSECTIONED` (`bucket` or `reject`)
    /// - `BUILDREQ_TIMEOUT_SECS`
    pub fn from_env() -> TrackerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> TrackerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(ENV_TOKEN)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TrackerError::Config(format!("{} not set", ENV_TOKEN)))?;
        let project = lookup(ENV_PROJECT)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TrackerError::Config(format!("{} not set", ENV_PROJECT)))?;

        let mut config = Self::new(token, project);

        if let Some(url) = lookup(ENV_URL) {
            config = config.with_base_url(url);
        }
        if let Some(days) = lookup(ENV_DAYS_BACK) {
            config.days_back = parse_number(ENV_DAYS_BACK, &days)?;
        }
        if let Some(placeholder) = lookup(ENV_PLACEHOLDER) {
            config.missing_field_placeholder = placeholder;
        }
        if let Some(policy) = lookup(ENV_UNSECTIONED) {
            config.unsectioned = policy.parse()?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT) {
            config.request_timeout = Duration::from_secs(parse_number(ENV_TIMEOUT, &secs)?);
        }
        config.validate()?;

        debug!(project = %config.project_id, "Loaded tracker config from environment");
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "Loaded tracker config from file");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> TrackerResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| TrackerError::Config(format!("Invalid config file: {}", e)))?;

        let config = Self {
            access_token: SecretString::new(file.access_token.into()),
            project_id: file.project_id,
            base_url: file.base_url.trim_end_matches('/').to_string(),
            days_back: file.days_back,
            missing_field_placeholder: file.missing_field_placeholder,
            unsectioned: file.unsectioned,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Get the access token.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.access_token.expose_secret().is_empty() {
            return Err(TrackerError::Config("Access token is empty".to_string()));
        }
        if self.project_id.is_empty() {
            return Err(TrackerError::Config("Project id is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(TrackerError::Config(format!(
                "Tracker URL must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> TrackerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TrackerError::Config(format!("{} is not a number: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_new_defaults() {
        let config = TrackerConfig::new("pat-123", "120000");

        assert_eq!(config.access_token(), "pat-123");
        assert_eq!(config.project_id, "120000");
        assert_eq!(config.base_url, DEFAULT_TRACKER_URL);
        assert_eq!(config.days_back, 14);
        assert_eq!(config.missing_field_placeholder, "N/A");
        assert_eq!(config.unsectioned, UnsectionedPolicy::Bucket);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = TrackerConfig::from_lookup(lookup_from(&[
            ("ASANA_PAT", "pat-abc"),
            ("RB_TRACKER_P", "98765"),
            ("BUILDREQ_DAYS_BACK", "7"),
            ("BUILDREQ_PLACEHOLDER", "TBC"),
            ("BUILDREQ_UNSECTIONED", "reject"),
            ("BUILDREQ_TRACKER_URL", "http://localhost:9000/api/"),
        ]))
        .unwrap();

        assert_eq!(config.project_id, "98765");
        assert_eq!(config.days_back, 7);
        assert_eq!(config.missing_field_placeholder, "TBC");
        assert_eq!(config.unsectioned, UnsectionedPolicy::Reject);
        assert_eq!(config.base_url, "http://localhost:9000/api");
    }

    #[test]
    fn test_config_from_lookup_missing_token() {
        let err = TrackerConfig::from_lookup(lookup_from(&[("RB_TRACKER_P", "1")])).unwrap_err();
        assert!(err.to_string().contains("ASANA_PAT"));
    }

    #[test]
    fn test_config_from_lookup_rejects_non_http_url() {
        let err = TrackerConfig::from_lookup(lookup_from(&[
            ("ASANA_PAT", "pat"),
            ("RB_TRACKER_P", "1"),
            ("BUILDREQ_TRACKER_URL", "ftp://tracker.example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
        assert!(err.to_string().contains("ftp://tracker.example.com"));
    }

    #[test]
    fn test_config_from_lookup_bad_number() {
        let result = TrackerConfig::from_lookup(lookup_from(&[
            ("ASANA_PAT", "pat"),
            ("RB_TRACKER_P", "1"),
            ("BUILDREQ_DAYS_BACK", "fortnight"),
        ]));
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn test_config_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
access_token = "pat-file"
project_id = "4242"
missing_field_placeholder = "TBC"
request_timeout_secs = 5
"#
        )
        .unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();
        assert_eq!(config.access_token(), "pat-file");
        assert_eq!(config.project_id, "4242");
        assert_eq!(config.missing_field_placeholder, "TBC");
        assert_eq!(config.days_back, 14);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_toml_rejects_empty_project() {
        let result = TrackerConfig::from_toml("access_token = \"x\"\nproject_id = \"\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = TrackerConfig::new("super-secret-pat", "1");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("super-secret-pat"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
