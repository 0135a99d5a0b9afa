//! WolfVote Configuration
//!
//! This module provides configuration structures for the WolfVote
//! election service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main WolfVote configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfVoteConfig {
    /// Election configuration
    pub election: ElectionSettings,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Election configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSettings {
    /// Administrator identity (drives phases, registers voters)
    pub admin: String,

    /// Display name
    #[serde(default = "default_election_name")]
    pub name: String,

    /// Maximum proposal description length in characters
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,

    /// Number of notifications kept for `/events` readers
    #[serde(default = "default_event_history")]
    pub event_history: usize,

    /// Buffer size of the live notification channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP API bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log to file path (optional)
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_election_name() -> String {
    "election".to_string()
}

fn default_max_description_len() -> usize {
    crate::election::DEFAULT_MAX_DESCRIPTION_LEN
}

fn default_event_history() -> usize {
    1024
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_api_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ElectionSettings {
    fn default() -> Self {
        Self {
            admin: String::new(),
            name: default_election_name(),
            max_description_len: default_max_description_len(),
            event_history: default_event_history(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_address(),
            cors_enabled: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl WolfVoteConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfVoteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.election.admin.trim().is_empty() {
            return Err(crate::Error::Config("election.admin cannot be empty".into()));
        }

        if self.election.max_description_len == 0 {
            return Err(crate::Error::Config(
                "election.max_description_len must be greater than 0".into(),
            ));
        }

        if self.election.event_history == 0 {
            return Err(crate::Error::Config(
                "election.event_history must be greater than 0".into(),
            ));
        }

        if self.election.event_channel_capacity == 0 {
            return Err(crate::Error::Config(
                "election.event_channel_capacity must be greater than 0".into(),
            ));
        }

        if self.api.enabled && self.api.bind_address.is_empty() {
            return Err(crate::Error::Config("api.bind_address cannot be empty".into()));
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            other => {
                return Err(crate::Error::Config(format!(
                    "logging.format must be 'pretty' or 'compact', got '{}'",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Render the starter configuration written by `wolfvote init`
    pub fn template(admin: &str, name: &str) -> String {
        format!(
            r#"# WolfVote Configuration
# Generated configuration file

[election]
admin = "{admin}"
name = "{name}"
max_description_len = {max_len}
event_history = {history}
event_channel_capacity = {capacity}

[api]
enabled = true
bind_address = "0.0.0.0:8080"
cors_enabled = false

[logging]
level = "info"
format = "pretty"
# file = "/var/log/wolfvote/wolfvote.log"
"#,
            max_len = default_max_description_len(),
            history = default_event_history(),
            capacity = default_event_channel_capacity(),
        )
    }
}
