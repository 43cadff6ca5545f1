//! Configuration types for the announce system
//!
//! Reading the host's own configuration format is the host's business; this
//! module only defines the values the engine consumes and how they are
//! defaulted, clamped and validated.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest effective update interval
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Announce configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Master-server addresses, in configuration order
    #[serde(default)]
    pub servers: Vec<String>,

    /// Emit verbose diagnostics
    #[serde(default)]
    pub verbose: bool,

    /// Seconds between announce cycles
    ///
    /// Values `<= 0` are clamped to one second by [`AnnounceConfig::effective_interval`].
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: i64,

    /// Per-request transport timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// `User-Agent` header sent with every announce
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl AnnounceConfig {
    /// Create a configuration with defaults for the given addresses
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the verbose flag
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the update interval (in seconds, unclamped)
    pub fn with_update_interval_secs(mut self, secs: i64) -> Self {
        self.update_interval_secs = secs;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Interval between announce cycles, clamped to at least one second
    pub fn effective_interval(&self) -> Duration {
        u64::try_from(self.update_interval_secs)
            .ok()
            .map(Duration::from_secs)
            .filter(|interval| *interval >= MIN_UPDATE_INTERVAL)
            .unwrap_or(MIN_UPDATE_INTERVAL)
    }

    /// Per-request transport timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.servers.iter().all(|s| s.trim().is_empty()) {
            return Err(crate::Error::config(
                "No master-servers specified. No reason to load the plug-in.",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(crate::Error::config("User agent cannot be empty"));
        }

        Ok(())
    }
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            verbose: false,
            update_interval_secs: default_update_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_update_interval_secs() -> i64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "VCMP/0.4".to_string()
}

/// Host settings needed to build announce payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Port the game server listens on
    pub port: u16,
}
