//! Provider configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::wait::{CancelToken, StateWaiter};

/// Sakura Cloud credentials and tuning derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "SAKURACLOUD")]
pub struct ProviderConfig {
    /// API access token. Required.
    pub access_token: String,
    /// API access token secret. Required.
    pub access_token_secret: String,
    /// Zone the machine lives in. Defaults to `is1b`.
    #[ortho_config(default = "is1b".to_owned())]
    pub zone: String,
    /// Root URL of the zone API.
    #[ortho_config(default = "https://secure.sakura.ad.jp/cloud/zone".to_owned())]
    pub api_root_url: String,
    /// Seconds between state polls.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Upper bound in seconds for any single wait.
    #[ortho_config(default = 1200)]
    pub wait_timeout_secs: u64,
    /// Seconds to pause after removing a GSLB member.
    #[ortho_config(default = 10)]
    pub gslb_settle_delay_secs: u64,
    /// Upper bound in seconds for a single API request.
    #[ortho_config(default = 60)]
    pub request_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

/// Name of the discovered configuration file.
pub const CONFIG_FILE_NAME: &str = "sacloud-machine.toml";

impl ProviderConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to {CONFIG_FILE_NAME}",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("sacloud-machine")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a tuning value is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.access_token,
            &FieldMetadata::new(
                "Sakura Cloud access token",
                "SAKURACLOUD_ACCESS_TOKEN",
                "access_token",
            ),
        )?;
        Self::require_field(
            &self.access_token_secret,
            &FieldMetadata::new(
                "Sakura Cloud access token secret",
                "SAKURACLOUD_ACCESS_TOKEN_SECRET",
                "access_token_secret",
            ),
        )?;
        Self::require_field(
            &self.zone,
            &FieldMetadata::new("zone", "SAKURACLOUD_ZONE", "zone"),
        )?;
        Self::require_field(
            &self.api_root_url,
            &FieldMetadata::new("API root URL", "SAKURACLOUD_API_ROOT_URL", "api_root_url"),
        )?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "SAKURACLOUD_POLL_INTERVAL_SECS must be greater than zero",
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "SAKURACLOUD_REQUEST_TIMEOUT_SECS must be greater than zero",
            )));
        }
        if self.wait_timeout_secs < self.poll_interval_secs {
            return Err(ConfigError::Invalid(String::from(
                "SAKURACLOUD_WAIT_TIMEOUT_SECS must not be shorter than the poll interval",
            )));
        }
        Ok(())
    }

    /// Interval between state polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Upper bound for a single wait.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Pause after a GSLB member is removed.
    #[must_use]
    pub const fn gslb_settle_delay(&self) -> Duration {
        Duration::from_secs(self.gslb_settle_delay_secs)
    }

    /// Upper bound for one API request.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builds a waiter using the configured interval and timeout.
    #[must_use]
    pub fn waiter(&self, cancel: CancelToken) -> StateWaiter {
        StateWaiter::new(self.poll_interval(), self.wait_timeout(), cancel)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
