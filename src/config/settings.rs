// Configuration structs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

use super::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS};
use super::provider::ProviderEntry;
use crate::agent::AgentConfig;

/// HTTP transport options shared by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts for transient failures (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Loop settings handed to the agent
    pub agent: AgentConfig,

    /// Which backend to use
    pub provider: ProviderEntry,

    /// Transport options for the backend
    pub http: HttpConfig,
}

/// Command-line overrides, applied last
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub max_reflections: Option<NonZeroU32>,
    pub debug: bool,
    pub provider: Option<String>,
    pub language: Option<String>,
}

impl Config {
    /// Apply CLI overrides on top of file and environment settings.
    ///
    /// `debug` only ever turns tracing on; a debug config file cannot be
    /// silenced from the CLI.
    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(model) = overrides.model {
            self.agent.model = model;
        }
        if let Some(n) = overrides.max_reflections {
            self.agent.max_reflections = n;
        }
        if overrides.debug {
            self.agent.debug = true;
        }
        if let Some(language) = overrides.language {
            self.agent.language = language;
        }
        if let Some(name) = overrides.provider {
            self.select_provider(&name)?;
        }
        Ok(())
    }

    /// Switch to the provider called `name`.
    ///
    /// Keeps the configured entry (and its URLs/keys) when it is already of
    /// that type; otherwise starts from an entry resolved from the environment.
    pub fn select_provider(&mut self, name: &str) -> Result<()> {
        let entry = ProviderEntry::from_name(name)?;
        if entry.provider_type() != self.provider.provider_type() {
            self.provider = entry;
        }
        Ok(())
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.agent.model.trim().is_empty() {
            bail!("model must not be empty");
        }
        if self.agent.language.trim().is_empty() {
            bail!("language must not be empty");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be greater than zero");
        }
        if self.http.max_attempts == 0 {
            bail!("http.max_attempts must be greater than zero");
        }
        Ok(())
    }
}
