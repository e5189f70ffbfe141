// Configuration loader
// Layers ~/.socrates/config.toml (or an explicit path) and SOCRATES_* environment variables

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use super::constants::{CONFIG_DIR, CONFIG_FILE};
use super::provider::ProviderEntry;
use super::settings::{Config, HttpConfig};

/// Load configuration from the config file and the process environment.
///
/// With `path = None` the default `~/.socrates/config.toml` is read if it
/// exists; an explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] but reads variables through `env`.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    let file = match path {
        Some(p) => Some(read_config_file(p)?),
        None => match default_config_path() {
            Some(p) if p.exists() => Some(read_config_file(&p)?),
            _ => None,
        },
    };

    if let Some(file) = file {
        file.apply_to(&mut config);
    }

    apply_env(&mut config, env)?;

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// `~/.socrates/config.toml`, if a home directory can be determined
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// On-disk shape; every field is optional so partial files layer over defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_reflections: Option<NonZeroU32>,
    #[serde(default)]
    debug: Option<bool>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    provider: Option<ProviderEntry>,
    #[serde(default)]
    http: Option<HttpConfig>,
}

impl TomlConfig {
    fn apply_to(self, config: &mut Config) {
        if let Some(model) = self.model {
            config.agent.model = model;
        }
        if let Some(n) = self.max_reflections {
            config.agent.max_reflections = n;
        }
        if let Some(debug) = self.debug {
            config.agent.debug = debug;
        }
        if let Some(language) = self.language {
            config.agent.language = language;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(http) = self.http {
            config.http = http;
        }
    }
}

fn read_config_file(path: &Path) -> Result<TomlConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let parsed = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(parsed)
}

fn apply_env<F>(config: &mut Config, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(model) = var("SOCRATES_MODEL") {
        config.agent.model = model;
    }
    if let Some(raw) = var("SOCRATES_MAX_REFLECTIONS") {
        config.agent.max_reflections = raw.trim().parse().with_context(|| {
            format!("SOCRATES_MAX_REFLECTIONS must be a positive integer, got {:?}", raw)
        })?;
    }
    if let Some(raw) = var("SOCRATES_DEBUG") {
        config.agent.debug = parse_flag(&raw)
            .with_context(|| format!("SOCRATES_DEBUG must be a boolean, got {:?}", raw))?;
    }
    if let Some(language) = var("SOCRATES_LANGUAGE") {
        config.agent.language = language;
    }
    if let Some(name) = var("SOCRATES_PROVIDER") {
        config
            .select_provider(&name)
            .context("Invalid SOCRATES_PROVIDER")?;
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected one of 1/0, true/false, yes/no, on/off"),
    }
}
