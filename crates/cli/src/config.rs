//! CLI configuration file.
//!
//! ```json
//! {
//!   "log_format": "json",
//!   "resolver": {
//!     "system_namespace": "vela-system",
//!     "default_app_namespace": "default",
//!     "missing_revision": "fail"
//!   }
//! }
//! ```
//!
//! Every field is optional. A missing file means all defaults.

use std::path::Path;

use anyhow::{bail, Context};
use definitions::ResolverConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines on stderr.
    #[default]
    Human,
    /// One JSON object per event on stderr.
    Json,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub log_format: LogFormat,
    pub resolver: ResolverConfig,
}

/// Where the configuration came from, reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    MissingFile(String),
    File(String),
}

impl CliConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: CliConfig =
            serde_json::from_str(json).context("configuration is not valid JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given. A path that does not exist yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<(Self, ConfigSource)> {
        let Some(path) = path else {
            return Ok((Self::default(), ConfigSource::Defaults));
        };
        let shown = path.display().to_string();
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::MissingFile(shown)));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {shown}"))?;
        let config =
            Self::from_json(&text).with_context(|| format!("invalid configuration {shown}"))?;
        Ok((config, ConfigSource::File(shown)))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let problems = self.resolver.validate();
        if !problems.is_empty() {
            bail!("{}", problems.join("; "));
        }
        Ok(())
    }
}
