//! Configuration for the midilink front end
//!
//! Loads and validates the YAML configuration file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
}

/// MIDI port and queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Input port selector: numeric index or case-insensitive name substring
    pub input_port: String,

    /// Output port selector, required only for sending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,

    /// Capacity of the message queue between the device callback and the
    /// application. Required: there is no default, the embedding
    /// application must choose.
    pub queue_capacity: usize,
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AppConfig =
            serde_yaml::from_str(&text).context("failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the core cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.trim().is_empty() {
            bail!("midi.input_port must not be empty");
        }
        if self.midi.queue_capacity == 0 {
            bail!("midi.queue_capacity must be positive");
        }
        Ok(())
    }
}
