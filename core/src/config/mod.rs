//! Engine configuration surface.
//!
//! The document is JSON with kebab-case keys:
//!
//! ```json
//! {
//!   "variables": { "HOST": "db01" },
//!   "components": [
//!     {
//!       "title": "Load",
//!       "rate-ms": 500,
//!       "items": [{ "sample": "cut -d' ' -f1 /proc/loadavg" }],
//!       "triggers": [{
//!         "title": "High load",
//!         "condition": "echo \"$cur > 4\" | bc",
//!         "actions": { "terminal-bell": true, "visual": true }
//!       }]
//!     }
//!   ]
//! }
//! ```

pub mod validation;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, CoreError};

pub use validation::validate_engine;

/// Polling rate used when a component does not set `rate-ms`.
pub const DEFAULT_RATE_MS: u64 = 1000;

/// One data source of a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ItemConfig {
    pub label: Option<String>,
    #[serde(default)]
    pub sample: String,
    /// Single init script; starts a session running it.
    pub init: Option<String>,
    /// Session process followed by commands written to it.
    pub multistep_init: Option<Vec<String>>,
    pub transform: Option<String>,
    #[serde(default)]
    pub pty: bool,
    pub color: Option<String>,
}

impl ItemConfig {
    /// Ordered init scripts; empty for stateless items.
    pub fn init_scripts(&self) -> Vec<String> {
        match (&self.multistep_init, &self.init) {
            (Some(steps), _) => steps.clone(),
            (None, Some(init)) => vec![init.clone()],
            (None, None) => Vec::new(),
        }
    }
}

/// Side effects of a firing trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActionsConfig {
    #[serde(default)]
    pub terminal_bell: bool,
    #[serde(default)]
    pub sound: bool,
    #[serde(default)]
    pub visual: bool,
    pub script: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerConfig {
    pub title: String,
    pub condition: String,
    #[serde(default)]
    pub actions: ActionsConfig,
}

/// A visual component: one Sampler's worth of items and triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComponentConfig {
    pub title: String,
    #[serde(default = "default_rate_ms")]
    pub rate_ms: u64,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

impl ComponentConfig {
    pub fn rate(&self) -> Duration {
        Duration::from_millis(self.rate_ms)
    }

    /// Label of the item at `index`. A lone unlabeled item is named after
    /// the component.
    pub fn item_label(&self, index: usize) -> String {
        match self.items.get(index).and_then(|item| item.label.clone()) {
            Some(label) => label,
            None if self.items.len() == 1 => self.title.clone(),
            None => format!("{}#{index}", self.title),
        }
    }
}

fn default_rate_ms() -> u64 {
    DEFAULT_RATE_MS
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// File-defined script variables; CLI variables override these.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Read, parse and validate the document at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }

    pub fn validate(&self) -> Vec<crate::errors::ValidationError> {
        validate_engine(self)
    }
}
