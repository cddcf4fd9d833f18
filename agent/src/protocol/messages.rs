//! NDJSON messages exchanged over stdin/stdout.
//!
//! Inbound lines are control commands, outbound lines are engine events
//! tagged with the component they came from.

use serde::{Deserialize, Serialize};
use termsampler_core::output::parse_value;
use termsampler_core::sampling::{Alert, Sample, Signal};

/// A control command read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum InboundCommand {
    Pause,
    Resume,
    Toggle,
}

/// An event written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum OutboundEvent {
    Sample {
        component: String,
        #[serde(flatten)]
        sample: Sample,
        /// The value parsed as a number, when it is one.
        #[serde(skip_serializing_if = "Option::is_none")]
        numeric: Option<f64>,
    },
    Alert {
        component: String,
        #[serde(flatten)]
        alert: Alert,
    },
    AlertCleared {
        component: String,
        title: String,
    },
    Signal {
        component: String,
        signal: Signal,
    },
    Paused {
        paused: bool,
    },
    Error {
        message: String,
    },
}

impl OutboundEvent {
    pub fn sample(component: &str, sample: Sample) -> Self {
        let numeric = parse_value(&sample.value).ok();
        Self::Sample {
            component: component.to_string(),
            sample,
            numeric,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
