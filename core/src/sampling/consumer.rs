//! Messages published by the engine and the consumer side that receives
//! them.

use serde::Serialize;
use tokio::sync::mpsc;

/// Title of alerts raised when an item fails to produce a value.
pub const SAMPLING_FAILURE_TITLE: &str = "Sampling failure";

/// Title of alerts raised when a trigger condition script fails.
pub const CONDITION_FAILURE_TITLE: &str = "Trigger condition failure";

/// One observed value of an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A notification for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Recoverable alerts are cleared by the next successful sample.
    pub recoverable: bool,
}

impl Alert {
    pub fn sampling_failure(text: impl Into<String>, color: Option<String>) -> Self {
        Self {
            title: SAMPLING_FAILURE_TITLE.to_string(),
            text: text.into(),
            color,
            recoverable: true,
        }
    }

    pub fn condition_failure(text: impl Into<String>, color: Option<String>) -> Self {
        Self {
            title: CONDITION_FAILURE_TITLE.to_string(),
            text: text.into(),
            color,
            recoverable: true,
        }
    }
}

/// A side effect requested by a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Signal {
    /// Ring the terminal bell.
    Bell,
    /// Play the alert sound.
    Sound,
}

/// Receiver of everything the engine publishes.
///
/// Calls come from many tasks at once and must not block.
pub trait Consumer: Send + Sync {
    fn receive_sample(&self, sample: Sample);
    fn receive_alert(&self, alert: Alert);
    fn receive_signal(&self, signal: Signal);
}

/// Everything a [`ChannelConsumer`] forwards, in publication order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    Sample(Sample),
    Alert(Alert),
    Signal(Signal),
}

/// [`Consumer`] that forwards into an unbounded channel.
///
/// Events published after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<ConsumerEvent>,
}

impl ChannelConsumer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConsumerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Consumer for ChannelConsumer {
    fn receive_sample(&self, sample: Sample) {
        let _ = self.tx.send(ConsumerEvent::Sample(sample));
    }

    fn receive_alert(&self, alert: Alert) {
        let _ = self.tx.send(ConsumerEvent::Alert(alert));
    }

    fn receive_signal(&self, signal: Signal) {
        let _ = self.tx.send(ConsumerEvent::Signal(signal));
    }
}

/// The alert currently shown by a consumer.
#[derive(Debug, Default)]
pub struct AlertSlot {
    current: Option<Alert>,
}

impl AlertSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `alert`, replacing whatever was shown.
    pub fn show(&mut self, alert: Alert) {
        self.current = Some(alert);
    }

    /// Record a successful sample. Returns the alert it cleared, if any.
    pub fn sample_succeeded(&mut self) -> Option<Alert> {
        if self.current.as_ref().is_some_and(|a| a.recoverable) {
            self.current.take()
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&Alert> {
        self.current.as_ref()
    }
}
