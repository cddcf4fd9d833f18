//! Condition scripts evaluated against consecutive sample values.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::TriggerConfig;
use crate::output::is_truthy;
use crate::sampling::consumer::{Alert, Consumer, Sample, Signal};
use crate::session::script::run_script;
use crate::session::shell::Environment;

/// Seed for the `prev` value of a label seen for the first time.
pub const INITIAL_VALUE: &str = "0";

/// What a firing trigger does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerActions {
    pub terminal_bell: bool,
    pub sound: bool,
    pub visual: bool,
    pub script: Option<String>,
}

/// Last two values seen for one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePair {
    pub previous: String,
    pub current: String,
}

impl Default for ValuePair {
    fn default() -> Self {
        Self {
            previous: INITIAL_VALUE.to_string(),
            current: INITIAL_VALUE.to_string(),
        }
    }
}

/// A boolean condition over samples plus the actions it fires.
///
/// The condition script sees `prev`, `cur` and `label` in its environment
/// and fires when its output, stripped to digits, is exactly `1`.
#[derive(Debug, Clone)]
pub struct Trigger {
    title: String,
    condition_script: String,
    actions: TriggerActions,
    values_by_label: HashMap<String, ValuePair>,
}

impl Trigger {
    pub fn new(
        title: impl Into<String>,
        condition_script: impl Into<String>,
        actions: TriggerActions,
    ) -> Self {
        Self {
            title: title.into(),
            condition_script: condition_script.into(),
            actions,
            values_by_label: HashMap::new(),
        }
    }

    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(
            config.title.clone(),
            config.condition.clone(),
            TriggerActions {
                terminal_bell: config.actions.terminal_bell,
                sound: config.actions.sound,
                visual: config.actions.visual,
                script: config.actions.script.clone(),
            },
        )
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Values currently tracked for `label`.
    pub fn values(&self, label: &str) -> Option<&ValuePair> {
        self.values_by_label.get(label)
    }

    /// Evaluate the condition for `sample`, firing actions when it holds.
    ///
    /// Returns whether the trigger fired. A failing condition script is
    /// reported to `consumer` as a recoverable alert and counts as false.
    pub async fn execute(
        &mut self,
        sample: &Sample,
        env: &Environment,
        consumer: &dyn Consumer,
    ) -> bool {
        let values = self.shift(&sample.label, &sample.value);
        let env = env.with(&[
            ("prev", values.previous.as_str()),
            ("cur", values.current.as_str()),
            ("label", sample.label.as_str()),
        ]);

        let output = match run_script(&self.condition_script, &env).await {
            Ok(output) => output,
            Err(e) => {
                warn!(trigger = %self.title, label = %sample.label, "Condition failed: {e}");
                consumer.receive_alert(Alert::condition_failure(
                    e.to_string(),
                    sample.color.clone(),
                ));
                return false;
            }
        };

        if !is_truthy(&output) {
            return false;
        }

        debug!(trigger = %self.title, label = %sample.label, "Trigger fired");
        self.fire(sample, &env, consumer).await;
        true
    }

    fn shift(&mut self, label: &str, value: &str) -> ValuePair {
        let values = self.values_by_label.entry(label.to_string()).or_default();
        values.previous = std::mem::replace(&mut values.current, value.to_string());
        values.clone()
    }

    async fn fire(&self, sample: &Sample, env: &Environment, consumer: &dyn Consumer) {
        if self.actions.terminal_bell {
            consumer.receive_signal(Signal::Bell);
        }
        if self.actions.sound {
            consumer.receive_signal(Signal::Sound);
        }
        if self.actions.visual {
            consumer.receive_alert(Alert {
                title: self.title.clone(),
                text: format!("{}: {}", sample.label, sample.value),
                color: sample.color.clone(),
                recoverable: false,
            });
        }
        if let Some(script) = &self.actions.script {
            if let Err(e) = run_script(script, env).await {
                warn!(trigger = %self.title, "Trigger script failed: {e}");
            }
        }
    }
}
