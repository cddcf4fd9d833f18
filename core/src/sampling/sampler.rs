//! Periodic polling of a component's items.
//!
//! One tick task fires every `rate`. On each unpaused tick it spawns one
//! task per idle item; an item still busy with the previous tick is
//! skipped. Successful samples go to the consumer and, through an mpsc
//! queue, to the trigger task that owns the component's triggers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ComponentConfig;
use crate::sampling::consumer::{Alert, Consumer, Sample};
use crate::sampling::item::Item;
use crate::sampling::trigger::Trigger;
use crate::session::shell::Environment;

type SharedItem = Arc<Mutex<Item>>;

/// Running scheduler for one component.
pub struct Sampler {
    items: Vec<SharedItem>,
    pause_tx: watch::Sender<bool>,
    cancel: CancellationToken,
    tick_task: JoinHandle<()>,
    trigger_task: JoinHandle<()>,
}

impl Sampler {
    /// Start polling `items` every `rate`. The first tick fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        items: Vec<Item>,
        triggers: Vec<Trigger>,
        rate: Duration,
        env: Environment,
        consumer: Arc<dyn Consumer>,
    ) -> Self {
        let items: Vec<SharedItem> = items
            .into_iter()
            .map(|item| Arc::new(Mutex::new(item)))
            .collect();
        let env = Arc::new(env);
        let cancel = CancellationToken::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        let (samples_tx, samples_rx) = mpsc::unbounded_channel();

        info!(items = items.len(), triggers = triggers.len(), ?rate, "Starting sampler");

        let tick_task = tokio::spawn(tick_loop(
            items.clone(),
            rate,
            env.clone(),
            consumer.clone(),
            samples_tx,
            pause_rx,
            cancel.clone(),
        ));
        let trigger_task = tokio::spawn(trigger_loop(
            triggers,
            samples_rx,
            env,
            consumer,
            cancel.clone(),
        ));

        Self {
            items,
            pause_tx,
            cancel,
            tick_task,
            trigger_task,
        }
    }

    /// Build items and triggers from a component definition and start.
    pub fn from_config(
        component: &ComponentConfig,
        env: Environment,
        consumer: Arc<dyn Consumer>,
    ) -> Self {
        let rate = component.rate();
        let items = component
            .items
            .iter()
            .enumerate()
            .map(|(index, config)| Item::from_config(config, component.item_label(index), rate))
            .collect();
        let triggers = component.triggers.iter().map(Trigger::from_config).collect();
        Self::start(items, triggers, rate, env, consumer)
    }

    /// Suppress (`true`) or resume (`false`) dispatch on future ticks.
    ///
    /// Work already in flight is never cancelled.
    pub fn pause(&self, paused: bool) {
        self.pause_tx.send_replace(paused);
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    /// Flip the pause state and return the new one.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = false;
        self.pause_tx.send_modify(|state| {
            *state = !*state;
            paused = *state;
        });
        paused
    }

    /// Stop ticking and trigger evaluation, then close idle items' sessions.
    ///
    /// Item tasks still running finish on their own; their sessions are
    /// killed when the item is dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.tick_task.await;
        let _ = self.trigger_task.await;

        for item in &self.items {
            if let Ok(mut item) = item.try_lock() {
                item.close().await;
            }
        }
        info!("Sampler stopped");
    }
}

async fn tick_loop(
    items: Vec<SharedItem>,
    rate: Duration,
    env: Arc<Environment>,
    consumer: Arc<dyn Consumer>,
    samples: mpsc::UnboundedSender<Sample>,
    pause: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(rate);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Tick task cancelled");
                break;
            }
            _ = ticker.tick() => {
                if *pause.borrow() {
                    continue;
                }
                for item in &items {
                    dispatch(item, &env, &consumer, &samples);
                }
            }
        }
    }
}

fn dispatch(
    item: &SharedItem,
    env: &Arc<Environment>,
    consumer: &Arc<dyn Consumer>,
    samples: &mpsc::UnboundedSender<Sample>,
) {
    let Ok(mut item) = item.clone().try_lock_owned() else {
        debug!("Item still busy, skipping tick");
        return;
    };
    let env = env.clone();
    let consumer = consumer.clone();
    let samples = samples.clone();

    tokio::spawn(async move {
        match item.next_value(&env).await {
            Ok(value) if value.is_empty() => {
                debug!(label = item.label(), "Empty sample ignored");
            }
            Ok(value) => {
                let sample = Sample {
                    label: item.label().to_string(),
                    value,
                    color: item.color().map(String::from),
                };
                consumer.receive_sample(sample.clone());
                let _ = samples.send(sample);
            }
            Err(e) => {
                warn!(label = item.label(), "Sampling failed: {e}");
                consumer.receive_alert(Alert::sampling_failure(
                    e.to_string(),
                    item.color().map(String::from),
                ));
            }
        }
    });
}

async fn trigger_loop(
    mut triggers: Vec<Trigger>,
    mut samples: mpsc::UnboundedReceiver<Sample>,
    env: Arc<Environment>,
    consumer: Arc<dyn Consumer>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Trigger task cancelled");
                break;
            }
            sample = samples.recv() => {
                let Some(sample) = sample else { break };
                for trigger in &mut triggers {
                    trigger.execute(&sample, &env, consumer.as_ref()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::consumer::{ChannelConsumer, ConsumerEvent};

    #[tokio::test]
    async fn pause_state_round_trips() {
        let (consumer, _rx) = ChannelConsumer::new();
        let sampler = Sampler::start(
            vec![],
            vec![],
            Duration::from_secs(1),
            Environment::new(),
            Arc::new(consumer),
        );

        assert!(!sampler.is_paused());
        sampler.pause(true);
        assert!(sampler.is_paused());
        assert!(!sampler.toggle_pause());
        assert!(sampler.toggle_pause());
        sampler.shutdown().await;
    }

    #[tokio::test]
    async fn first_tick_publishes_immediately() {
        let (consumer, mut rx) = ChannelConsumer::new();
        let sampler = Sampler::start(
            vec![Item::new("answer", "echo 42", Duration::from_secs(60))],
            vec![],
            Duration::from_secs(60),
            Environment::new(),
            Arc::new(consumer),
        );

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ConsumerEvent::Sample(Sample {
                label: "answer".into(),
                value: "42".into(),
                color: None,
            })
        );
        sampler.shutdown().await;
    }

    #[tokio::test]
    async fn failure_becomes_recoverable_alert_with_item_color() {
        let (consumer, mut rx) = ChannelConsumer::new();
        let item = Item::new("bad", "exit 3", Duration::from_secs(60)).with_color("yellow");
        let sampler = Sampler::start(
            vec![item],
            vec![],
            Duration::from_secs(60),
            Environment::new(),
            Arc::new(consumer),
        );

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ConsumerEvent::Alert(Alert {
                title: "Sampling failure".into(),
                text: "exit status 3".into(),
                color: Some("yellow".into()),
                recoverable: true,
            })
        );
        sampler.shutdown().await;
    }

    #[tokio::test]
    async fn busy_item_is_skipped() {
        let (consumer, mut rx) = ChannelConsumer::new();
        let slow = Item::new("slow", "sleep 1; echo done", Duration::from_millis(100));
        let sampler = Sampler::start(
            vec![slow],
            vec![],
            Duration::from_millis(100),
            Environment::new(),
            Arc::new(consumer),
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        sampler.pause(true);
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let mut samples = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, ConsumerEvent::Sample(ref s) if s.value == "done"));
            samples += 1;
        }
        // Without skipping, ~15 overlapping runs would have completed.
        assert!((1..=3).contains(&samples), "samples: {samples}");
        sampler.shutdown().await;
    }
}
