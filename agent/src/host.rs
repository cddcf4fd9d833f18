//! Runs one sampler per configured component and funnels their output
//! into a single stream of [`OutboundEvent`]s.

use std::sync::Arc;

use termsampler_core::config::EngineConfig;
use termsampler_core::sampling::{AlertSlot, ChannelConsumer, ConsumerEvent, Sampler};
use termsampler_core::session::Environment;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::protocol::messages::{InboundCommand, OutboundEvent};

pub type EventSender = mpsc::UnboundedSender<OutboundEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<OutboundEvent>;

/// All running samplers of one configuration.
pub struct Host {
    samplers: Vec<Sampler>,
    forwarders: Vec<JoinHandle<()>>,
    paused: bool,
}

impl Host {
    /// Start every component of `config` with the merged environment `env`.
    pub fn start(config: &EngineConfig, env: Environment) -> (Self, EventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut samplers = Vec::with_capacity(config.components.len());
        let mut forwarders = Vec::with_capacity(config.components.len());

        for component in &config.components {
            let (consumer, consumer_rx) = ChannelConsumer::new();
            samplers.push(Sampler::from_config(
                component,
                env.clone(),
                Arc::new(consumer),
            ));
            forwarders.push(tokio::spawn(forward_events(
                component.title.clone(),
                consumer_rx,
                events_tx.clone(),
            )));
        }

        info!(components = samplers.len(), "Host started");
        (
            Self {
                samplers,
                forwarders,
                paused: false,
            },
            events_rx,
        )
    }

    /// Apply a control command to every sampler and report the new state.
    pub fn apply(&mut self, command: InboundCommand) -> OutboundEvent {
        self.paused = match command {
            InboundCommand::Pause => true,
            InboundCommand::Resume => false,
            InboundCommand::Toggle => !self.paused,
        };
        for sampler in &self.samplers {
            sampler.pause(self.paused);
        }
        debug!(paused = self.paused, "Pause state changed");
        OutboundEvent::Paused {
            paused: self.paused,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub async fn shutdown(self) {
        for sampler in self.samplers {
            sampler.shutdown().await;
        }
        for forwarder in self.forwarders {
            forwarder.abort();
        }
        info!("Host stopped");
    }
}

/// Translate one component's consumer events, clearing recoverable alerts
/// when a sample succeeds.
async fn forward_events(
    component: String,
    mut rx: mpsc::UnboundedReceiver<ConsumerEvent>,
    tx: EventSender,
) {
    let mut slot = AlertSlot::new();
    while let Some(event) = rx.recv().await {
        let mut out = Vec::with_capacity(2);
        match event {
            ConsumerEvent::Sample(sample) => {
                if let Some(cleared) = slot.sample_succeeded() {
                    out.push(OutboundEvent::AlertCleared {
                        component: component.clone(),
                        title: cleared.title,
                    });
                }
                out.push(OutboundEvent::sample(&component, sample));
            }
            ConsumerEvent::Alert(alert) => {
                slot.show(alert.clone());
                out.push(OutboundEvent::Alert {
                    component: component.clone(),
                    alert,
                });
            }
            ConsumerEvent::Signal(signal) => out.push(OutboundEvent::Signal {
                component: component.clone(),
                signal,
            }),
        }
        for event in out {
            if tx.send(event).is_err() {
                return;
            }
        }
    }
}
