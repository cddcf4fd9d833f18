//! Shared helpers for the sampling integration tests.
//!
//! The tests spawn real `sh` processes, so waits are generous wall-clock
//! timeouts rather than exact schedules.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use termsampler_core::sampling::{ChannelConsumer, Consumer, ConsumerEvent};
use tokio::sync::mpsc::UnboundedReceiver;

/// Upper bound for any single expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn consumer() -> (Arc<dyn Consumer>, UnboundedReceiver<ConsumerEvent>) {
    let (consumer, rx) = ChannelConsumer::new();
    (Arc::new(consumer), rx)
}

/// Wait for the next event, failing the test on timeout.
pub async fn next_event(rx: &mut UnboundedReceiver<ConsumerEvent>) -> ConsumerEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Wait until an event matching `pred` arrives, returning it.
pub async fn wait_for<F>(rx: &mut UnboundedReceiver<ConsumerEvent>, mut pred: F) -> ConsumerEvent
where
    F: FnMut(&ConsumerEvent) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Everything received within `window`.
pub async fn collect_for(
    rx: &mut UnboundedReceiver<ConsumerEvent>,
    window: Duration,
) -> Vec<ConsumerEvent> {
    tokio::time::sleep(window).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn sample_values(events: &[ConsumerEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            ConsumerEvent::Sample(sample) => Some(sample.value.as_str()),
            _ => None,
        })
        .collect()
}

pub fn alerts(events: &[ConsumerEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, ConsumerEvent::Alert(_)))
        .count()
}
