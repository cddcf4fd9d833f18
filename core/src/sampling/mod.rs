//! Items, triggers and the sampler that drives them.

pub mod consumer;
pub mod item;
pub mod sampler;
pub mod trigger;

pub use consumer::{Alert, AlertSlot, ChannelConsumer, Consumer, ConsumerEvent, Sample, Signal};
pub use item::{Item, ERROR_THRESHOLD};
pub use sampler::Sampler;
pub use trigger::{Trigger, TriggerActions};
