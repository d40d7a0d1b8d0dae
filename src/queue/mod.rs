pub mod client;
pub mod consumer;
pub mod envelope;

pub use client::{MessageQueue, PubSubClient, QueueError};
pub use consumer::{BatchHandler, BatchOutcome, ConsumeSummary, ConsumerError, PullConsumer};
pub use envelope::{AckHandle, EnvelopeError, PullEnvelope};
