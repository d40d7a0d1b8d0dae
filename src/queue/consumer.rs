use crate::pipeline::continuation::{drive, Continuation, Step};
use crate::queue::client::{MessageQueue, QueueError};
use crate::queue::envelope::{EnvelopeError, PullEnvelope};
use crate::record::types::RawLogRecord;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("failed to decode pulled messages: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("batch processing failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// What a handler did with one pulled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub events_written: usize,
    pub destinations: usize,
}

/// Processes the records of one pull. Returning `Ok` commits the batch.
#[async_trait]
pub trait BatchHandler: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&mut self, records: Vec<RawLogRecord>) -> Result<BatchOutcome, Self::Error>;
}

/// Totals for one run of [`PullConsumer::consume`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    pub pulls: usize,
    pub records: usize,
    pub acknowledged: usize,
    pub events_written: usize,
    pub destinations_written: usize,
}

/// Pulls, processes and acknowledges until the subscription runs short.
///
/// Each cycle pulls up to `max_batch_size` messages, hands the decoded records
/// to a [`BatchHandler`] and acknowledges the whole pull only once the handler
/// succeeds. A full pull is followed by another; a short pull ends the run.
/// Anything unacknowledged is redelivered by the queue.
pub struct PullConsumer<'q, Q: MessageQueue + ?Sized> {
    queue: &'q Q,
    max_batch_size: usize,
}

impl<'q, Q: MessageQueue + ?Sized> PullConsumer<'q, Q> {
    pub fn new(queue: &'q Q, max_batch_size: usize) -> Self {
        Self {
            queue,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Pull and process until a pull comes back short of a full batch.
    ///
    /// The first error stops the run; the failing pull stays unacknowledged.
    pub async fn consume<H: BatchHandler>(
        &self,
        handler: &mut H,
    ) -> Result<ConsumeSummary, ConsumerError> {
        let mut cycle = PullCycle {
            queue: self.queue,
            handler,
            max_batch_size: self.max_batch_size,
            summary: ConsumeSummary::default(),
        };
        let summary = drive(&mut cycle, ()).await?;

        info!(
            pulls = summary.pulls,
            records = summary.records,
            acknowledged = summary.acknowledged,
            events_written = summary.events_written,
            destinations = summary.destinations_written,
            "Consumption finished"
        );
        Ok(summary)
    }
}

struct PullCycle<'a, Q: ?Sized, H> {
    queue: &'a Q,
    handler: &'a mut H,
    max_batch_size: usize,
    summary: ConsumeSummary,
}

#[async_trait]
impl<'a, Q, H> Continuation for PullCycle<'a, Q, H>
where
    Q: MessageQueue + ?Sized,
    H: BatchHandler,
{
    type Input = ();
    type Response = PullEnvelope;
    type Output = ConsumeSummary;
    type Error = ConsumerError;

    async fn request(&mut self, _input: ()) -> Result<PullEnvelope, ConsumerError> {
        self.summary.pulls += 1;
        Ok(self.queue.pull(self.max_batch_size).await?)
    }

    async fn on_response(
        &mut self,
        envelope: PullEnvelope,
    ) -> Result<Step<(), ConsumeSummary>, ConsumerError> {
        let pulled = envelope.len();
        if pulled == 0 {
            debug!("Pull returned no messages");
            return Ok(Step::Stop(self.summary));
        }

        let (records, acks) = envelope.decode()?;
        self.summary.records += pulled;

        let outcome = self
            .handler
            .handle(records)
            .await
            .map_err(|e| ConsumerError::Handler(Box::new(e)))?;

        self.queue.acknowledge(&acks).await?;
        self.summary.acknowledged += acks.len();
        self.summary.events_written += outcome.events_written;
        self.summary.destinations_written += outcome.destinations;

        info!(
            pulled,
            events_written = outcome.events_written,
            destinations = outcome.destinations,
            "Committed batch"
        );

        Ok(if pulled >= self.max_batch_size {
            Step::Continue(())
        } else {
            Step::Stop(self.summary)
        })
    }
}
