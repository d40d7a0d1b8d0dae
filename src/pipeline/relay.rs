use crate::batch::assembler::BatchAssembler;
use crate::batch::chunk::{split_for_put, PutLimits};
use crate::config::types::Config;
use crate::queue::client::MessageQueue;
use crate::queue::consumer::{BatchHandler, BatchOutcome, ConsumeSummary, ConsumerError, PullConsumer};
use crate::record::types::RawLogRecord;
use crate::sink::sequence::{SequenceError, SequenceWriter};
use crate::sink::token_cache::SequenceTokenCache;
use crate::sink::traits::LogSink;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

/// Writes each pulled batch to the sink, one destination after another.
pub struct Relay<'a, S: LogSink + ?Sized> {
    sink: &'a S,
    cache: &'a mut SequenceTokenCache,
    assembler: BatchAssembler,
    limits: PutLimits,
}

impl<'a, S: LogSink + ?Sized> Relay<'a, S> {
    pub fn new(sink: &'a S, cache: &'a mut SequenceTokenCache, config: &Config) -> Self {
        Self {
            sink,
            cache,
            assembler: BatchAssembler::new(&config.relay),
            limits: PutLimits::new(config.relay.max_events_per_put, config.relay.max_bytes_per_put),
        }
    }
}

#[async_trait]
impl<'a, S: LogSink + ?Sized> BatchHandler for Relay<'a, S> {
    type Error = SequenceError;

    async fn handle(&mut self, records: Vec<RawLogRecord>) -> Result<BatchOutcome, SequenceError> {
        let assembly = self.assembler.assemble(&records, Utc::now());

        for (destination, counts) in &assembly.stats.per_destination {
            debug!(
                destination = %destination,
                received = counts.received,
                accepted = counts.accepted,
                "Assembled destination"
            );
        }
        if assembly.stats.dropped() > 0 {
            info!(
                no_message = assembly.stats.no_message,
                unparseable = assembly.stats.unparseable,
                out_of_window = assembly.stats.out_of_window,
                "Dropped records from batch"
            );
        }

        let mut outcome = BatchOutcome::default();
        let mut writer = SequenceWriter::new(self.sink, self.cache);
        for (destination, entries) in &assembly.destinations {
            for chunk in split_for_put(entries, self.limits) {
                let report = writer.write(destination, chunk).await?;
                outcome.events_written += report.events;
            }
            outcome.destinations += 1;
        }

        Ok(outcome)
    }
}

/// Run one consumption cycle: pull until the subscription runs short,
/// writing every batch before acknowledging it.
pub async fn relay_once<Q, S>(
    queue: &Q,
    sink: &S,
    cache: &mut SequenceTokenCache,
    config: &Config,
) -> Result<ConsumeSummary, ConsumerError>
where
    Q: MessageQueue + ?Sized,
    S: LogSink + ?Sized,
{
    let mut relay = Relay::new(sink, cache, config);
    PullConsumer::new(queue, config.queue.max_pull_batch_size)
        .consume(&mut relay)
        .await
}
