use crate::config::types::RelayConfig;
use crate::record::format::{EntryFormatter, FormatError};
use crate::record::types::{DestinationKey, NormalizedLogEntry, RawLogRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Received and accepted record counts for one destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestinationCounts {
    pub received: usize,
    pub accepted: usize,
}

/// Why records did not make it into a write request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub per_destination: BTreeMap<DestinationKey, DestinationCounts>,
    pub no_message: usize,
    pub unparseable: usize,
    pub out_of_window: usize,
}

impl AssemblyStats {
    pub fn accepted(&self) -> usize {
        self.per_destination.values().map(|c| c.accepted).sum()
    }

    pub fn dropped(&self) -> usize {
        self.no_message + self.unparseable + self.out_of_window
    }
}

/// Entries grouped by destination, each group in ascending timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub destinations: BTreeMap<DestinationKey, Vec<NormalizedLogEntry>>,
    pub stats: AssemblyStats,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Turns a pulled batch into per-destination write requests.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    formatter: EntryFormatter,
    retention_window: Duration,
}

impl BatchAssembler {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            formatter: EntryFormatter::new(config),
            retention_window: config.retention_window,
        }
    }

    /// Group, filter and order `records` relative to `now`.
    ///
    /// Entries strictly older than `now - retention_window` are dropped.
    /// Destinations left with no entries are omitted.
    pub fn assemble(&self, records: &[RawLogRecord], now: DateTime<Utc>) -> Assembly {
        let cutoff = now.timestamp_millis() - self.retention_window.as_millis() as i64;
        let mut assembly = Assembly::default();

        for record in records {
            if !record.has_message() {
                assembly.stats.no_message += 1;
                continue;
            }

            let destination = self.formatter.route(record);
            let counts = assembly
                .stats
                .per_destination
                .entry(destination.clone())
                .or_default();
            counts.received += 1;

            let entry = match self.formatter.format(record) {
                Ok(entry) => entry,
                Err(FormatError::NoMessageData) => {
                    assembly.stats.no_message += 1;
                    continue;
                }
                Err(e @ FormatError::InvalidTimestamp { .. }) => {
                    tracing::warn!(destination = %destination, error = %e, "Dropping record");
                    assembly.stats.unparseable += 1;
                    continue;
                }
            };

            if entry.timestamp < cutoff {
                assembly.stats.out_of_window += 1;
                continue;
            }

            counts.accepted += 1;
            assembly
                .destinations
                .entry(destination)
                .or_default()
                .push(entry);
        }

        // Stable sort keeps arrival order among equal timestamps
        for entries in assembly.destinations.values_mut() {
            entries.sort_by_key(|e| e.timestamp);
        }

        assembly
    }
}
