use crate::record::types::NormalizedLogEntry;

/// Fixed per-event overhead the sink adds to each message's size.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Widest timestamp range the sink accepts in one put.
pub const MAX_PUT_SPAN_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Upper bounds on a single put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutLimits {
    pub max_events: usize,
    pub max_bytes: usize,
}

impl PutLimits {
    pub fn new(max_events: usize, max_bytes: usize) -> Self {
        Self {
            max_events: max_events.max(1),
            max_bytes,
        }
    }
}

pub fn event_size(entry: &NormalizedLogEntry) -> usize {
    entry.message.len() + EVENT_OVERHEAD_BYTES
}

/// Split ordered entries into consecutive chunks that each fit `limits` and
/// cover at most [`MAX_PUT_SPAN_MILLIS`] from their first entry.
///
/// An entry larger than `max_bytes` on its own still gets a chunk of one;
/// the sink decides what to do with it.
pub fn split_for_put(entries: &[NormalizedLogEntry], limits: PutLimits) -> Vec<&[NormalizedLogEntry]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut bytes = 0;

    for (i, entry) in entries.iter().enumerate() {
        let size = event_size(entry);
        let count = i - start;
        let span = entry.timestamp - entries[start].timestamp;
        if count > 0
            && (count >= limits.max_events
                || bytes + size > limits.max_bytes
                || span > MAX_PUT_SPAN_MILLIS)
        {
            chunks.push(&entries[start..i]);
            start = i;
            bytes = 0;
        }
        bytes += size;
    }

    if start < entries.len() {
        chunks.push(&entries[start..]);
    }
    chunks
}
