use crate::record::types::DestinationKey;
use std::collections::HashMap;

/// Last known write token per destination.
///
/// Owned by whoever runs the relay and lent to each write. A missing entry
/// sends the writer to the sink for the authoritative token, so losing the
/// cache only costs a probe.
#[derive(Debug, Default, Clone)]
pub struct SequenceTokenCache {
    tokens: HashMap<DestinationKey, Option<String>>,
}

impl SequenceTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when nothing is cached; `Some(None)` when the stream is known
    /// and expects its first write.
    pub fn lookup(&self, destination: &DestinationKey) -> Option<Option<&str>> {
        self.tokens.get(destination).map(Option::as_deref)
    }

    pub fn record(&mut self, destination: &DestinationKey, token: Option<String>) {
        tracing::trace!(destination = %destination, token = ?token, "Caching sequence token");
        self.tokens.insert(destination.clone(), token);
    }

    pub fn invalidate(&mut self, destination: &DestinationKey) {
        self.tokens.remove(destination);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
