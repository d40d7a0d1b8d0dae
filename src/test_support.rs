#![cfg(test)]

use crate::queue::client::{MessageQueue, QueueError};
use crate::queue::envelope::{encode_message, AckHandle, PullEnvelope};
use crate::record::types::{MonitoredResource, NormalizedLogEntry, RawLogRecord};
use crate::sink::traits::{LogSink, PutReceipt, SinkError, StreamDescription, StreamPage};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkCall {
    Describe {
        group: String,
        page_token: Option<String>,
    },
    CreateGroup(String),
    CreateStream {
        group: String,
        stream: String,
    },
    Put {
        group: String,
        stream: String,
        token: Option<String>,
        entries: Vec<NormalizedLogEntry>,
    },
}

/// Streams of a group in creation order, with their current token.
type Streams = Vec<(String, Option<String>)>;

#[derive(Default)]
struct SinkState {
    groups: BTreeMap<String, Streams>,
    issued_tokens: u64,
    calls: Vec<SinkCall>,
    put_failures: VecDeque<SinkError>,
    describe_failures: VecDeque<SinkError>,
    create_group_failures: VecDeque<SinkError>,
    stream_races: VecDeque<Option<String>>,
    page_size: usize,
}

/// In-memory sink that behaves like the real service where it matters to the
/// writer: groups and streams must exist, and every put must carry the
/// stream's current token or it is rejected with the expected one.
pub(crate) struct MemorySink {
    state: Mutex<SinkState>,
}

impl MemorySink {
    pub(crate) fn new() -> Self {
        Self::with_page_size(50)
    }

    pub(crate) fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(SinkState {
                page_size,
                ..SinkState::default()
            }),
        }
    }

    pub(crate) fn add_group(&self, group: &str) {
        self.state.lock().unwrap().groups.entry(group.to_string()).or_default();
    }

    pub(crate) fn add_stream(&self, group: &str, stream: &str, token: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        set_stream(&mut state, group, stream, token.map(str::to_string));
    }

    pub(crate) fn remove_group(&self, group: &str) {
        self.state.lock().unwrap().groups.remove(group);
    }

    /// Simulate another writer appending to the stream.
    pub(crate) fn advance_token(&self, group: &str, stream: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let token = next_token(&mut state);
        set_stream(&mut state, group, stream, Some(token.clone()));
        token
    }

    pub(crate) fn fail_next_put(&self, error: SinkError) {
        self.state.lock().unwrap().put_failures.push_back(error);
    }

    pub(crate) fn fail_next_describe(&self, error: SinkError) {
        self.state.lock().unwrap().describe_failures.push_back(error);
    }

    pub(crate) fn fail_next_create_group(&self, error: SinkError) {
        self.state.lock().unwrap().create_group_failures.push_back(error);
    }

    /// The next stream creation loses a race: another writer creates the
    /// stream (with `token`) just before ours arrives.
    pub(crate) fn race_next_create_stream(&self, token: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .stream_races
            .push_back(token.map(str::to_string));
    }

    pub(crate) fn stream_token(&self, group: &str, stream: &str) -> Option<Option<String>> {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(group)
            .and_then(|streams| find_stream(streams, stream).cloned())
    }

    pub(crate) fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn describe_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::Describe { .. }))
    }

    pub(crate) fn create_group_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::CreateGroup(_)))
    }

    pub(crate) fn create_stream_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::CreateStream { .. }))
    }

    /// Token and entries of every put, in call order.
    pub(crate) fn puts(&self) -> Vec<(Option<String>, Vec<NormalizedLogEntry>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Put { token, entries, .. } => Some((token, entries)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&SinkCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }
}

fn find_stream<'s>(streams: &'s Streams, name: &str) -> Option<&'s Option<String>> {
    streams.iter().find(|(n, _)| n == name).map(|(_, token)| token)
}

fn set_stream(state: &mut SinkState, group: &str, stream: &str, token: Option<String>) {
    let streams = state.groups.entry(group.to_string()).or_default();
    match streams.iter_mut().find(|(n, _)| n == stream) {
        Some((_, current)) => *current = token,
        None => streams.push((stream.to_string(), token)),
    }
}

fn next_token(state: &mut SinkState) -> String {
    state.issued_tokens += 1;
    format!("token-{}", state.issued_tokens)
}

#[async_trait]
impl LogSink for MemorySink {
    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<StreamPage, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SinkCall::Describe {
            group: group.to_string(),
            page_token: page_token.map(str::to_string),
        });
        if let Some(error) = state.describe_failures.pop_front() {
            return Err(error);
        }

        let streams = state
            .groups
            .get(group)
            .ok_or_else(|| SinkError::ResourceNotFound(group.to_string()))?;
        let matching: Vec<StreamDescription> = streams
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, token)| StreamDescription {
                name: name.clone(),
                upload_sequence_token: token.clone(),
            })
            .collect();

        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + state.page_size).min(matching.len());
        Ok(StreamPage {
            streams: matching[start.min(end)..end].to_vec(),
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn create_group(&self, group: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SinkCall::CreateGroup(group.to_string()));
        if let Some(error) = state.create_group_failures.pop_front() {
            return Err(error);
        }
        if state.groups.contains_key(group) {
            return Err(SinkError::AlreadyExists(group.to_string()));
        }
        state.groups.insert(group.to_string(), Vec::new());
        Ok(())
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SinkCall::CreateStream {
            group: group.to_string(),
            stream: stream.to_string(),
        });
        if let Some(token) = state.stream_races.pop_front() {
            set_stream(&mut state, group, stream, token);
            return Err(SinkError::AlreadyExists(stream.to_string()));
        }
        let streams = state
            .groups
            .get_mut(group)
            .ok_or_else(|| SinkError::ResourceNotFound(group.to_string()))?;
        if find_stream(streams, stream).is_some() {
            return Err(SinkError::AlreadyExists(stream.to_string()));
        }
        streams.push((stream.to_string(), None));
        Ok(())
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        entries: &[NormalizedLogEntry],
        token: Option<&str>,
    ) -> Result<PutReceipt, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SinkCall::Put {
            group: group.to_string(),
            stream: stream.to_string(),
            token: token.map(str::to_string),
            entries: entries.to_vec(),
        });
        if let Some(error) = state.put_failures.pop_front() {
            return Err(error);
        }

        let current = state
            .groups
            .get(group)
            .and_then(|streams| find_stream(streams, stream))
            .cloned()
            .ok_or_else(|| SinkError::ResourceNotFound(format!("{}/{}", group, stream)))?;
        if current.as_deref() != token {
            return Err(SinkError::InvalidSequenceToken { expected: current });
        }

        let next = next_token(&mut state);
        set_stream(&mut state, group, stream, Some(next.clone()));
        Ok(PutReceipt {
            next_sequence_token: Some(next),
        })
    }
}

#[derive(Default)]
struct QueueState {
    pulls: VecDeque<Result<PullEnvelope, QueueError>>,
    pull_sizes: Vec<usize>,
    acknowledged: Vec<Vec<AckHandle>>,
    ack_failures: VecDeque<QueueError>,
}

/// Queue that replays prepared pull responses, then returns empty pulls.
pub(crate) struct ScriptedQueue {
    state: Mutex<QueueState>,
}

impl ScriptedQueue {
    pub(crate) fn new(envelopes: Vec<PullEnvelope>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pulls: envelopes.into_iter().map(Ok).collect(),
                ..QueueState::default()
            }),
        }
    }

    pub(crate) fn push_pull_error(&self, error: QueueError) {
        self.state.lock().unwrap().pulls.push_back(Err(error));
    }

    pub(crate) fn fail_next_ack(&self, error: QueueError) {
        self.state.lock().unwrap().ack_failures.push_back(error);
    }

    pub(crate) fn pull_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().pull_sizes.clone()
    }

    pub(crate) fn acknowledged(&self) -> Vec<Vec<AckHandle>> {
        self.state.lock().unwrap().acknowledged.clone()
    }
}

#[async_trait]
impl MessageQueue for ScriptedQueue {
    async fn pull(&self, max_messages: usize) -> Result<PullEnvelope, QueueError> {
        let mut state = self.state.lock().unwrap();
        state.pull_sizes.push(max_messages);
        state.pulls.pop_front().unwrap_or_else(|| Ok(PullEnvelope::default()))
    }

    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.ack_failures.pop_front() {
            return Err(error);
        }
        state.acknowledged.push(handles.to_vec());
        Ok(())
    }
}

pub(crate) fn function_record(function_name: &str, at: DateTime<Utc>, text: &str) -> RawLogRecord {
    RawLogRecord {
        timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        text_payload: Some(text.to_string()),
        json_payload: None,
        proto_payload: None,
        resource: MonitoredResource {
            resource_type: "cloud_function".to_string(),
            labels: [("function_name".to_string(), function_name.to_string())]
                .into_iter()
                .collect(),
        },
    }
}

/// Wrap records in a pull envelope with ack ids `<prefix>-<index>`.
pub(crate) fn envelope(prefix: &str, records: &[RawLogRecord]) -> PullEnvelope {
    PullEnvelope {
        received_messages: records
            .iter()
            .enumerate()
            .map(|(i, r)| encode_message(format!("{}-{}", prefix, i), r).unwrap())
            .collect(),
    }
}
