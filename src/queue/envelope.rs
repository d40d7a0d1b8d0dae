use crate::record::types::RawLogRecord;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("message {ack_id} is not valid base64: {source}")]
    Base64 {
        ack_id: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("message {ack_id} is not a log entry: {source}")]
    Json {
        ack_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Opaque acknowledgment id for one delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckHandle(String);

impl AckHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Body of a synchronous pull response.
///
/// An empty pull omits `receivedMessages` entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullEnvelope {
    #[serde(default)]
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message: PubsubMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_attempt: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    /// Base64 encoded JSON log entry
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

impl PullEnvelope {
    pub fn len(&self) -> usize {
        self.received_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received_messages.is_empty()
    }

    /// Decode every message into a log record, paired index-for-index with its
    /// ack handle. One malformed message fails the whole envelope.
    pub fn decode(self) -> Result<(Vec<RawLogRecord>, Vec<AckHandle>), EnvelopeError> {
        let mut records = Vec::with_capacity(self.received_messages.len());
        let mut acks = Vec::with_capacity(self.received_messages.len());

        for received in self.received_messages {
            records.push(decode_message(&received)?);
            acks.push(AckHandle(received.ack_id));
        }

        Ok((records, acks))
    }
}

fn decode_message(received: &ReceivedMessage) -> Result<RawLogRecord, EnvelopeError> {
    let bytes = STANDARD
        .decode(received.message.data.as_bytes())
        .map_err(|source| EnvelopeError::Base64 {
            ack_id: received.ack_id.clone(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|source| EnvelopeError::Json {
        ack_id: received.ack_id.clone(),
        source,
    })
}

/// Wrap a log record the way the upstream publisher does.
pub fn encode_message(ack_id: impl Into<String>, record: &RawLogRecord) -> Result<ReceivedMessage, serde_json::Error> {
    let json = serde_json::to_vec(record)?;
    Ok(ReceivedMessage {
        ack_id: ack_id.into(),
        message: PubsubMessage {
            data: STANDARD.encode(json),
            ..PubsubMessage::default()
        },
        delivery_attempt: None,
    })
}
