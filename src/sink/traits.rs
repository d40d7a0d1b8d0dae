use crate::record::types::NormalizedLogEntry;
use async_trait::async_trait;
use thiserror::Error;

/// One stream as reported by a describe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub name: String,
    /// Absent for a stream that has never been written to
    pub upload_sequence_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamPage {
    pub streams: Vec<StreamDescription>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutReceipt {
    pub next_sequence_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The token did not match; `expected` is the one the sink wants next
    #[error("invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<String> },

    /// The batch was accepted earlier; `expected` is the one the sink wants next
    #[error("data already accepted, expected {expected:?}")]
    DataAlreadyAccepted { expected: Option<String> },

    #[error("sink returned {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl SinkError {
    /// The corrected token carried by a token-mismatch rejection.
    ///
    /// `Some(None)` means the sink expects no token at all.
    pub fn corrected_token(&self) -> Option<Option<&str>> {
        match self {
            SinkError::InvalidSequenceToken { expected }
            | SinkError::DataAlreadyAccepted { expected } => Some(expected.as_deref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// An append-only log store guarded by per-stream sequence tokens.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// List streams in `group` whose name starts with `prefix`, one page at a time.
    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<StreamPage>;

    async fn create_group(&self, group: &str) -> Result<()>;

    async fn create_stream(&self, group: &str, stream: &str) -> Result<()>;

    /// Append `entries` (already in timestamp order) using `token`.
    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        entries: &[NormalizedLogEntry],
        token: Option<&str>,
    ) -> Result<PutReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrected_token_only_for_token_rejections() {
        let stale = SinkError::InvalidSequenceToken {
            expected: Some("49590".to_string()),
        };
        assert_eq!(stale.corrected_token(), Some(Some("49590")));

        let accepted = SinkError::DataAlreadyAccepted { expected: None };
        assert_eq!(accepted.corrected_token(), Some(None));

        assert_eq!(SinkError::ResourceNotFound("g".to_string()).corrected_token(), None);
    }
}
