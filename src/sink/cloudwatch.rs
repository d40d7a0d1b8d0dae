use crate::config::types::SinkConfig;
use crate::record::types::NormalizedLogEntry;
use crate::sink::traits::{LogSink, PutReceipt, Result, SinkError, StreamDescription, StreamPage};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE_JSON_1_1: &str = "application/x-amz-json-1.1";

/// HTTP client for the CloudWatch Logs JSON API.
///
/// Requests are not signed here; whatever credentials the endpoint needs are
/// supplied through `sink.headers`.
#[derive(Debug)]
pub struct CloudWatchLogsClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStream>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    log_stream_name: String,
    upload_sequence_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [NormalizedLogEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
    #[serde(rename = "expectedSequenceToken")]
    expected_sequence_token: Option<String>,
}

impl CloudWatchLogsClient {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON_1_1));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| SinkError::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| SinkError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(operation, status = status.as_u16(), body = %text, "Sink request failed");
            return Err(map_error(status.as_u16(), &text));
        }

        // Operations without output may answer with an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }
}

/// Translate an error response into the sink error taxonomy.
pub fn map_error(status: u16, body: &str) -> SinkError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed
        .error_type
        .rsplit('#')
        .next()
        .unwrap_or_default()
        .to_string();

    // A token rejection without a readable correction is not recoverable
    let correction = expected_token(&parsed);
    match code.as_str() {
        "ResourceNotFoundException" => SinkError::ResourceNotFound(parsed.message),
        "ResourceAlreadyExistsException" => SinkError::AlreadyExists(parsed.message),
        "InvalidSequenceTokenException" if correction.is_some() => SinkError::InvalidSequenceToken {
            expected: correction.flatten(),
        },
        "DataAlreadyAcceptedException" if correction.is_some() => SinkError::DataAlreadyAccepted {
            expected: correction.flatten(),
        },
        _ => SinkError::Service {
            status,
            code,
            message: if parsed.message.is_empty() {
                body.to_string()
            } else {
                parsed.message
            },
        },
    }
}

/// The structured field when present, else the last word of the message.
///
/// `Some(None)` only for a literal `null`; `None` when there is nothing to read.
fn expected_token(body: &ErrorBody) -> Option<Option<String>> {
    let raw = match &body.expected_sequence_token {
        Some(token) => token.as_str(),
        None => body.message.split_whitespace().last()?,
    };
    Some(match raw {
        "null" => None,
        token => Some(token.to_string()),
    })
}

#[async_trait]
impl LogSink for CloudWatchLogsClient {
    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<StreamPage> {
        let request = DescribeLogStreamsRequest {
            log_group_name: group,
            log_stream_name_prefix: prefix,
            next_token: page_token,
        };
        let response: DescribeLogStreamsResponse =
            self.call("DescribeLogStreams", &request).await?;

        Ok(StreamPage {
            streams: response
                .log_streams
                .into_iter()
                .map(|s| StreamDescription {
                    name: s.log_stream_name,
                    upload_sequence_token: s.upload_sequence_token,
                })
                .collect(),
            next_page_token: response.next_token,
        })
    }

    async fn create_group(&self, group: &str) -> Result<()> {
        let _: Value = self
            .call("CreateLogGroup", &CreateLogGroupRequest { log_group_name: group })
            .await?;
        Ok(())
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<()> {
        let request = CreateLogStreamRequest {
            log_group_name: group,
            log_stream_name: stream,
        };
        let _: Value = self.call("CreateLogStream", &request).await?;
        Ok(())
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        entries: &[NormalizedLogEntry],
        token: Option<&str>,
    ) -> Result<PutReceipt> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: entries,
            sequence_token: token,
        };
        let response: PutLogEventsResponse = self.call("PutLogEvents", &request).await?;

        if let Some(rejected) = response.rejected_log_events_info {
            tracing::warn!(
                log_group = group,
                log_stream = stream,
                rejected = %rejected,
                "Sink rejected some log events"
            );
        }

        Ok(PutReceipt {
            next_sequence_token: response.next_sequence_token,
        })
    }
}
