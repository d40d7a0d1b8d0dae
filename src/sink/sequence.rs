use crate::pipeline::continuation::{drive, Continuation, ErrorAction, Step};
use crate::record::types::{DestinationKey, NormalizedLogEntry};
use crate::sink::token_cache::SequenceTokenCache;
use crate::sink::traits::{LogSink, SinkError, StreamPage};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("failed to describe streams for {destination}: {source}")]
    Probe {
        destination: DestinationKey,
        #[source]
        source: SinkError,
    },

    #[error("failed to create log group {group}: {source}")]
    CreateGroup {
        group: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to create log stream {destination}: {source}")]
    CreateStream {
        destination: DestinationKey,
        #[source]
        source: SinkError,
    },

    #[error("sequence token for {destination} rejected after correction: {source}")]
    TokenContention {
        destination: DestinationKey,
        #[source]
        source: SinkError,
    },

    #[error("failed to put events to {destination}: {source}")]
    Write {
        destination: DestinationKey,
        #[source]
        source: SinkError,
    },
}

/// Whether a log group or stream is known to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Unknown,
    Confirmed,
    Absent,
}

/// What a probe learned about a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationStatus {
    pub group: Presence,
    pub stream: Presence,
    pub upload_token: Option<String>,
}

impl DestinationStatus {
    fn unknown() -> Self {
        Self {
            group: Presence::Unknown,
            stream: Presence::Unknown,
            upload_token: None,
        }
    }
}

/// Counters for one call to [`SequenceWriter::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub events: usize,
    pub probes: usize,
    pub created_group: bool,
    pub created_stream: bool,
    pub token_corrections: usize,
    pub next_token: Option<String>,
}

enum Phase {
    Probe,
    BootstrapGroup,
    BootstrapStream,
    Write(Option<String>),
}

/// Drives one destination's write through probe, bootstrap and put.
///
/// A write starts from the cached token when there is one. Otherwise the
/// destination is probed, and the group and stream are created as needed:
///
/// ```text
///   cached token ──────────────────────────────┐
///                                              v
///   Probe ──(stream found)──────────────────> Write ──> done
///     │  └─(group found, no stream)─> BootstrapStream ─┘ ^
///     └──(group missing)──> BootstrapGroup ──┘  │        │
///                                               └─(already exists)─> Probe
/// ```
///
/// A stale token on Write is repaired once from the token the sink reports.
/// A write against a cached destination that has since disappeared drops the
/// cache entry and probes once.
///
/// Holds the cache mutably for the duration of a write, which keeps writes
/// to a destination sequential within a process.
pub struct SequenceWriter<'a, S: LogSink + ?Sized> {
    sink: &'a S,
    cache: &'a mut SequenceTokenCache,
}

impl<'a, S: LogSink + ?Sized> SequenceWriter<'a, S> {
    pub fn new(sink: &'a S, cache: &'a mut SequenceTokenCache) -> Self {
        Self { sink, cache }
    }

    /// Append `entries` to `destination` and cache the token for the next write.
    pub async fn write(
        &mut self,
        destination: &DestinationKey,
        entries: &[NormalizedLogEntry],
    ) -> Result<WriteReport, SequenceError> {
        let mut report = WriteReport {
            events: entries.len(),
            ..WriteReport::default()
        };

        let mut token_from_cache = false;
        let mut phase = match self.cache.lookup(destination) {
            Some(token) => {
                token_from_cache = true;
                Phase::Write(token.map(str::to_string))
            }
            None => Phase::Probe,
        };

        let mut corrected = false;
        let mut reprobed_after_race = false;
        let mut reprobed_after_missing = false;

        loop {
            phase = match phase {
                Phase::Probe => {
                    report.probes += 1;
                    let status = probe(self.sink, destination).await?;
                    match (status.group, status.stream) {
                        (_, Presence::Confirmed) => {
                            debug!(
                                destination = %destination,
                                token = ?status.upload_token,
                                "Log group/stream exists, obtained sequence token"
                            );
                            Phase::Write(status.upload_token)
                        }
                        (Presence::Confirmed, _) => Phase::BootstrapStream,
                        (Presence::Absent | Presence::Unknown, _) => Phase::BootstrapGroup,
                    }
                }

                Phase::BootstrapGroup => {
                    info!(log_group = %destination.log_group, "Log group does not exist, creating it");
                    match self.sink.create_group(&destination.log_group).await {
                        Ok(()) => report.created_group = true,
                        Err(SinkError::AlreadyExists(_)) => {
                            debug!(log_group = %destination.log_group, "Log group already existed");
                        }
                        Err(source) => {
                            return Err(SequenceError::CreateGroup {
                                group: destination.log_group.clone(),
                                source,
                            })
                        }
                    }
                    Phase::BootstrapStream
                }

                Phase::BootstrapStream => {
                    info!(
                        log_group = %destination.log_group,
                        log_stream = %destination.log_stream,
                        "Log stream does not exist, creating it"
                    );
                    match self
                        .sink
                        .create_stream(&destination.log_group, &destination.log_stream)
                        .await
                    {
                        Ok(()) => {
                            report.created_stream = true;
                            Phase::Write(None)
                        }
                        Err(SinkError::AlreadyExists(_)) if !reprobed_after_race => {
                            info!(
                                destination = %destination,
                                "Log stream already existed, retrieving sequence token"
                            );
                            reprobed_after_race = true;
                            Phase::Probe
                        }
                        Err(source) => {
                            return Err(SequenceError::CreateStream {
                                destination: destination.clone(),
                                source,
                            })
                        }
                    }
                }

                Phase::Write(token) => {
                    match self
                        .sink
                        .put_events(
                            &destination.log_group,
                            &destination.log_stream,
                            entries,
                            token.as_deref(),
                        )
                        .await
                    {
                        Ok(receipt) => {
                            info!(
                                destination = %destination,
                                events = entries.len(),
                                next_token = ?receipt.next_sequence_token,
                                "Put log events"
                            );
                            self.cache
                                .record(destination, receipt.next_sequence_token.clone());
                            report.next_token = receipt.next_sequence_token;
                            return Ok(report);
                        }
                        Err(error) => match error.corrected_token().map(|t| t.map(str::to_string)) {
                            Some(_) if corrected => {
                                return Err(SequenceError::TokenContention {
                                    destination: destination.clone(),
                                    source: error,
                                })
                            }
                            Some(expected) => {
                                warn!(
                                    destination = %destination,
                                    rejected = ?token,
                                    corrected = ?expected,
                                    "Sequence token invalid, retrying with corrected token"
                                );
                                corrected = true;
                                report.token_corrections += 1;
                                self.cache.record(destination, expected.clone());
                                Phase::Write(expected)
                            }
                            None => match error {
                                SinkError::ResourceNotFound(_)
                                    if token_from_cache && !reprobed_after_missing =>
                                {
                                    warn!(
                                        destination = %destination,
                                        "Cached destination no longer exists, probing again"
                                    );
                                    self.cache.invalidate(destination);
                                    token_from_cache = false;
                                    reprobed_after_missing = true;
                                    Phase::Probe
                                }
                                source => {
                                    return Err(SequenceError::Write {
                                        destination: destination.clone(),
                                        source,
                                    })
                                }
                            },
                        },
                    }
                }
            };
        }
    }
}

/// Page through stream descriptions until the destination's stream shows up.
pub async fn probe<S: LogSink + ?Sized>(
    sink: &S,
    destination: &DestinationKey,
) -> Result<DestinationStatus, SequenceError> {
    let mut pager = StreamProbe { sink, destination };
    drive(&mut pager, None)
        .await
        .map_err(|source| SequenceError::Probe {
            destination: destination.clone(),
            source,
        })
}

struct StreamProbe<'a, S: ?Sized> {
    sink: &'a S,
    destination: &'a DestinationKey,
}

#[async_trait]
impl<'a, S: LogSink + ?Sized> Continuation for StreamProbe<'a, S> {
    type Input = Option<String>;
    type Response = StreamPage;
    type Output = DestinationStatus;
    type Error = SinkError;

    async fn request(&mut self, page_token: Option<String>) -> Result<StreamPage, SinkError> {
        self.sink
            .describe_streams(
                &self.destination.log_group,
                &self.destination.log_stream,
                page_token.as_deref(),
            )
            .await
    }

    async fn on_response(
        &mut self,
        page: StreamPage,
    ) -> Result<Step<Option<String>, DestinationStatus>, SinkError> {
        let wanted = &self.destination.log_stream;
        if let Some(found) = page.streams.into_iter().find(|s| &s.name == wanted) {
            return Ok(Step::Stop(DestinationStatus {
                group: Presence::Confirmed,
                stream: Presence::Confirmed,
                upload_token: found.upload_sequence_token,
            }));
        }

        Ok(match page.next_page_token {
            Some(next) => Step::Continue(Some(next)),
            None => Step::Stop(DestinationStatus {
                group: Presence::Confirmed,
                stream: Presence::Absent,
                upload_token: None,
            }),
        })
    }

    fn on_error(&mut self, error: &SinkError) -> ErrorAction<DestinationStatus> {
        match error {
            SinkError::ResourceNotFound(_) => {
                debug!(log_group = %self.destination.log_group, "Log group does not exist");
                ErrorAction::Stop(DestinationStatus {
                    group: Presence::Absent,
                    stream: Presence::Absent,
                    ..DestinationStatus::unknown()
                })
            }
            _ => ErrorAction::Rethrow,
        }
    }
}
