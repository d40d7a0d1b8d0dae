pub mod cloudwatch;
pub mod sequence;
pub mod token_cache;
pub mod traits;

pub use cloudwatch::CloudWatchLogsClient;
pub use sequence::{probe, DestinationStatus, Presence, SequenceError, SequenceWriter, WriteReport};
pub use token_cache::SequenceTokenCache;
pub use traits::{LogSink, PutReceipt, SinkError, StreamDescription, StreamPage};
