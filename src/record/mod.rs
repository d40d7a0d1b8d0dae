pub mod format;
pub mod types;

pub use format::{message_of, parse_timestamp_millis, EntryFormatter, FormatError};
pub use types::{DestinationKey, MonitoredResource, NormalizedLogEntry, RawLogRecord};
