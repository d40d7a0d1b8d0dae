pub mod assembler;
pub mod chunk;

pub use assembler::{Assembly, AssemblyStats, BatchAssembler, DestinationCounts};
pub use chunk::{split_for_put, PutLimits};
