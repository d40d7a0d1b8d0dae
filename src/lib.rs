pub mod batch;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod sink;

#[cfg(test)]
mod test_support;
