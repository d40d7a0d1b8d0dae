pub mod continuation;
pub mod relay;

pub use continuation::{drive, Continuation, ErrorAction, Step};
pub use relay::{relay_once, Relay};
