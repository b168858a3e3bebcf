//! Cooperative cancellation for pipeline executions.

mod token;

pub use token::{CancelCallback, CancellationToken};
