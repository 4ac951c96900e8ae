//! Cooperative cancellation shared between the scheduler and tools.

mod token;

pub use token::{CallbackId, CancelCallback, CancellationToken, LinkedToken};
