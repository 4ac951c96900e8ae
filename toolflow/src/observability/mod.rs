//! Observability utilities.

mod tracing;
mod wide_events;

pub use self::tracing::{init_tracing, SpanTimer};
pub use wide_events::WideEventEmitter;
