//! Utility functions for identifier generation and timestamp handling.

mod ids;
mod timestamps;

pub use ids::{generate_call_id, generate_uuid};
pub use timestamps::iso_timestamp;
