//! Identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a call id for requests that arrive without one.
#[must_use]
pub fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}
