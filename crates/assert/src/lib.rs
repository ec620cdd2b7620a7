//! Assertions on JSON message payloads.
//!
//! Payloads are decoded as JSON and compared against an exact instance or
//! validated against a JSON Schema, optionally followed by per-field checks.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

/// Instance and schema checks on decoded JSON.
pub mod json;

/// Assertions on polled messages.
pub mod message;

pub use error::{Error, FieldMismatch};
pub use json::{assert_json, JsonExpectation};
pub use message::{assert_absent, assert_message, MessageExpectation};
