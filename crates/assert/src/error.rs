use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// A field whose value differs from the expectation.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMismatch {
    /// Field name or JSON pointer.
    pub field: String,

    /// Expected value.
    pub expected: Value,

    /// Actual value, `None` if the field is missing.
    pub actual: Option<Value>,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "expected `{}` to be `{}` but got `{actual}`",
                self.field, self.expected
            ),
            None => write!(
                f,
                "expected `{}` to be `{}` but it is missing",
                self.field, self.expected
            ),
        }
    }
}

/// Assertion failures and usage errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Both an instance and a schema were given.
    #[error("Provide either an expected instance or an expected schema, not both")]
    ConflictingExpectations,

    /// The payload is not valid JSON.
    #[error("Payload is not valid JSON ({source}): {raw}")]
    Decode {
        /// The payload, lossily decoded as UTF-8.
        raw: String,

        /// The decode error.
        source: serde_json::Error,
    },

    /// One or more fields differ.
    #[error("Field mismatch: {}", join(.0, "; "))]
    FieldMismatch(Vec<FieldMismatch>),

    /// The decoded value differs from the expected instance.
    #[error("Expected JSON `{expected}` but got `{actual}`")]
    InstanceMismatch {
        /// Expected instance.
        expected: Value,

        /// Decoded value.
        actual: Value,
    },

    /// The expected schema does not compile.
    #[error("Invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// No message was given.
    #[error(
        "No message provided. If it came from consume_one() or consume_many() they likely timed out"
    )]
    MissingMessage,

    /// The message has no payload.
    #[error("Message on {topic} has no payload")]
    MissingPayload {
        /// Topic of the message.
        topic: String,
    },

    /// Neither instance, schema nor fields were given.
    #[error("Provide an expected instance, an expected schema or expected fields")]
    NoExpectation,

    /// The decoded value violates the expected schema.
    #[error(
        "JSON instance `{actual}` does not match the expected schema: {}",
        join(.diagnostics, "; ")
    )]
    SchemaMismatch {
        /// One message per violation.
        diagnostics: Vec<String>,

        /// Decoded value.
        actual: Value,
    },

    /// A message was present where none was expected.
    #[error("Expected no message but got one on {topic}: {}", .payload.as_deref().unwrap_or("<no payload>"))]
    UnexpectedMessage {
        /// Topic of the message.
        topic: String,

        /// The payload, lossily decoded as UTF-8.
        payload: Option<String>,
    },
}

impl Error {
    /// Whether the assertion was called incorrectly rather than failed.
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::ConflictingExpectations | Self::InvalidSchema(_) | Self::NoExpectation
        )
    }
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}
