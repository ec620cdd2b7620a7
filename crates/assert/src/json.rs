use crate::Error;

use jsonschema::Validator;
use serde_json::Value;

/// What a JSON value is checked against.
#[derive(Clone, Debug, PartialEq)]
pub enum JsonExpectation {
    /// Exact structural equality.
    Instance(Value),

    /// Validation against a JSON Schema.
    Schema(Value),
}

/// Checks `actual` against `expected`.
///
/// # Errors
///
/// - [`Error::InstanceMismatch`] if an expected instance differs.
/// - [`Error::SchemaMismatch`] with every violation if the schema rejects
///   `actual`.
/// - [`Error::InvalidSchema`] if the schema does not compile.
pub fn assert_json(actual: &Value, expected: &JsonExpectation) -> Result<(), Error> {
    match expected {
        JsonExpectation::Instance(instance) => check_instance(actual, instance),
        JsonExpectation::Schema(schema) => check_schema(actual, &compile(schema)?),
    }
}

pub(crate) fn compile(schema: &Value) -> Result<Validator, Error> {
    Validator::new(schema).map_err(|e| Error::InvalidSchema(e.to_string()))
}

pub(crate) fn check_instance(actual: &Value, expected: &Value) -> Result<(), Error> {
    if actual == expected {
        return Ok(());
    }

    Err(Error::InstanceMismatch {
        expected: expected.clone(),
        actual: actual.clone(),
    })
}

pub(crate) fn check_schema(actual: &Value, validator: &Validator) -> Result<(), Error> {
    let diagnostics: Vec<String> = validator
        .iter_errors(actual)
        .map(|error| error.to_string())
        .collect();

    if diagnostics.is_empty() {
        return Ok(());
    }

    Err(Error::SchemaMismatch {
        diagnostics,
        actual: actual.clone(),
    })
}
