use crate::json::{check_instance, check_schema, compile};
use crate::{Error, FieldMismatch};

use serde_json::Value;
use tessera_bus::Message;
use tracing::debug;

/// What a message payload is expected to contain.
///
/// At most one of instance and schema may be set. Fields are checked after
/// either, or on their own.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageExpectation {
    fields: Vec<(String, Value)>,
    instance: Option<Value>,
    schema: Option<Value>,
}

impl MessageExpectation {
    /// An expectation with nothing expected yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the payload to equal `instance`.
    #[must_use]
    pub fn instance(mut self, instance: Value) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Expects the payload to validate against `schema`.
    #[must_use]
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Expects `name` to hold `value`.
    ///
    /// Names starting with `/` are JSON pointers, anything else is a
    /// top-level key.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }
}

/// Decodes the payload of `message` and checks it against `expected`.
///
/// Returns the decoded value.
///
/// # Errors
///
/// - [`Error::MissingMessage`] if `message` is `None`.
/// - [`Error::ConflictingExpectations`], [`Error::NoExpectation`] or
///   [`Error::InvalidSchema`] if `expected` is unusable.
/// - [`Error::MissingPayload`] or [`Error::Decode`] if there is no JSON to check.
/// - [`Error::InstanceMismatch`], [`Error::SchemaMismatch`] or
///   [`Error::FieldMismatch`] if the payload does not meet `expected`.
pub fn assert_message(
    message: Option<&Message>,
    expected: &MessageExpectation,
) -> Result<Value, Error> {
    let message = message.ok_or(Error::MissingMessage)?;

    let validator = match (&expected.instance, &expected.schema) {
        (Some(_), Some(_)) => return Err(Error::ConflictingExpectations),
        (None, None) if expected.fields.is_empty() => return Err(Error::NoExpectation),
        (_, Some(schema)) => Some(compile(schema)?),
        _ => None,
    };

    let payload = message.value().ok_or_else(|| Error::MissingPayload {
        topic: message.topic().to_string(),
    })?;
    let actual: Value = serde_json::from_slice(payload).map_err(|source| Error::Decode {
        raw: String::from_utf8_lossy(payload).into_owned(),
        source,
    })?;

    if let Some(instance) = &expected.instance {
        check_instance(&actual, instance)?;
    }
    if let Some(validator) = &validator {
        check_schema(&actual, validator)?;
    }

    let mismatches: Vec<FieldMismatch> = expected
        .fields
        .iter()
        .filter_map(|(name, value)| {
            let found = lookup(&actual, name);
            (found != Some(value)).then(|| FieldMismatch {
                field: name.clone(),
                expected: value.clone(),
                actual: found.cloned(),
            })
        })
        .collect();
    if !mismatches.is_empty() {
        return Err(Error::FieldMismatch(mismatches));
    }

    debug!(
        "Message {}/{}@{} matches",
        message.topic(),
        message.partition(),
        message.offset()
    );
    Ok(actual)
}

/// Succeeds only if there is no message.
///
/// # Errors
///
/// Returns [`Error::UnexpectedMessage`] if `message` is present.
pub fn assert_absent(message: Option<&Message>) -> Result<(), Error> {
    match message {
        None => Ok(()),
        Some(message) => Err(Error::UnexpectedMessage {
            topic: message.topic().to_string(),
            payload: message
                .value()
                .map(|value| String::from_utf8_lossy(value).into_owned()),
        }),
    }
}

fn lookup<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    if name.starts_with('/') {
        value.pointer(name)
    } else {
        value.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use serde_json::json;

    fn message(payload: &str) -> Message {
        Message::new("orders", 0, 4, Some(Bytes::from(payload.to_string())))
    }

    #[test]
    fn test_instance_round_trip() {
        let value = json!({ "id": 1, "items": ["a", "b"] });
        let message = message(&value.to_string());

        let decoded =
            assert_message(Some(&message), &MessageExpectation::new().instance(value.clone()))
                .unwrap();

        assert_eq!(decoded, value);
    }

    #[test]
    fn test_missing_message() {
        let error = assert_message(None, &MessageExpectation::new().instance(json!({}))).unwrap_err();

        assert_matches!(error, Error::MissingMessage);
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn test_usage_errors() {
        let message = message("{}");

        let both = MessageExpectation::new()
            .instance(json!({}))
            .schema(json!({ "type": "object" }));
        assert_matches!(
            assert_message(Some(&message), &both),
            Err(ref e @ Error::ConflictingExpectations) if e.is_usage()
        );

        assert_matches!(
            assert_message(Some(&message), &MessageExpectation::new()),
            Err(ref e @ Error::NoExpectation) if e.is_usage()
        );
    }

    #[test]
    fn test_fields_alone_are_enough() {
        let message = message(r#"{"status": "shipped", "total": 12}"#);

        let decoded = assert_message(
            Some(&message),
            &MessageExpectation::new().field("status", json!("shipped")),
        )
        .unwrap();

        assert_eq!(decoded["total"], 12);
    }

    #[test]
    fn test_every_field_mismatch_is_reported() {
        let message = message(r#"{"status": "pending", "customer": {"id": 9}}"#);
        let expected = MessageExpectation::new()
            .schema(json!({ "type": "object" }))
            .field("status", json!("shipped"))
            .field("/customer/id", json!(9))
            .field("total", json!(12));

        let result = assert_message(Some(&message), &expected);

        assert_matches!(result, Err(Error::FieldMismatch(mismatches)) => {
            assert_eq!(mismatches.len(), 2);
            assert_eq!(mismatches[0].field, "status");
            assert_eq!(mismatches[0].actual, Some(json!("pending")));
            assert_eq!(mismatches[1].field, "total");
            assert_eq!(mismatches[1].actual, None);
        });
    }

    #[test]
    fn test_instance_checked_before_fields() {
        let message = message(r#"{"status": "pending"}"#);
        let expected = MessageExpectation::new()
            .instance(json!({ "status": "shipped" }))
            .field("status", json!("shipped"));

        assert_matches!(
            assert_message(Some(&message), &expected),
            Err(Error::InstanceMismatch { .. })
        );
    }

    #[test]
    fn test_decode_error_keeps_payload() {
        let message = message("not json");

        let result = assert_message(
            Some(&message),
            &MessageExpectation::new().field("status", json!("shipped")),
        );

        assert_matches!(result, Err(Error::Decode { raw, .. }) => {
            assert_eq!(raw, "not json");
        });
    }

    #[test]
    fn test_missing_payload() {
        let message = Message::new("orders", 0, 0, None);

        assert_matches!(
            assert_message(Some(&message), &MessageExpectation::new().instance(json!(null))),
            Err(Error::MissingPayload { topic }) if topic == "orders"
        );
    }

    #[test]
    fn test_assert_absent() {
        assert_absent(None).unwrap();

        let result = assert_absent(Some(&message(r#"{"late": true}"#)));

        assert_matches!(result, Err(Error::UnexpectedMessage { topic, payload }) => {
            assert_eq!(topic, "orders");
            assert_eq!(payload.as_deref(), Some(r#"{"late": true}"#));
        });
    }
}
