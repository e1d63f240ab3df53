//! Inbound body validation.
//!
//! Required fields are checked before optional ones, so a body that is both
//! incomplete and mistyped reports the missing field.

use serde_json::{Map, Number, Value};
use tracing::warn;

pub const DOC_BASE64: &str = "doc_base64";
pub const REQ_ID: &str = "req_id";
pub const DOC_TYPE: &str = "doc_type";
pub const IS_IOS: &str = "isIOS";
pub const ORIENTATION: &str = "orientation";

/// A detection request that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRequest {
    /// Encoded media blob. Never logged.
    pub doc_base64: String,
    /// Caller-supplied correlation id.
    pub req_id: String,
    pub doc_type: String,
    pub is_ios: Option<bool>,
    /// Rotation hint, kept as the caller's JSON number.
    pub orientation: Option<Number>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("request body is not a JSON object: {0}")]
    MalformedBody(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid type for `{field}`: expected {expected}")]
    InvalidType { field: &'static str, expected: &'static str },
}

/// Parses and checks a raw request body.
///
/// `null` and absent are the same thing. An empty string is absent for the
/// required fields. With `strict` off, a mistyped optional field is dropped
/// instead of rejected.
pub fn validate(body: &[u8], strict: bool) -> Result<DetectionRequest, ValidationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(ValidationError::MalformedBody("expected an object".into()));
    };

    let doc_base64 = required(&mut fields, DOC_BASE64)?;
    let req_id = required(&mut fields, REQ_ID)?;
    let doc_type = required(&mut fields, DOC_TYPE)?;

    let is_ios = optional(&mut fields, IS_IOS, "boolean", strict, |v| v.as_bool())?;
    let orientation = optional(&mut fields, ORIENTATION, "number", strict, |v| match v {
        Value::Number(n) => Some(n),
        _ => None,
    })?;

    Ok(DetectionRequest { doc_base64, req_id, doc_type, is_ios, orientation })
}

fn required(fields: &mut Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) if s.is_empty() => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::InvalidType { field, expected: "string" }),
    }
}

fn optional<T>(
    fields: &mut Map<String, Value>,
    field: &'static str,
    expected: &'static str,
    strict: bool,
    extract: impl FnOnce(Value) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    let Some(value) = fields.remove(field).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    match extract(value) {
        Some(v) => Ok(Some(v)),
        None if strict => Err(ValidationError::InvalidType { field, expected }),
        None => {
            warn!(field, expected, "dropping mistyped optional field");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    fn full() -> Value {
        json!({
            "doc_base64": "AAAA",
            "req_id": "r-1",
            "doc_type": "video",
            "isIOS": true,
            "orientation": 90
        })
    }

    #[test]
    fn accepts_full_request() {
        let req = validate(&body(full()), true).unwrap();
        assert_eq!(req.doc_base64, "AAAA");
        assert_eq!(req.req_id, "r-1");
        assert_eq!(req.doc_type, "video");
        assert_eq!(req.is_ios, Some(true));
        assert_eq!(req.orientation, Some(Number::from(90)));
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        let req = validate(
            &body(json!({"doc_base64": "A", "req_id": "r", "doc_type": "v", "isIOS": null})),
            true,
        )
        .unwrap();
        assert_eq!(req.is_ios, None);
        assert_eq!(req.orientation, None);
    }

    #[test]
    fn each_required_field_is_checked() {
        for field in [DOC_BASE64, REQ_ID, DOC_TYPE] {
            for missing in [None, Some(Value::Null), Some(json!(""))] {
                let mut v = full();
                match missing {
                    None => { v.as_object_mut().unwrap().remove(field); }
                    Some(m) => { v[field] = m; }
                }
                assert_eq!(
                    validate(&body(v), true),
                    Err(ValidationError::MissingField(field)),
                );
            }
        }
    }

    #[test]
    fn non_string_required_field_is_invalid_type() {
        let mut v = full();
        v["req_id"] = json!(42);
        assert_eq!(
            validate(&body(v), true),
            Err(ValidationError::InvalidType { field: REQ_ID, expected: "string" }),
        );
    }

    #[test]
    fn mistyped_is_ios_is_rejected_when_strict() {
        let mut v = full();
        v["isIOS"] = json!("yes");
        assert_eq!(
            validate(&body(v), true),
            Err(ValidationError::InvalidType { field: IS_IOS, expected: "boolean" }),
        );
    }

    #[test]
    fn mistyped_orientation_is_rejected_when_strict() {
        let mut v = full();
        v["orientation"] = json!("landscape");
        assert_eq!(
            validate(&body(v), true),
            Err(ValidationError::InvalidType { field: ORIENTATION, expected: "number" }),
        );
    }

    #[test]
    fn mistyped_optionals_are_dropped_when_lenient() {
        let mut v = full();
        v["isIOS"] = json!("yes");
        v["orientation"] = json!([1]);
        let req = validate(&body(v), false).unwrap();
        assert_eq!(req.is_ios, None);
        assert_eq!(req.orientation, None);
    }

    #[test]
    fn missing_field_wins_over_bad_type() {
        let v = json!({"req_id": "r", "doc_type": "v", "isIOS": "yes"});
        assert_eq!(
            validate(&body(v), true),
            Err(ValidationError::MissingField(DOC_BASE64)),
        );
    }

    #[test]
    fn non_object_bodies_are_malformed() {
        for raw in [&b"not json"[..], b"[]", b"\"str\"", b""] {
            assert!(matches!(validate(raw, true), Err(ValidationError::MalformedBody(_))));
        }
    }
}
