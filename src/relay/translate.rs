//! Failure taxonomy and its mapping onto client-facing responses.
//!
//! | Kind | Status |
//! |---|---|
//! | `MissingField`, `InvalidType`, `MalformedBody` | 400 |
//! | `UpstreamRejected` | upstream's own |
//! | `UpstreamUnreachable` | 503 |
//! | `UpstreamTimeout` | 504 |
//! | `InternalError` | 500 |
//!
//! Nothing in here touches the network or logs; the mapping is a pure
//! function of the classified failure.

use http::StatusCode;
use serde::Serialize;

use crate::relay::upstream::{InvokeError, UpstreamResponse};
use crate::relay::validate::ValidationError;
use crate::response::{IntoResponse, Response};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// What the caller gets back for one request.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The upstream answered 2xx; forwarded verbatim.
    Succeeded(UpstreamResponse),
    Failed(RelayFailure),
}

/// Every way a relay attempt can fail.
#[derive(Debug)]
pub enum RelayFailure {
    MissingField { field: &'static str },
    InvalidType { field: &'static str, expected: &'static str },
    MalformedBody { reason: String },
    /// The upstream answered non-2xx; forwarded verbatim.
    UpstreamRejected(UpstreamResponse),
    /// `detail` names the target URL; it is logged, never sent to the caller.
    UpstreamUnreachable { code: &'static str, detail: String },
    UpstreamTimeout,
    /// Detail is for logs only; the caller sees a generic message.
    Internal { detail: String },
}

impl RelayFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "MissingField",
            Self::InvalidType { .. } => "InvalidType",
            Self::MalformedBody { .. } => "MalformedBody",
            Self::UpstreamRejected(_) => "UpstreamRejected",
            Self::UpstreamUnreachable { .. } => "UpstreamUnreachable",
            Self::UpstreamTimeout => "UpstreamTimeout",
            Self::Internal { .. } => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField { .. }
            | Self::InvalidType { .. }
            | Self::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            Self::UpstreamRejected(res) => res.status,
            Self::UpstreamUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for RelayFailure {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::MissingField(field) => Self::MissingField { field },
            ValidationError::InvalidType { field, expected } => Self::InvalidType { field, expected },
            ValidationError::MalformedBody(reason) => Self::MalformedBody { reason },
        }
    }
}

impl From<InvokeError> for RelayFailure {
    fn from(e: InvokeError) -> Self {
        match e {
            InvokeError::Timeout(_) => Self::UpstreamTimeout,
            InvokeError::Unreachable { code, detail } => Self::UpstreamUnreachable { code, detail },
            InvokeError::Internal(detail) => Self::Internal { detail },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl<'a> ErrorBody<'a> {
    fn new(error: &'a str, kind: &'static str) -> Self {
        Self { error, kind, field: None, expected: None, code: None, details: None }
    }
}

fn error(status: StatusCode, body: &ErrorBody<'_>) -> Response {
    Response::builder().status(status).json_value(body)
}

fn pass_through(res: UpstreamResponse) -> Response {
    let content_type = res.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
    Response::builder().status(res.status).bytes(content_type, res.body)
}

impl IntoResponse for RelayFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        match self {
            Self::UpstreamRejected(res) => pass_through(res),
            Self::MissingField { field } => {
                let msg = format!("Missing required parameter: {field}");
                error(status, &ErrorBody { field: Some(field), ..ErrorBody::new(&msg, kind) })
            }
            Self::InvalidType { field, expected } => {
                let msg = format!("Invalid type for {field}. Must be {expected}.");
                error(status, &ErrorBody {
                    field: Some(field),
                    expected: Some(expected),
                    ..ErrorBody::new(&msg, kind)
                })
            }
            Self::MalformedBody { reason } => error(status, &ErrorBody {
                details: Some(&reason),
                ..ErrorBody::new("Request body must be a JSON object.", kind)
            }),
            Self::UpstreamUnreachable { code, .. } => error(status, &ErrorBody {
                code: Some(code),
                ..ErrorBody::new("Service Unavailable: detection API could not be reached.", kind)
            }),
            Self::UpstreamTimeout => error(status, &ErrorBody::new(
                "Gateway Timeout: detection API did not respond in time.",
                kind,
            )),
            Self::Internal { .. } => error(status, &ErrorBody::new(
                "Internal Server Error: an unexpected error occurred.",
                kind,
            )),
        }
    }
}

impl IntoResponse for RelayOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Succeeded(res) => pass_through(res),
            Self::Failed(failure) => failure.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::{Value, json};

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    fn upstream(status: u16, content_type: Option<&str>, body: &'static str) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            content_type: content_type.map(str::to_owned),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn success_passes_through_verbatim() {
        let res = RelayOutcome::Succeeded(upstream(200, Some("application/json"), r#"{"result":"real"}"#))
            .into_response();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), br#"{"result":"real"}"#);
    }

    #[test]
    fn rejection_keeps_upstream_status_body_and_type() {
        let res = RelayFailure::UpstreamRejected(upstream(422, Some("text/plain"), "nope")).into_response();
        assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.body(), b"nope");
    }

    #[test]
    fn missing_content_type_defaults_to_json() {
        let res = RelayOutcome::Succeeded(upstream(200, None, "{}")).into_response();
        assert_eq!(res.header("content-type"), Some(DEFAULT_CONTENT_TYPE));
    }

    #[test]
    fn missing_field_names_the_field() {
        let res = RelayFailure::MissingField { field: "req_id" }.into_response();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        let body = body_json(&res);
        assert_eq!(body["kind"], "MissingField");
        assert_eq!(body["field"], "req_id");
    }

    #[test]
    fn invalid_type_says_what_was_expected() {
        let res = RelayFailure::InvalidType { field: "isIOS", expected: "boolean" }.into_response();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&res),
            json!({
                "error": "Invalid type for isIOS. Must be boolean.",
                "kind": "InvalidType",
                "field": "isIOS",
                "expected": "boolean"
            })
        );
    }

    #[test]
    fn unreachable_carries_network_code() {
        let res = RelayFailure::UpstreamUnreachable {
            code: "ECONNREFUSED",
            detail: "error sending request for url (http://detector.internal/api/v1/video)".into(),
        }
        .into_response();
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(&res);
        assert_eq!(body["kind"], "UpstreamUnreachable");
        assert_eq!(body["code"], "ECONNREFUSED");
        assert!(body.get("details").is_none());
        assert!(!String::from_utf8_lossy(res.body()).contains("detector.internal"));
    }

    #[test]
    fn timeout_is_504() {
        let res = RelayFailure::from(InvokeError::Timeout(std::time::Duration::from_secs(1))).into_response();
        assert_eq!(res.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(&res)["kind"], "UpstreamTimeout");
    }

    #[test]
    fn internal_detail_stays_out_of_the_body() {
        let res = RelayFailure::Internal { detail: "client build blew up".into() }.into_response();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(&res);
        assert_eq!(body["kind"], "InternalError");
        assert!(body.get("details").is_none());
    }
}
