//! The single outbound call to the detection API.

use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode};
use reqwest::Url;
use serde::Serialize;
use serde_json::Number;
use tracing::info;

use crate::config::RelayConfig;
use crate::relay::validate::DetectionRequest;

/// Status, content type and raw body of whatever the upstream answered.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Transport-level failure of the outbound call. Non-2xx answers are not
/// errors here; they come back as an [`UpstreamResponse`].
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("upstream unreachable ({code}): {detail}")]
    Unreachable { code: &'static str, detail: String },

    #[error("{0}")]
    Internal(String),
}

/// Wire body for the detection API. The credential is never part of it.
#[derive(Debug, Serialize)]
pub struct UpstreamPayload<'a> {
    pub doc_base64: &'a str,
    pub req_id: &'a str,
    pub doc_type: &'a str,
    #[serde(rename = "isIOS", skip_serializing_if = "Option::is_none")]
    pub is_ios: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<&'a Number>,
}

impl<'a> From<&'a DetectionRequest> for UpstreamPayload<'a> {
    fn from(req: &'a DetectionRequest) -> Self {
        Self {
            doc_base64: &req.doc_base64,
            req_id: &req.req_id,
            doc_type: &req.doc_type,
            is_ios: req.is_ios,
            orientation: req.orientation.as_ref(),
        }
    }
}

/// Something that can forward a validated request exactly once.
pub trait Upstream: Send + Sync + 'static {
    fn invoke(
        &self,
        request: &DetectionRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, InvokeError>> + Send;
}

/// reqwest-backed invoker. One client per process; the timeout is set on the
/// client so it covers connect, send and body read.
pub struct HttpUpstream {
    client: reqwest::Client,
    url: Url,
    token_header: HeaderName,
    token: HeaderValue,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(config: &RelayConfig) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| InvokeError::Internal(format!("failed to build HTTP client: {e}")))?;

        let mut token = HeaderValue::from_str(config.api_token.expose())
            .map_err(|_| InvokeError::Internal("credential is not a valid header value".into()))?;
        token.set_sensitive(true);

        Ok(Self {
            client,
            url: config.upstream_url.clone(),
            token_header: config.token_header.clone(),
            token,
            timeout: config.upstream_timeout,
        })
    }

    async fn send(&self, request: &DetectionRequest) -> Result<UpstreamResponse, InvokeError> {
        let body = serde_json::to_vec(&UpstreamPayload::from(request))
            .map_err(|e| InvokeError::Internal(format!("failed to serialize payload: {e}")))?;

        info!(
            req_id = %request.req_id,
            doc_type = %request.doc_type,
            payload_bytes = body.len(),
            target = %self.url,
            "forwarding detection request"
        );

        let response = self.client
            .post(self.url.clone())
            .header(self.token_header.clone(), self.token.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| classify(&e, self.timeout))?;

        let status = response.status();
        let content_type = response.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(|e| classify(&e, self.timeout))?;

        info!(req_id = %request.req_id, %status, response_bytes = body.len(), "upstream answered");
        Ok(UpstreamResponse { status, content_type, body })
    }
}

impl Upstream for HttpUpstream {
    fn invoke(
        &self,
        request: &DetectionRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, InvokeError>> + Send {
        self.send(request)
    }
}

/// Sorts a reqwest failure into timeout / unreachable / internal.
fn classify(err: &reqwest::Error, timeout: Duration) -> InvokeError {
    if err.is_timeout() {
        InvokeError::Timeout(timeout)
    } else if err.is_builder() || err.is_redirect() {
        InvokeError::Internal(err.to_string())
    } else {
        InvokeError::Unreachable { code: network_code(err), detail: err.to_string() }
    }
}

/// Short errno-style indicator for a network failure, found by walking the
/// error's source chain.
fn network_code(err: &(dyn StdError + 'static)) -> &'static str {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().starts_with("dns error") {
            return "ENOTFOUND";
        }
        if let Some(code) = e.downcast_ref::<io::Error>().and_then(|io| io_code(io.kind())) {
            return code;
        }
        current = e.source();
    }
    "ECONNFAILED"
}

fn io_code(kind: io::ErrorKind) -> Option<&'static str> {
    use io::ErrorKind::*;
    Some(match kind {
        ConnectionRefused => "ECONNREFUSED",
        ConnectionReset => "ECONNRESET",
        ConnectionAborted => "ECONNABORTED",
        NotConnected => "ENOTCONN",
        AddrNotAvailable => "EADDRNOTAVAIL",
        BrokenPipe => "EPIPE",
        TimedOut => "ETIMEDOUT",
        UnexpectedEof => "ECONNRESET",
        _ => return None,
    })
}
