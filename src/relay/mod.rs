//! The detection relay: validate, forward once, translate.
//!
//! ```text
//! Received → Validating → Rejected ─────────────────────┐
//!                       └→ Forwarding → Succeeded ──────┤→ Responded
//!                                     └→ Failed(kind) ──┘
//! ```
//!
//! A [`Relay`] owns no mutable state. One value is shared by every request
//! through an `Arc`; each call runs its own pipeline and may finish in any
//! order relative to the others.

mod translate;
mod upstream;
mod validate;

use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::request::Request;

pub use translate::{RelayFailure, RelayOutcome};
pub use upstream::{HttpUpstream, InvokeError, Upstream, UpstreamPayload, UpstreamResponse};
pub use validate::{DetectionRequest, ValidationError, validate};

/// Validator + invoker, wired together.
pub struct Relay<U> {
    upstream: U,
    strict_optional_types: bool,
}

/// The relay as deployed: forwarding over HTTP.
pub type HttpRelay = Relay<HttpUpstream>;

impl Relay<HttpUpstream> {
    /// Production relay talking to the configured endpoint over HTTP.
    pub fn from_config(config: &RelayConfig) -> Result<Self, InvokeError> {
        Ok(Self::new(HttpUpstream::new(config)?, config.strict_optional_types))
    }
}

impl<U: Upstream> Relay<U> {
    pub fn new(upstream: U, strict_optional_types: bool) -> Self {
        Self { upstream, strict_optional_types }
    }

    /// Runs one body through the pipeline. Never panics, never retries;
    /// every path yields an outcome the caller can be answered with.
    pub async fn relay(&self, body: &[u8]) -> RelayOutcome {
        debug!(stage = "received", body_bytes = body.len());
        debug!(stage = "validating");

        let request = match validate(body, self.strict_optional_types) {
            Ok(request) => request,
            Err(e) => {
                warn!(stage = "rejected", error = %e, "rejected detection request");
                return RelayOutcome::Failed(e.into());
            }
        };

        debug!(stage = "forwarding", req_id = %request.req_id);

        match self.upstream.invoke(&request).await {
            Ok(res) if res.status.is_success() => {
                info!(stage = "succeeded", req_id = %request.req_id, status = %res.status);
                RelayOutcome::Succeeded(res)
            }
            Ok(res) => {
                warn!(
                    stage = "failed",
                    req_id = %request.req_id,
                    kind = "UpstreamRejected",
                    status = %res.status,
                    "upstream rejected detection request"
                );
                RelayOutcome::Failed(RelayFailure::UpstreamRejected(res))
            }
            Err(e) => {
                error!(
                    stage = "failed",
                    req_id = %request.req_id,
                    error = %e,
                    "upstream call failed"
                );
                RelayOutcome::Failed(e.into())
            }
        }
    }

    /// Route handler body: relays the request's bytes.
    pub async fn handle(&self, req: Request) -> RelayOutcome {
        self.relay(req.body()).await
    }
}
