//! Cross-origin headers for browser and web-view callers.

use http::StatusCode;

use crate::response::Response;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "content-type";
const MAX_AGE_SECS: &str = "86400";

/// Permissive CORS policy with a single configurable origin.
#[derive(Clone, Debug)]
pub struct Cors {
    allow_origin: String,
}

impl Cors {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self { allow_origin: allow_origin.into() }
    }

    /// Allow any origin (`*`).
    pub fn permissive() -> Self {
        Self::new("*")
    }

    /// Stamps the allow-origin header onto an outgoing response, replacing
    /// any value a handler or upstream may have set.
    pub fn apply(&self, res: &mut Response) {
        res.set_header("access-control-allow-origin", &self.allow_origin);
    }

    /// Answers an `OPTIONS` preflight.
    pub fn preflight(&self) -> Response {
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("access-control-allow-origin", &self.allow_origin)
            .header("access-control-allow-methods", ALLOW_METHODS)
            .header("access-control-allow-headers", ALLOW_HEADERS)
            .header("access-control-max-age", MAX_AGE_SECS)
            .no_body()
    }
}

impl Default for Cors {
    fn default() -> Self { Self::permissive() }
}
