//! Liveness probe.
//!
//! ```rust,no_run
//! use deepfake_relay::{Router, health};
//!
//! let app = Router::new().get("/health", health::liveness);
//! ```

use crate::{Request, Response};

/// Always returns `200 OK` with body `"OK"`. If the process can answer HTTP
/// at all it is alive; this handler does not probe the upstream.
pub async fn liveness(_req: Request) -> Response {
    Response::text("OK")
}
