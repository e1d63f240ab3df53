//! Route table for the relay service.

use std::sync::Arc;

use tracing::debug;

use crate::health;
use crate::relay::{Relay, Upstream};
use crate::request::Request;
use crate::response::IntoResponse;
use crate::router::Router;

pub const RELAY_PATH: &str = "/deepfake-video-check";
pub const HEALTH_PATH: &str = "/health";

/// `POST /deepfake-video-check` and `GET /health`.
pub fn router<U: Upstream>(relay: Arc<Relay<U>>) -> Router {
    Router::new()
        .post(RELAY_PATH, move |req: Request| {
            let relay = Arc::clone(&relay);
            async move {
                let res = relay.handle(req).await.into_response();
                debug!(stage = "responded", status = %res.status_code());
                res
            }
        })
        .get(HEALTH_PATH, health::liveness)
}
