//! # deepfake-relay
//!
//! A small HTTP relay that sits between a client app and a third-party
//! deepfake-detection API. The client never sees the API credential; the
//! relay validates the request, forwards it exactly once, and hands back
//! either the upstream's answer verbatim or a normalized error.
//!
//! ## The contract
//!
//! - `POST /deepfake-video-check`: `doc_base64`, `req_id`, `doc_type`
//!   required; `isIOS` (bool) and `orientation` (number) optional.
//! - `GET /health`: `200 OK`.
//!
//! | Failure | Status |
//! |---|---|
//! | missing / mistyped field | 400 |
//! | upstream answered non-2xx | upstream's own, body forwarded |
//! | upstream unreachable | 503 |
//! | upstream timed out | 504 |
//! | anything else | 500 |
//!
//! No retries, no caching, no state between requests.
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use deepfake_relay::{RelayConfig, Relay, Server, app, middleware::Cors};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = RelayConfig::from_env()?;
//! let relay = Arc::new(Relay::from_config(&config)?);
//!
//! Server::bind(config.bind_addr)
//!     .body_limit(config.max_body_bytes)
//!     .cors(Cors::new(config.cors_origin.clone()))
//!     .serve(app::router(relay))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The relay itself needs no listener; [`Relay::relay`] takes a body and
//! returns a [`RelayOutcome`], which is how the tests drive it.

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod app;
pub mod config;
pub mod health;
pub mod middleware;
pub mod relay;

pub use config::{ConfigError, RelayConfig, Secret};
pub use error::Error;
pub use handler::Handler;
pub use relay::{HttpRelay, Relay, RelayFailure, RelayOutcome};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
