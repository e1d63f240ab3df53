//! Middleware layer.
//!
//! Cross-cutting concerns applied by the server around every handler call.
//! Per-request tracing lives in the server's dispatch path; this module holds
//! the pieces that shape the response itself.

mod cors;

pub use cors::Cors;
