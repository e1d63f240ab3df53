//! Incoming HTTP request type.

use bytes::Bytes;

/// An incoming HTTP request with its body fully buffered.
///
/// The server enforces the configured body ceiling before a `Request` is
/// ever built, so handlers can treat `body()` as bounded.
pub struct Request {
    pub(crate) body: Bytes,
}

impl Request {
    pub(crate) fn new(body: Bytes) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &[u8] { &self.body }
}
