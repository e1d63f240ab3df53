//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, then returns from [`Server::serve`]. A relay call that
//! is mid-flight at shutdown is therefore bounded by the upstream timeout,
//! so the orchestrator's grace period should exceed it.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::error::Error;
use crate::middleware::Cors;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    body_limit: usize,
    cors: Option<Cors>,
}

/// Everything a connection task needs, shared read-only.
struct Shared {
    router: Router,
    body_limit: usize,
    cors: Option<Cors>,
}

impl Server {
    /// Binds to `addr` when [`serve`](Server::serve) is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self::with(Bind::Addr(addr))
    }

    /// Serves on an already-bound listener (e.g. port 0 in tests).
    pub fn from_listener(listener: TcpListener) -> Self {
        Self::with(Bind::Listener(listener))
    }

    fn with(bind: Bind) -> Self {
        Self { bind, body_limit: DEFAULT_BODY_LIMIT, cors: None }
    }

    /// Inbound body ceiling. Larger bodies are answered with `413`.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn cors(mut self, cors: Cors) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Serves until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains in-flight connections.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            router,
            body_limit: self.body_limit,
            cors: self.cors,
        });

        info!(addr = %local_addr, body_limit = shared.body_limit, "relay listening");

        let mut tasks = tokio::task::JoinSet::new();
        let (drain_tx, drain_rx) = watch::channel(false);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting even if
                // more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let shared = Arc::clone(&shared);
                    let io = TokioIo::new(stream);

                    let mut drain = drain_rx.clone();

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let shared = Arc::clone(&shared);
                            async move { dispatch(shared, req, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        // Idle keep-alive connections would otherwise hold
                        // the drain open until the client hangs up.
                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = drain.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = result {
                            warn!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        let _ = drain_tx.send(true);
        while tasks.join_next().await.is_some() {}

        info!("relay stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure is turned
/// into a response here, so hyper never sees an error.
async fn dispatch(
    shared: Arc<Shared>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let span = info_span!("request", %method, %path, peer = %remote_addr);

    async move {
        let mut response = route(&shared, req, method, path).await;
        if let Some(cors) = &shared.cors {
            cors.apply(&mut response);
        }
        info!(
            status = response.status_code().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        Ok(response.into_inner())
    }
    .instrument(span)
    .await
}

async fn route(
    shared: &Shared,
    req: hyper::Request<Incoming>,
    method: Method,
    path: String,
) -> Response {
    if method == Method::OPTIONS {
        if let Some(cors) = &shared.cors {
            return cors.preflight();
        }
    }

    let Some(handler) = shared.router.lookup(&method, &path) else {
        return plain_error(StatusCode::NOT_FOUND, "Not Found");
    };

    let body = match Limited::new(req.into_body(), shared.body_limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(limit = shared.body_limit, "request body too large");
            return plain_error(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return plain_error(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let request = Request::new(body);

    // Run the handler on its own task so a panic still yields a 500. The
    // guard aborts it if the client goes away first.
    let mut task = AbortOnDrop(tokio::spawn(handler.call(request)));
    match (&mut task.0).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "handler task failed");
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn plain_error(status: StatusCode, message: &str) -> Response {
    Response::builder().status(status).json_value(&json!({ "error": message }))
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM (Unix) or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
