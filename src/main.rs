use std::sync::Arc;

use anyhow::Context;
use deepfake_relay::middleware::Cors;
use deepfake_relay::{Relay, RelayConfig, Server, app};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RelayConfig::from_env().context("failed to load configuration")?;
    info!(
        upstream = %config.upstream_url,
        timeout_secs = config.upstream_timeout.as_secs(),
        max_body_bytes = config.max_body_bytes,
        strict_optional_types = config.strict_optional_types,
        "configuration loaded"
    );

    let relay = Arc::new(Relay::from_config(&config).context("failed to build upstream client")?);

    Server::bind(config.bind_addr)
        .body_limit(config.max_body_bytes)
        .cors(Cors::new(config.cors_origin.clone()))
        .serve(app::router(relay))
        .await
        .context("server error")
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
