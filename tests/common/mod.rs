#![allow(dead_code)]

use std::time::Duration;

use deepfake_relay::{HttpRelay, RelayConfig};
use serde_json::{Value, json};

pub const TOKEN: &str = "test-token";
pub const DETECT_PATH: &str = "/api/v1/deepfake-detection/video";

pub fn config_with(upstream: &str, extra: &[(&str, &str)]) -> RelayConfig {
    let url = format!("{upstream}{DETECT_PATH}");
    let mut pairs: Vec<(String, String)> = vec![
        ("DETECTION_API_URL".into(), url),
        ("DETECTION_API_TOKEN".into(), TOKEN.into()),
    ];
    pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    RelayConfig::from_lookup(|key: &str| {
        pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .expect("test config")
}

pub fn config(upstream: &str) -> RelayConfig {
    config_with(upstream, &[])
}

pub fn relay(config: &RelayConfig) -> HttpRelay {
    HttpRelay::from_config(config).expect("relay")
}

pub fn relay_with_timeout(upstream: &str, timeout: Duration) -> HttpRelay {
    let mut cfg = config(upstream);
    cfg.upstream_timeout = timeout;
    relay(&cfg)
}

pub fn valid_request() -> Value {
    json!({
        "doc_base64": "AAAAIGZ0eXBpc29t",
        "req_id": "req-123",
        "doc_type": "video",
        "isIOS": false,
        "orientation": 0
    })
}

pub fn bytes(v: &Value) -> Vec<u8> {
    serde_json::to_vec(v).expect("serialize")
}
