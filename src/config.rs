//! Environment-driven configuration.
//!
//! Nothing secret has a default. The upstream endpoint and its credential
//! must be supplied by the environment (or a `.env` file in development);
//! everything else falls back to the values below.

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use http::HeaderName;
use reqwest::Url;

const DEFAULT_TOKEN_HEADER: &str = "token";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGIN: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// A credential that never prints.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Everything the relay and its server need at runtime.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Fixed detection endpoint every request is forwarded to.
    pub upstream_url: Url,
    pub api_token: Secret,
    /// Header that carries `api_token` on the outbound call.
    pub token_header: HeaderName,
    /// Upper bound on one outbound call, connect through last body byte.
    pub upstream_timeout: Duration,
    /// Inbound body ceiling; larger bodies get `413`.
    pub max_body_bytes: usize,
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
    /// Reject mistyped `isIOS` / `orientation` instead of dropping them.
    pub strict_optional_types: bool,
}

impl RelayConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_url = get("DETECTION_API_URL").ok_or(ConfigError::Missing("DETECTION_API_URL"))?;
        let upstream_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
            var: "DETECTION_API_URL",
            reason: e.to_string(),
        })?;
        if !matches!(upstream_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: "DETECTION_API_URL",
                reason: format!("unsupported scheme `{}`", upstream_url.scheme()),
            });
        }

        let api_token = get("DETECTION_API_TOKEN")
            .map(Secret::new)
            .ok_or(ConfigError::Missing("DETECTION_API_TOKEN"))?;

        let token_header = get("DETECTION_API_TOKEN_HEADER")
            .unwrap_or_else(|| DEFAULT_TOKEN_HEADER.to_owned());
        let token_header = HeaderName::from_bytes(token_header.trim().as_bytes())
            .map_err(|e| ConfigError::Invalid {
                var: "DETECTION_API_TOKEN_HEADER",
                reason: e.to_string(),
            })?;

        let timeout_secs: u64 = parse_or(&get, "UPSTREAM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "UPSTREAM_TIMEOUT_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let max_body_bytes = parse_or(&get, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port: u16 = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let ip: IpAddr = host.trim().parse().map_err(|_| ConfigError::Invalid {
            var: "HOST",
            reason: format!("`{host}` is not an IP address"),
        })?;
        let bind_addr = SocketAddr::new(ip, port);

        let cors_origin = get("CORS_ALLOW_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_owned());
        let strict_optional_types = parse_or(&get, "STRICT_OPTIONAL_TYPES", true)?;

        Ok(Self {
            upstream_url,
            api_token,
            token_header,
            upstream_timeout: Duration::from_secs(timeout_secs),
            max_body_bytes,
            bind_addr,
            cors_origin,
            strict_optional_types,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DETECTION_API_URL", "https://detector.example/api/v1/video"),
        ("DETECTION_API_TOKEN", "s3cr3t"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = RelayConfig::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(cfg.token_header.as_str(), "token");
        assert_eq!(cfg.upstream_timeout, Duration::from_secs(120));
        assert_eq!(cfg.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.cors_origin, "*");
        assert!(cfg.strict_optional_types);
    }

    #[test]
    fn missing_token_fails_fast() {
        let err = RelayConfig::from_lookup(lookup(&[BASE[0]])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DETECTION_API_TOKEN")));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let err = RelayConfig::from_lookup(lookup(&[BASE[0], ("DETECTION_API_TOKEN", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DETECTION_API_TOKEN")));
    }

    #[test]
    fn missing_url_fails_fast() {
        let err = RelayConfig::from_lookup(lookup(&[BASE[1]])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DETECTION_API_URL")));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = RelayConfig::from_lookup(lookup(&[
            ("DETECTION_API_URL", "ftp://detector.example"),
            BASE[1],
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DETECTION_API_URL", .. }));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut pairs = BASE.to_vec();
        pairs.push(("UPSTREAM_TIMEOUT_SECS", "0"));
        let err = RelayConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "UPSTREAM_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("DETECTION_API_TOKEN_HEADER", "x-api-key"),
            ("UPSTREAM_TIMEOUT_SECS", "50"),
            ("MAX_BODY_BYTES", "4718592"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("STRICT_OPTIONAL_TYPES", "false"),
        ]);
        let cfg = RelayConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.token_header.as_str(), "x-api-key");
        assert_eq!(cfg.upstream_timeout, Duration::from_secs(50));
        assert_eq!(cfg.max_body_bytes, 4_718_592);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert!(!cfg.strict_optional_types);
    }

    #[test]
    fn ipv6_host_is_accepted() {
        let mut pairs = BASE.to_vec();
        pairs.extend([("HOST", "::"), ("PORT", "8080")]);
        let cfg = RelayConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.bind_addr, "[::]:8080".parse().unwrap());
    }

    #[test]
    fn hostname_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("HOST", "localhost"));
        let err = RelayConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "HOST", .. }));
    }

    #[test]
    fn debug_output_hides_token() {
        let cfg = RelayConfig::from_lookup(lookup(BASE)).unwrap();
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("s3cr3t"));
        assert!(printed.contains("***"));
    }
}
