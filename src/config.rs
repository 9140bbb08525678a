//! Configuration for the rpc-lens proxy.

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream JSON-RPC base URL requests are forwarded to
    pub upstream_rpc_url: String,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Destination port every forwarded request is rewritten to.
    /// 0 = leave the destination port untouched.
    pub forward_port: u16,

    /// Append request/response events to this file as JSON lines
    pub flow_log_path: Option<PathBuf>,

    /// Stamp extracted facts onto responses as `X-Json-Rpc-*` headers
    pub annotate_headers: bool,

    /// Largest request body the proxy buffers
    pub max_body_bytes: usize,

    /// Upstream request timeout in milliseconds
    pub upstream_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_rpc_url: "http://127.0.0.1:8545".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            forward_port: 8545,
            flow_log_path: None,
            annotate_headers: false,
            max_body_bytes: 10 * 1024 * 1024,
            upstream_timeout_ms: 30_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        Ok(Config {
            upstream_rpc_url: std::env::var("LENS_UPSTREAM_RPC")
                .unwrap_or(defaults.upstream_rpc_url),
            host: std::env::var("LENS_HOST").unwrap_or(defaults.host),
            port: std::env::var("LENS_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("Invalid LENS_PORT")?,
            forward_port: std::env::var("FORWARD_PORT")
                .unwrap_or_else(|_| "8545".into())
                .parse()
                .context("Invalid FORWARD_PORT")?,
            flow_log_path: std::env::var("LENS_FLOW_LOG")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            annotate_headers: std::env::var("LENS_ANNOTATE_HEADERS")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),
            max_body_bytes: std::env::var("LENS_MAX_BODY_BYTES")
                .unwrap_or_else(|_| "10485760".into())
                .parse()
                .context("Invalid LENS_MAX_BODY_BYTES")?,
            upstream_timeout_ms: std::env::var("LENS_UPSTREAM_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".into())
                .parse()
                .context("Invalid LENS_UPSTREAM_TIMEOUT_MS")?,
        })
    }
}
