use anyhow::{Context, Result};
use rpc_lens::config::Config;
use rpc_lens::hooks::default_chain;
use rpc_lens::proxy::{build_router, ProxyState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rpc_lens=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let hooks = default_chain(&config)?;
    let hook_names = hooks.names();
    let state = Arc::new(ProxyState::new(&config, hooks).context("Failed to build proxy")?);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        listen = %addr,
        upstream = %state.upstream(),
        forward_port = config.forward_port,
        hooks = ?hook_names,
        "rpc-lens proxy listening"
    );

    axum::serve(listener, build_router(state))
        .await
        .context("Proxy server failed")?;
    Ok(())
}
