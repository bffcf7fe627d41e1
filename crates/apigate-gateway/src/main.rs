//! apigate HTTP gateway
//!
//! - `POST /v1/authorize` decides calls for proxy-authenticated principals
//! - Config: `APIGATE_CONFIG` (default `apigate.yaml`), strict parsing
//! - Rate-limiter state pruned on a fixed interval
//! - Ctrl-C flips readiness to draining, then shuts down gracefully

use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use apigate_core::error::{ApiGateError, Result};
use apigate_gateway::{app_state::AppState, config, router};

const DEFAULT_CONFIG_PATH: &str = "apigate.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "apigate-gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("APIGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg.server.listen.parse().map_err(|e| {
        ApiGateError::InvalidConfig(format!("server.listen must be a valid SocketAddr: {e}"))
    })?;

    let state = AppState::new(&cfg, Some(path))?;

    let limiter = state.engine().limiter().clone();
    let prune_every = Duration::from_secs(cfg.server.prune_interval_secs);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(prune_every);
        loop {
            tick.tick().await;
            limiter.prune();
        }
    });

    let app = router::build_router(state.clone());

    tracing::info!(%listen, "apigate-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| ApiGateError::Internal(format!("bind failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested; draining");
            state.metrics().set_draining();
        })
        .await
        .map_err(|e| ApiGateError::Internal(format!("server failed: {e}")))
}
