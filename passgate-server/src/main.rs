//! Passgate Server - WebAuthn relying party over HTTP
//!
//! Exposes the passgate-core ceremonies via HTTP endpoints:
//! - POST /register_options, /register_response - Passkey registration
//! - POST /login_options, /login_response - Passkey authentication

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use passgate_core::{RelyingParty, RelyingPartyConfig};
use passgate_server::webauthn::storage;
use passgate_server::{create_router_with_config, AppState, Config, WebauthnRsBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("passgate_server=info,passgate_core=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let rp_config = RelyingPartyConfig::from_env().context("invalid relying party configuration")?;

    let backend = WebauthnRsBackend::new(&rp_config)
        .map_err(|e| anyhow::anyhow!("failed to build WebAuthn backend: {:?}", e))?;
    let store = storage::connect(config.database_url.as_deref(), config.database_max_connections)
        .await
        .context("failed to open credential store")?;

    tracing::info!(
        rp_id = %rp_config.rp_id,
        rp_name = %rp_config.rp_name,
        origin = %rp_config.origin_str(),
        challenge_ttl_secs = rp_config.challenge_ttl.num_seconds(),
        persistent = store.is_persistent(),
        "Relying party configured"
    );

    let rp = RelyingParty::new(rp_config, store, Arc::new(backend));
    let app = create_router_with_config(AppState::new(rp), &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            // Keep serving; the process can still be killed.
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}
