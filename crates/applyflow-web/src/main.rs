mod api;
mod app;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod state;
mod tasks;

use std::net::SocketAddr;
use std::sync::Arc;

use applyflow_core::SystemClock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applyflow_web=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let tls_config = config.tls.clone();

    tracing::info!(
        general_rpm = config.rate_limit.requests_per_minute,
        auth_rpm = config.rate_limit.auth_requests_per_minute,
        token_ttl_secs = config.auth.jwt_ttl_secs,
        users = config.users.len(),
        "Starting applyflow-web"
    );

    // Build the login decoy hash before serving so no request pays for it.
    tokio::task::spawn_blocking(auth::password::decoy_hash).await??;

    let state = AppState::new(config, Arc::new(SystemClock))?;
    tasks::spawn_maintenance(&state);

    let app = app::build_app(state);

    if let (Some(cert), Some(key)) = (&tls_config.cert_path, &tls_config.key_path) {
        use axum_server::tls_rustls::RustlsConfig;
        let rustls_config = RustlsConfig::from_pem_file(cert, key).await?;
        tracing::info!("applyflow-web listening on https://{}", bind_addr);
        axum_server::bind_rustls(bind_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        tracing::info!("applyflow-web listening on http://{}", bind_addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
