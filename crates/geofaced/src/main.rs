//! # geofaced
//!
//! Attendance daemon for geoface.
//!
//! Serves the HTTP API for face-verified, geofenced check-in and check-out:
//! - **Identity** via bearer access tokens (HS256 JWT)
//! - **Enrollment** of sensor-produced face descriptors
//! - **Attendance** state machine, one record per user per day
//! - **Office location** registry used by the geofence

mod api;
mod auth;
mod config;
mod engine;
mod error;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,geofaced=debug")),
        )
        .init();

    info!("geofaced {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!(?config, "Loaded configuration");

    let store = geoface_store::Store::open(&config.db_path).await?;
    info!(path = %config.db_path.display(), "database opened");

    let ttl = chrono::Duration::minutes(config.token_ttl_minutes);
    let tokens = match &config.jwt_secret {
        Some(secret) => TokenIssuer::new(secret.as_bytes(), ttl),
        None => {
            warn!("GEOFACE_JWT_SECRET not set; using a random secret, tokens will not survive a restart");
            TokenIssuer::ephemeral(ttl)
        }
    };

    let http_addr = config.http_addr;
    let state = AppState {
        engine: Arc::new(Engine::new(store, &config)),
        tokens: Arc::new(tokens),
        config: Arc::new(config),
    };

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
