//! # Box Vision Skill Server
//!
//! Hosts the skill pipeline behind an HTTP endpoint that Box webhooks (or a
//! serverless-style invoker) can call.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod router;
pub mod state;

use crate::{
    config::{get_config, AppConfig},
    router::create_router,
    state::build_app_state,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;

/// Wires the Box and Vision clients from `config` and serves webhook
/// deliveries on `listener` until the process stops.
pub async fn run(listener: TcpListener, config: AppConfig) -> anyhow::Result<()> {
    debug!(?config, "Skill server configuration loaded");

    let app = create_router(build_app_state(config).await?);

    info!("Accepting webhook deliveries on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Boots the skill server from the environment.
///
/// Loads `.env`, installs the `tracing` subscriber, reads and validates the
/// credentials, then binds `0.0.0.0:PORT`. Bad credentials stop startup here.
pub async fn start() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = get_config(None)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    run(listener, config).await
}
