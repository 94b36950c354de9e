#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::config::ShutdownConfig;
use crate::config::listen_address;
use crate::coordinator::ShutdownCoordinator;
use crate::health::ShutdownHealthIndicator;
use crate::lifecycle::ContextId;
use crate::pool::RequestPool;
use crate::pool::track_requests;
use crate::utils::env_lookup;

mod config;
mod connector;
mod coordinator;
mod health;
mod lifecycle;
mod pool;
mod response;
mod root;
mod server;
mod signal;
#[cfg(test)]
mod tests;
mod utils;

const DEFAULT_RUST_LOG: &str = "gracefully=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = ShutdownConfig::from_lookup(&env_lookup)?;
    let address = listen_address(&env_lookup)?;

    let context = ContextId::new();
    let coordinator = Arc::new(ShutdownCoordinator::new(context, config));
    let pool = RequestPool::new();

    let (listener, control) = connector::bind(address, "HTTP").await?;
    tracing::info!("Listening on {control}");

    coordinator.register_connector(Arc::new(
        control.with_worker_pool(Arc::new(pool.clone())),
    ));

    let app = create_router(Arc::clone(&coordinator), pool);

    if config.enabled {
        tracing::info!(
            "Graceful shutdown enabled, waiting up to {} seconds for in-flight requests",
            config.timeout_seconds
        );
    }

    server::run(
        listener,
        app,
        context,
        coordinator,
        signal::termination,
        server::EXIT_GRACE,
    )
    .await?;

    Ok(())
}

/// Create the router
///
/// Health checks bypass the request pool so they keep answering while the
/// pool drains.
pub fn create_router(coordinator: Arc<ShutdownCoordinator>, pool: RequestPool) -> Router {
    let work = Router::new()
        .route("/", get(root::root))
        .route_layer(from_fn_with_state(pool, track_requests));

    Router::new()
        .route("/health", get(health::health))
        .with_state(ShutdownHealthIndicator::new(coordinator))
        .merge(work)
        .layer(TraceLayer::new_for_http())
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}
