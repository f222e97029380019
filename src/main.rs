use crate::controller::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod config;
mod controller;
mod error;
mod hash;
mod matcher;
mod model;
mod pause;
mod predicate;
mod service;
mod strategy;
mod target;
mod webserver;
mod workload;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting reloader {}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config()?;

    info!("Initializing K8s client");
    let client = controller::create_client().await?;

    let ctx = Context {
        client,
        config: Arc::new(config),
        namespace_cache: None,
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown.cancel();
        }
    });

    let app = webserver::create_app();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 8080));
    info!("Starting webserver on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_cancel = cancel.clone();

    tokio::select! {
        res = controller::run(ctx, cancel) => {
            if let Err(e) = res {
                error!("Controller exited with error: {e:#}");
            }
        }
        res = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_cancel.cancelled().await;
        }) => {
            if let Err(e) = res {
                error!("Webserver exited with error: {e:#}");
            }
        }
    }

    Ok(())
}
