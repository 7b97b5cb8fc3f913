use std::net::SocketAddr;

use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use eighth::config::Config;
use eighth::database;
use eighth::services::notification_service::Notifier;
use eighth::services::signup_service::SignupEngine;
use eighth::web::{self, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        database_url = %config.database_url,
        waitlist = config.engine.enable_waitlist,
        "starting eighth period signup service"
    );

    let pool = match database::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "could not open database");
            std::process::exit(1);
        }
    };

    let engine = SignupEngine::new(pool, config.engine.clone(), Notifier::new(config.notify_url.clone()));
    let app = web::router(AppState::new(engine));

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(host = %config.host, port = config.port, error = %e, "invalid listen address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback = SocketAddr::new(addr.ip(), config.port.saturating_add(1));
            warn!(%addr, error = %e, %fallback, "could not bind, trying fallback port");
            match tokio::net::TcpListener::bind(fallback).await {
                Ok(l) => l,
                Err(e) => {
                    error!(%fallback, error = %e, "could not bind fallback port");
                    std::process::exit(1);
                }
            }
        }
    };

    match listener.local_addr() {
        Ok(bound) => info!("listening on http://{}", bound),
        Err(e) => warn!(error = %e, "could not read bound address"),
    }

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server stopped");
    }
}
