//! Lock every block whose signup deadline has passed.
//!
//! Meant for a cron entry a few minutes after each deadline. Signup requests
//! apply the same lock lazily, so a missed run only delays the lock until the
//! next request touches the block.

use chrono::Local;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use eighth::config::Config;
use eighth::database;
use eighth::services::block_lock_service;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let pool = match database::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "could not open database");
            std::process::exit(1);
        }
    };

    let now = Local::now().naive_local();
    match block_lock_service::lock_due_blocks(&pool, now).await {
        Ok(locked) => info!(count = locked.len(), blocks = ?locked, "deadline locks applied"),
        Err(e) => {
            error!(error = %e, "deadline lock run failed");
            std::process::exit(1);
        }
    }
}
