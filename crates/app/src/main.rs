mod compensation;
mod directory;
mod problem;
mod router;
mod seed;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;

use orgchart_storage::Database;
use orgchart_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    if let Some(path) = config.seed_file.as_deref() {
        let seeded = seed::load_from_file(&database, path).await?;
        info!(stage = "seed", count = seeded, path = %path, "seeded employee records");
    }

    let state = router::AppState::new(metrics, database);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
