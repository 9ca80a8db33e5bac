//! MindFlow API server.

use std::sync::Arc;

use mindflow_api::config::Config;
use mindflow_api::error::AppError;
use mindflow_api::state::AppState;
use mindflow_core::clock::SystemClock;
use mindflow_store::PgCustomerRepository;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    info!("connected to database");

    if config.run_migrations {
        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("migrations applied");
    }

    let app_state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(PgCustomerRepository::new(pool)),
    );

    let app = mindflow_api::app(app_state);

    let addr = config.socket_addr()?;
    info!(%addr, "starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
