//! ledger_core maintenance binary
//!
//! Connects to the configured database, optionally applies the bundled
//! schema (`--migrate`) and verifies it is complete.

use ledger_core::{db, Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledger_core=debug,sqlx=warn".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let migrate = std::env::args().any(|a| a == "--migrate");

    tracing::info!(environment = %config.environment, "Starting ledger_core");
    tracing::info!("Connecting to database...");

    let pool = db::connect(&config).await?;
    db::verify_connection(&pool).await?;

    if migrate {
        if config.is_production() {
            tracing::warn!("Applying schema in production");
        }
        db::apply_schema(&pool).await?;
    }

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Run with --migrate.");
        pool.close().await;
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database schema verified");
    pool.close().await;

    Ok(())
}
