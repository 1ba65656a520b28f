use coursehub::{config::Config, db};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prepares the document store: connects and applies pending migrations.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        write_retries = config.service.write_retries,
        "schema up to date"
    );

    pool.close().await;
    Ok(())
}
