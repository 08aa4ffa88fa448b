use std::error::Error;

use foodgram_sdk::{config::Settings, error::TypeError, loader::load_reference_data};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let database_url = settings
        .database_url
        .clone()
        .ok_or_else(|| TypeError::new("DATABASE_URL must be set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    info!("Connected to database, loading reference data");
    load_reference_data(&settings, &pool).await?;

    Ok(())
}
