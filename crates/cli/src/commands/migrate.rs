//! `parley migrate` — Apply pending database migrations.

use parley_config::AppConfig;
use parley_store::SqliteStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🔄 Migrating {}", config.database.url);
    // Opening the store applies the schema.
    let _store = SqliteStore::new(&config.database.url).await?;
    println!("✅ Database is up to date.");

    Ok(())
}
