use std::env;
use std::fs;
use std::path::Path;

use receipt_scanner::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Starting database migration...");

    let pool = db::init_pool().await?;

    // In Docker, this will be at /app/migrations/init.sql
    let migration_path =
        env::var("MIGRATION_FILE").unwrap_or_else(|_| "migrations/init.sql".to_string());

    if !Path::new(&migration_path).exists() {
        println!("Migration file not found at: {}", migration_path);
        return Ok(());
    }

    let sql_content = fs::read_to_string(&migration_path)?;
    db::apply_sql(&pool, &sql_content).await?;

    println!("Migration complete.");
    Ok(())
}
