// Standalone migration runner for deploy pipelines

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;

#[derive(Parser)]
#[command(name = "migrate_cli", about = "Run HireFlow database migrations")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database URL (falls back to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Run,
    /// Show applied migration versions
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("DATABASE_URL must be set or passed via --database-url")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Command::Run => {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Migration failed")?;
            println!("Migrations applied");
        }
        Command::Status => {
            let rows = sqlx::query(
                "SELECT version, description, success
                 FROM _sqlx_migrations ORDER BY version",
            )
            .fetch_all(&pool)
            .await
            .context("Could not read migration table (run migrations first?)")?;
            for row in rows {
                let version: i64 = row.get("version");
                let description: String = row.get("description");
                let success: bool = row.get("success");
                println!(
                    "{} {} [{}]",
                    version,
                    description,
                    if success { "ok" } else { "FAILED" }
                );
            }
        }
    }

    Ok(())
}
