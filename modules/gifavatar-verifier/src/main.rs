use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use gifavatar_common::{normalize, AppConfig};
use gifavatar_verifier::{build_fetcher, PgSubmissionStore, Verifier};

#[derive(Parser)]
#[command(name = "verifier", about = "GifAvatar social submission verifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Run the first verification attempt on a VERIFYING submission
    Verify {
        #[arg(long)]
        id: Uuid,
    },
    /// Retry a VALIDATION_FAILED submission
    Rescan {
        #[arg(long)]
        id: Uuid,
    },
    /// Rescan failed submissions, least recently attempted first
    Sweep {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Print the canonical form of a post URL
    Normalize { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gifavatar=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Needs neither config nor database.
    if let Command::Normalize { url } = &cli.command {
        let normalized = normalize(url)?;
        println!("{}\t{}", normalized.platform(), normalized);
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let store = PgSubmissionStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let verifier = Verifier::from_config(&config, Arc::new(store), build_fetcher(&config));

    match cli.command {
        Command::Migrate => info!("Migrations applied"),
        Command::Verify { id } => {
            let submission = verifier.verify(id).await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }
        Command::Rescan { id } => {
            let submission = verifier.rescan(id).await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }
        Command::Sweep { limit } => {
            let report = verifier.sweep_failed(limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Normalize { .. } => {}
    }

    Ok(())
}
