mod report;
mod scan;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trendwatch_core::Region;

#[derive(Debug, Parser)]
#[command(name = "trendwatch-cli")]
#[command(about = "trendwatch command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one trend scan now and print its summary as JSON
    Scan {
        /// Score against an in-memory store; nothing is written or sent
        #[arg(long)]
        dry_run: bool,
        /// Override `TRENDWATCH_REGION` for this run (US or UK)
        #[arg(long)]
        region: Option<Region>,
    },
    /// Print the top trending products
    Trends {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Archive products not updated for N days that score below 50
    Archive {
        /// Defaults to `TRENDWATCH_ARCHIVE_AFTER_DAYS`
        #[arg(long)]
        days: Option<u32>,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("trendwatch-cli: run with --help to list commands");
        return Ok(());
    };

    let mut config = trendwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Scan { dry_run, region } => {
            if let Some(region) = region {
                config.region = region;
            }
            if dry_run {
                scan::run_dry_scan(&config).await
            } else {
                let pool = connect(&config).await?;
                scan::run_scan(&pool, &config).await
            }
        }
        Commands::Trends { limit } => {
            let pool = connect(&config).await?;
            report::print_trends(&pool, limit).await
        }
        Commands::Archive { days } => {
            let pool = connect(&config).await?;
            report::archive(&pool, days.unwrap_or(config.archive_after_days)).await
        }
        Commands::Migrate => {
            let pool = connect(&config).await?;
            let applied = trendwatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
            Ok(())
        }
    }
}

async fn connect(config: &trendwatch_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = trendwatch_db::PoolConfig::from_app_config(config);
    Ok(trendwatch_db::connect_pool(&config.database_url, pool_config).await?)
}
