use skillswap::{
    constants::DEFAULT_SWEEP_INTERVAL_SECS,
    db::{connections, get_db_pool, DatabaseConfig},
    utils::init_logging,
};
use anyhow::Result;
use clap::Parser;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

/// Purge legacy `declined` connection rows.
///
/// Declines are hard deletes now, but older rows still carry the status and
/// clutter every pair lookup.
#[derive(Debug, Parser)]
#[command(name = "connection_sweeper")]
struct Args {
    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Seconds between sweeps when looping
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    interval_secs: u64,

    /// Only count the rows that would be removed
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    info!("🧹 Starting connection sweeper...");

    let db_config = DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    if args.once {
        sweep(&pool, args.dry_run).await?;
        return Ok(());
    }

    let mut interval = time::interval(Duration::from_secs(args.interval_secs.max(1)));
    let mut iter_count: usize = 0;

    loop {
        interval.tick().await;
        iter_count += 1;

        info!("🔍 Sweep iteration {}", iter_count);
        if let Err(e) = sweep(&pool, args.dry_run).await {
            error!("❌ Sweep failed: {}", e);
        }
    }
}

async fn sweep(pool: &PgPool, dry_run: bool) -> Result<()> {
    let declined = connections::count_declined_connections(pool).await?;
    if declined == 0 {
        info!("📊 No legacy declined connections found");
        return Ok(());
    }

    if dry_run {
        info!("📊 {} legacy declined connections would be removed (dry run)", declined);
        return Ok(());
    }

    let deleted = connections::delete_declined_connections(pool).await?;
    info!("✅ Removed {} legacy declined connections", deleted);
    Ok(())
}
