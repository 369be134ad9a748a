//! # run_sync: Sync Runner
//!
//! Fetches, canonicalizes and stores a window of POS documents. Run
//! nightly from cron for the rolling week, or by hand with explicit
//! dates for backfills:
//!
//! ```text
//! run_sync                          last 7 days
//! run_sync 2024-05-10               one day
//! run_sync 2024-05-01 2024-05-31    explicit window
//! ```
//!
//! Exits 0 only when the run persisted and at least one node answered.
//! Ctrl+C lets the day in flight finish, then stops cleanly.

use chrono::{Duration, NaiveDate, Utc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use botica_db::{Database, DbConfig};
use botica_pipeline::{
    HttpPosClient, MultiNodeFetcher, PipelineConfig, PipelineError, PipelineResult, RunStats,
    SqliteGateway, SyncPipeline,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(stats) if stats.success => {}
        Ok(_) => {
            error!("Run finished without a usable result");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "Sync run aborted");
            std::process::exit(1);
        }
    }
}

async fn run() -> PipelineResult<RunStats> {
    let (start, end) = parse_window()?;

    // Load configuration
    let config = PipelineConfig::load_or_default(None);
    info!(
        api = %config.api.base_url,
        nodes = config.nodes.len(),
        db = %config.database.path.display(),
        "Configuration loaded"
    );

    // Opening the store also brings the schema up to date
    let db = Database::new(DbConfig::new(&config.database.path)).await?;

    // Assemble the pipeline
    let client = HttpPosClient::new(&config.api)?;
    let fetcher = MultiNodeFetcher::new(client, config.nodes.clone(), config.inter_day_delay());
    let pipeline = SyncPipeline::new(fetcher, config.canonicalizer()?, SqliteGateway::new(db));

    // Ctrl+C finishes the day in flight, then stops
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current day");
            cancel.cancel();
        }
    });

    let stats = pipeline.run_sync(start, end).await?;
    info!(
        run_id = %stats.run_id,
        invoices = stats.invoice_count,
        sale_lines = stats.sale_line_count,
        expenses = stats.expense_count,
        insurance = stats.insurance_count,
        skipped = stats.skipped_documents,
        fetch_failures = stats.failed.len(),
        "Sync run finished"
    );

    Ok(stats)
}

/// Window from the command line. No arguments means the rolling week
/// ending today, one date means that single day.
fn parse_window() -> PipelineResult<(NaiveDate, NaiveDate)> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let today = Utc::now().date_naive();
    match args.as_slice() {
        [] => Ok((today - Duration::days(6), today)),
        [day] => {
            let day = parse_day(day)?;
            Ok((day, day))
        }
        [start, end] => Ok((parse_day(start)?, parse_day(end)?)),
        _ => Err(PipelineError::InvalidConfig(
            "usage: run_sync [START [END]], dates as YYYY-MM-DD".to_string(),
        )),
    }
}

fn parse_day(raw: &str) -> PipelineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        PipelineError::InvalidConfig(format!("invalid date '{raw}', expected YYYY-MM-DD"))
    })
}
