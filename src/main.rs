//! # News Harvest
//!
//! A windowed, resumable crawler that harvests raw news articles from
//! several outlets into a local SQLite database.
//!
//! ## Features
//!
//! - Walks dense per-day article ID spaces (chinatimes) and paginated
//!   listings (epochtimes, ntdtv) behind one pair of engine traits
//! - Harvests only articles published inside an explicit UTC window
//! - Deduplicates against everything previously stored, so overlapping
//!   re-runs are cheap and safe to repeat
//! - Commits incrementally (per category, or per chunk of listing pages)
//!   so an interrupted run keeps its progress
//! - Paces every request and cools down whenever an outlet bans us
//!
//! ## Usage
//!
//! ```sh
//! news_harvest --db data/raw.db --days 2
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Window**: Validate the UTC crawl window from the CLI flags
//! 2. **Locate**: Per category, find the listing pages that can intersect it
//! 3. **Crawl**: Fetch candidate articles, filter by published timestamp
//! 4. **Commit**: Deduplicate against storage and insert what is new

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod engine;
mod fetch;
mod models;
mod outlets;
mod storage;

use cli::Cli;
use fetch::HttpFetcher;
use models::{FailureTally, RunSummary};
use outlets::crawl_outlet;
use storage::Storage;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.db, ?args.outlet, "Parsed CLI arguments");

    // Window validation comes before any storage or network activity.
    let window = args.window()?;
    let limits = args.limits();
    let pacing = args.pacing();
    info!(
        past = %window.past().to_rfc3339(),
        current = %window.current().to_rfc3339(),
        "Crawl window resolved"
    );

    let storage = Storage::open(&args.db).await?;
    info!(db = %args.db, "Storage ready");

    let fetcher = HttpFetcher::new(args.timeout())?;

    // ---- Crawl the selected outlets, serialized ----
    let mut outlet_reports = Vec::new();
    for outlet in args.outlets() {
        let report = crawl_outlet(outlet, &fetcher, &pacing, &window, &limits, &storage).await?;
        let stored_total = storage.count_for(outlet.company_id()).await?;
        info!(
            outlet = outlet.label(),
            inserted = report.inserted(),
            failures = report.failures().total(),
            stored_total,
            "Outlet completed"
        );
        outlet_reports.push(report);
    }

    // ---- Run summary ----
    let mut failures = FailureTally::default();
    for report in &outlet_reports {
        failures.merge(&report.failures());
    }
    let summary = RunSummary {
        past: window.past(),
        current: window.current(),
        inserted: outlet_reports.iter().map(|r| r.inserted()).sum(),
        failures,
        outlets: outlet_reports,
    };

    info!(
        inserted = summary.inserted,
        failures = summary.failures.total(),
        "Run complete"
    );
    for (reason, count) in summary.failures.iter() {
        info!(reason, count, "Failure tally");
    }

    if let Some(ref path) = args.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        if let Err(e) = tokio::fs::write(path, json).await {
            error!(path = %path, error = %e, "Failed writing run summary");
        } else {
            info!(path = %path, "Wrote run summary");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
