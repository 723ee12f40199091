//! Command-line interface definitions for the news harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate,
//! plus the small helpers that turn raw flags into the validated types the
//! rest of the application consumes.

use std::error::Error;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use itertools::Itertools;

use crate::fetch::Pacing;
use crate::models::{CrawlLimits, CrawlWindow};
use crate::outlets::Outlet;

/// Command-line arguments for the news harvester.
///
/// Every flag has a default tuned for a routine incremental run: the last
/// two days, every outlet, polite pacing. Window bounds are RFC 3339
/// timestamps and are validated before any network or storage activity.
///
/// # Examples
///
/// ```sh
/// # Harvest the last two days from every outlet
/// news_harvest
///
/// # One outlet, an explicit window, and a JSON summary
/// news_harvest -o ntdtv \
///     --past 2023-01-01T00:00:00Z --current 2023-01-03T00:00:00Z \
///     --summary out/run.json
///
/// # Snappier pacing against a local mirror
/// news_harvest --pace-ms 50 --cooldown-ms 500
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the SQLite database; created on first run
    #[arg(short, long, default_value = "data/raw.db")]
    pub db: String,

    /// Outlet to crawl; repeat for several, omit for all
    #[arg(short, long, value_enum)]
    pub outlet: Vec<Outlet>,

    /// Newest instant of the crawl window (RFC 3339); defaults to now
    #[arg(long)]
    pub current: Option<DateTime<Utc>>,

    /// Oldest instant of the crawl window (RFC 3339); defaults to `--days` before the newest
    #[arg(long)]
    pub past: Option<DateTime<Utc>>,

    /// Window depth in days when `--past` is not given
    #[arg(long, default_value_t = 2)]
    pub days: i64,

    /// Consecutive non-success fetches that end one day's ID-space scan
    #[arg(long, default_value_t = 5_000)]
    pub continue_fail_count: u32,

    /// Most sequence numbers probed per day, whatever the fail counter says
    #[arg(long, default_value_t = 100_000)]
    pub daily_id_ceiling: u32,

    /// Consecutive listing failures that abort page-range discovery
    #[arg(long, default_value_t = 5)]
    pub scan_fail_limit: u32,

    /// Delay after every successful fetch, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub pace_ms: u64,

    /// Cooldown after the outlet refuses us, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub cooldown_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout_secs: u64,

    /// Write a JSON run summary to this path
    #[arg(long)]
    pub summary: Option<String>,
}

impl Cli {
    /// Resolve the crawl window from the window flags.
    ///
    /// # Errors
    ///
    /// Returns an error when the resolved bounds are inverted (an explicit
    /// `--past` after `--current`, or a negative `--days`) or when `--days`
    /// is too deep for the timestamp arithmetic to represent.
    pub fn window(&self) -> Result<CrawlWindow, Box<dyn Error>> {
        let current = self.current.unwrap_or_else(Utc::now);
        let past = match self.past {
            Some(past) => past,
            None => chrono::Duration::try_days(self.days)
                .and_then(|depth| current.checked_sub_signed(depth))
                .ok_or("Must have `--days` within a representable range.")?,
        };
        CrawlWindow::new(past, current)
    }

    /// Outlets selected for this run; first occurrence wins when repeated.
    pub fn outlets(&self) -> Vec<Outlet> {
        if self.outlet.is_empty() {
            Outlet::ALL.to_vec()
        } else {
            self.outlet.iter().copied().unique().collect()
        }
    }

    /// Crawl-loop bounds from the tuning flags.
    pub fn limits(&self) -> CrawlLimits {
        CrawlLimits {
            continue_fail_count: self.continue_fail_count,
            daily_id_ceiling: self.daily_id_ceiling,
            scan_fail_limit: self.scan_fail_limit,
        }
    }

    /// Pacing policy from the delay flags.
    pub fn pacing(&self) -> Pacing {
        Pacing::new(
            Duration::from_millis(self.pace_ms),
            Duration::from_millis(self.cooldown_ms),
        )
    }

    /// Per-request timeout from `--timeout-secs`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
