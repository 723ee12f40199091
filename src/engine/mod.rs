//! Outlet-independent crawl engines.
//!
//! Three strategies cover every outlet this crate harvests:
//! - [`id_space`]: walk a dense per-day numeric article ID space
//! - [`page_range`]: discover which listing pages can intersect the window
//! - [`page_crawl`]: crawl a listing-page interval with window filtering
//!
//! The engines are generic over [`Fetch`](crate::fetch::Fetch) and over the
//! two adapter traits below, so they carry no outlet-specific parsing and
//! can be driven end to end by scripted fetchers in tests.

use chrono::{DateTime, NaiveDate, Utc};

use crate::fetch::{FetchOutcome, Pacing};
use crate::models::{reason, FailureTally};

pub mod id_space;
pub mod page_crawl;
pub mod page_range;

/// Adapter for outlets that address articles by a dense per-day numeric
/// sequence, like `20230102000123`.
///
/// There is no index to consult for such outlets; the walker probes the
/// space directly and the adapter only has to build URLs and vet payloads.
pub trait IdSpaceOutlet {
    /// Fixed numeric identity of the outlet.
    fn company_id(&self) -> i64;

    /// Full article URL for one `(category, day, sequence)` slot.
    fn article_url(&self, api: &str, day: NaiveDate, seq: u32) -> String;

    /// Dedup key for the slot; stable across runs.
    fn url_pattern(&self, day: NaiveDate, seq: u32) -> String;

    /// Vet a fetched payload.
    ///
    /// # Returns
    ///
    /// `Err` carries a short tally reason when the page is not a usable
    /// article (login walls, empty shells, interstitials).
    fn inspect(&self, html: &str) -> Result<(), &'static str>;
}

/// Adapter for outlets with reverse-chronological paginated listings.
pub trait PagedOutlet {
    /// Fixed numeric identity of the outlet.
    fn company_id(&self) -> i64;

    /// First listing page worth requesting. Some outlets shape page 1
    /// differently from the rest of the pagination.
    fn first_page(&self) -> u32 {
        1
    }

    /// How many pages the orchestrator crawls between commits.
    fn commit_page_interval(&self) -> u32;

    /// URL of one listing page in one category.
    fn listing_url(&self, api: &str, page: u32) -> String;

    /// Max-page indicator parsed off a listing, when one is present.
    fn max_page(&self, html: &str) -> Option<u32>;

    /// Publication dates readable off the listing itself, newest first.
    /// Cheaper than fetching articles; drives page-range discovery.
    fn listed_dates(&self, html: &str) -> Vec<DateTime<Utc>>;

    /// Candidate article URLs on a listing page, absolutized against `base`.
    fn article_links(&self, base: &str, html: &str) -> Vec<String>;

    /// Dedup key derived from an article URL; `None` for links that do not
    /// belong to the outlet's article space.
    fn url_pattern(&self, url: &str) -> Option<String>;

    /// Publication timestamp of a fetched article.
    ///
    /// # Returns
    ///
    /// `Err` carries a short tally reason when no timestamp can be read.
    fn published_at(&self, url: &str, html: &str) -> Result<DateTime<Utc>, &'static str>;
}

/// Tally a non-success outcome, cooling down when it was a ban.
pub(crate) async fn note_fetch_failure(
    outcome: &FetchOutcome,
    tally: &mut FailureTally,
    pacing: &Pacing,
) {
    match outcome {
        FetchOutcome::Success(_) => {}
        FetchOutcome::Banned => {
            tally.bump(reason::BANNED);
            pacing.after_ban().await;
        }
        FetchOutcome::NotFound => tally.bump(reason::NOT_FOUND),
        FetchOutcome::Transient => tally.bump(reason::TRANSIENT),
    }
}
