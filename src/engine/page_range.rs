//! Discovery of the listing-page interval worth crawling.
//!
//! Listings are reverse-chronological, so the pages that can contain
//! window articles form one contiguous interval: everything before it is
//! too new, everything after it is too old. Discovery reads publication
//! dates off the listings themselves (usually out of the link URLs), which
//! is far cheaper than fetching articles, and degrades to "first page only"
//! whenever the outlet gives it nothing to work with.

use tracing::{debug, info, instrument, warn};

use crate::fetch::{Fetch, FetchOutcome, Pacing};
use crate::models::{CrawlLimits, CrawlWindow, FailureTally};

use super::{note_fetch_failure, PagedOutlet};

/// A closed interval of listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    /// First page the crawler should fetch.
    pub first: u32,
    /// Last page, inclusive, from the outlet's max-page indicator.
    pub last: u32,
}

/// Locate the page interval whose listings can intersect the window.
///
/// The first listing page is fetched once and reused for both the max-page
/// indicator and the first scan step. Scan pages that fail to fetch are
/// skipped, but `scan_fail_limit` consecutive failures abort discovery with
/// whatever has been decided so far; a dead site should not be ground
/// through page by page.
///
/// # Returns
///
/// The located range plus the discovery failure tally. When the front page
/// is unreachable or carries no max-page indicator, the range collapses to
/// the first page alone.
#[instrument(level = "info", skip_all, fields(api = api))]
pub async fn find_page_range<O, F>(
    outlet: &O,
    api: &str,
    fetcher: &F,
    pacing: &Pacing,
    window: &CrawlWindow,
    limits: &CrawlLimits,
) -> (PageRange, FailureTally)
where
    O: PagedOutlet,
    F: Fetch,
{
    let first = outlet.first_page();
    let mut tally = FailureTally::default();

    let front_url = outlet.listing_url(api, first);
    let front = match fetcher.get(&front_url).await {
        FetchOutcome::Success(body) => {
            pacing.after_success().await;
            body
        }
        outcome => {
            note_fetch_failure(&outcome, &mut tally, pacing).await;
            warn!(page = first, "front listing unreachable; crawling the first page only");
            return (PageRange { first, last: first }, tally);
        }
    };

    let Some(last) = outlet.max_page(&front) else {
        debug!(page = first, "no max-page indicator; assuming a single page");
        return (PageRange { first, last: first }, tally);
    };

    let mut start = first;
    let mut cached_front = Some(front);
    let mut consecutive_failures = 0u32;

    for page in first..=last {
        let body = match cached_front.take() {
            Some(body) => body,
            None => match fetcher.get(&outlet.listing_url(api, page)).await {
                FetchOutcome::Success(body) => {
                    pacing.after_success().await;
                    consecutive_failures = 0;
                    body
                }
                outcome => {
                    note_fetch_failure(&outcome, &mut tally, pacing).await;
                    consecutive_failures += 1;
                    if consecutive_failures >= limits.scan_fail_limit {
                        warn!(page, "aborting discovery after consecutive listing failures");
                        break;
                    }
                    continue;
                }
            },
        };

        let dates = outlet.listed_dates(&body);
        let Some(newest) = dates.first().copied() else {
            debug!(page, "no dates listed; skipping");
            continue;
        };

        if dates.iter().any(|d| window.contains(*d)) {
            start = page;
            debug!(page, "window intersects");
            break;
        }
        // Reverse-chronological: once even the newest entry predates the
        // floor, later pages cannot intersect either.
        if newest < window.past() {
            debug!(page, "window passed without intersection");
            break;
        }
    }

    info!(first = start, last, "page range located");
    (PageRange { first: start, last }, tally)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use crate::engine::fixtures::FakePaged;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::fetch::{FetchOutcome, Pacing};
    use crate::models::{reason, CrawlLimits, CrawlWindow};

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn window() -> CrawlWindow {
        CrawlWindow::new(utc(2023, 1, 10, 0), utc(2023, 1, 12, 0)).unwrap()
    }

    fn limits() -> CrawlLimits {
        CrawlLimits {
            scan_fail_limit: 3,
            ..CrawlLimits::default()
        }
    }

    fn listing_of(max: Option<u32>, date: &str, id: u32) -> String {
        FakePaged::listing(max, &[FakePaged::article_url(date, id)])
    }

    #[tokio::test]
    async fn test_locates_first_intersecting_page() {
        // Pages 1 and 2 are entirely newer than the window; page 3 is in it.
        let fetcher = ScriptedFetcher::new()
            .ok(FakePaged::page_url(1), &listing_of(Some(8), "2023-01-20", 1))
            .ok(FakePaged::page_url(2), &listing_of(None, "2023-01-15", 2))
            .ok(FakePaged::page_url(3), &listing_of(None, "2023-01-11", 3));

        let (range, tally) = find_page_range(
            &FakePaged,
            "cat9",
            &fetcher,
            &Pacing::instant(),
            &window(),
            &limits(),
        )
        .await;

        assert_eq!(range, PageRange { first: 3, last: 8 });
        assert!(tally.is_empty());
        // The front page is reused for the first scan step, not refetched.
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_defaults_to_first_page_when_window_passes_without_intersection() {
        // Everything is newer than the window until page 5, which is already
        // entirely older: nothing intersects, the default start stands.
        let fetcher = ScriptedFetcher::new()
            .ok(FakePaged::page_url(1), &listing_of(Some(10), "2023-01-20", 1))
            .ok(FakePaged::page_url(2), &listing_of(None, "2023-01-19", 2))
            .ok(FakePaged::page_url(3), &listing_of(None, "2023-01-18", 3))
            .ok(FakePaged::page_url(4), &listing_of(None, "2023-01-17", 4))
            .ok(FakePaged::page_url(5), &listing_of(None, "2023-01-05", 5));

        let (range, _) = find_page_range(
            &FakePaged,
            "cat9",
            &fetcher,
            &Pacing::instant(),
            &window(),
            &limits(),
        )
        .await;

        assert_eq!(range, PageRange { first: 1, last: 10 });
        assert_eq!(fetcher.calls(), 5);
    }

    #[tokio::test]
    async fn test_front_failure_collapses_to_single_page() {
        let fetcher = ScriptedFetcher::new();
        let (range, tally) = find_page_range(
            &FakePaged,
            "cat9",
            &fetcher,
            &Pacing::instant(),
            &window(),
            &limits(),
        )
        .await;

        assert_eq!(range, PageRange { first: 1, last: 1 });
        assert_eq!(tally.get(reason::NOT_FOUND), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_max_page_indicator_collapses_to_single_page() {
        let fetcher =
            ScriptedFetcher::new().ok(FakePaged::page_url(1), &listing_of(None, "2023-01-11", 1));

        let (range, tally) = find_page_range(
            &FakePaged,
            "cat9",
            &fetcher,
            &Pacing::instant(),
            &window(),
            &limits(),
        )
        .await;

        assert_eq!(range, PageRange { first: 1, last: 1 });
        assert!(tally.is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_scan_failures_abort_discovery() {
        // Page 1 is too new; pages 2-4 fail (a ban among them); discovery
        // gives up before ever reaching page 5.
        let fetcher = ScriptedFetcher::new()
            .ok(FakePaged::page_url(1), &listing_of(Some(9), "2023-01-20", 1))
            .on(FakePaged::page_url(2), FetchOutcome::Banned);

        let (range, tally) = find_page_range(
            &FakePaged,
            "cat9",
            &fetcher,
            &Pacing::instant(),
            &window(),
            &limits(),
        )
        .await;

        assert_eq!(range, PageRange { first: 1, last: 9 });
        assert_eq!(tally.get(reason::BANNED), 1);
        assert_eq!(tally.get(reason::NOT_FOUND), 2);
        // front + three failed scan fetches, then the abort.
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_pages_without_dates_are_skipped() {
        // Page 2 lists nothing parseable; page 3 intersects.
        let fetcher = ScriptedFetcher::new()
            .ok(FakePaged::page_url(1), &listing_of(Some(6), "2023-01-20", 1))
            .ok(FakePaged::page_url(2), "nothing to see here")
            .ok(FakePaged::page_url(3), &listing_of(None, "2023-01-10", 3));

        let (range, _) = find_page_range(
            &FakePaged,
            "cat9",
            &fetcher,
            &Pacing::instant(),
            &window(),
            &limits(),
        )
        .await;

        assert_eq!(range, PageRange { first: 3, last: 6 });
    }
}
