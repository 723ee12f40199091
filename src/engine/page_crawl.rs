//! Windowed crawl of a listing-page interval.
//!
//! Walks listing pages in order, fetches every candidate article, and
//! filters by publication timestamp. Because listings are
//! reverse-chronological, the first article older than the window floor
//! proves everything after it is older still, so the whole category stops
//! right there; articles newer than the ceiling are merely skipped.

use std::ops::Range;

use tracing::{debug, info, instrument};

use crate::fetch::{Fetch, FetchOutcome, Pacing};
use crate::models::{CrawlWindow, FailureTally, RawRecord};

use super::{note_fetch_failure, PagedOutlet};

/// Result of crawling one chunk of listing pages.
#[derive(Debug, Default)]
pub struct PageCrawl {
    /// Records emitted, in listing order.
    pub records: Vec<RawRecord>,
    /// Failures observed while crawling the chunk.
    pub tally: FailureTally,
    /// True once an article older than the window floor appeared. The
    /// caller should stop crawling this category; later pages are older.
    pub crossed_past: bool,
}

/// Crawl the half-open page interval `pages`, emitting in-window articles.
///
/// Listing pages that fail to fetch are skipped; per-article failures
/// (fetch or timestamp extraction) are tallied and skipped without touching
/// the termination decision. Remaining links on a page are not fetched once
/// the floor is crossed.
#[instrument(level = "info", skip_all, fields(api = api, from = pages.start, to = pages.end))]
pub async fn crawl_pages<O, F>(
    outlet: &O,
    api: &str,
    fetcher: &F,
    pacing: &Pacing,
    window: &CrawlWindow,
    pages: Range<u32>,
) -> PageCrawl
where
    O: PagedOutlet,
    F: Fetch,
{
    let mut crawl = PageCrawl::default();

    'pages: for page in pages {
        let listing_url = outlet.listing_url(api, page);
        let listing = match fetcher.get(&listing_url).await {
            FetchOutcome::Success(body) => {
                pacing.after_success().await;
                body
            }
            outcome => {
                note_fetch_failure(&outcome, &mut crawl.tally, pacing).await;
                debug!(page, "listing unfetchable; skipping page");
                continue;
            }
        };

        for link in outlet.article_links(&listing_url, &listing) {
            let Some(url_pattern) = outlet.url_pattern(&link) else {
                crawl.tally.bump("link-unrecognized");
                continue;
            };

            let body = match fetcher.get(&link).await {
                FetchOutcome::Success(body) => {
                    pacing.after_success().await;
                    body
                }
                outcome => {
                    note_fetch_failure(&outcome, &mut crawl.tally, pacing).await;
                    continue;
                }
            };

            let published = match outlet.published_at(&link, &body) {
                Ok(published) => published,
                Err(why) => {
                    debug!(%link, why, "timestamp extraction failed");
                    crawl.tally.bump(why);
                    continue;
                }
            };

            if published > window.current() {
                continue;
            }
            if published < window.past() {
                debug!(page, %link, "crossed the window floor");
                crawl.crossed_past = true;
                break 'pages;
            }

            crawl.records.push(RawRecord {
                company_id: outlet.company_id(),
                url_pattern,
                raw_content: body,
            });
        }
    }

    info!(
        records = crawl.records.len(),
        failures = crawl.tally.total(),
        crossed_past = crawl.crossed_past,
        "page chunk crawled"
    );
    crawl
}
