//! Outlet adapters and per-outlet crawl orchestration.
//!
//! One module per outlet, each exposing a static category table and an
//! adapter struct implementing the engine trait that matches how the site
//! addresses its articles:
//!
//! | Outlet       | Addressing                       | Strategy        |
//! |--------------|----------------------------------|-----------------|
//! | [`chinatimes`] | dense per-day numeric IDs      | ID-space walk   |
//! | [`epochtimes`] | paginated listings (from p. 2) | range + crawl   |
//! | [`ntdtv`]      | paginated listings             | range + crawl   |
//!
//! The set is closed on purpose: [`Outlet`] is the CLI-facing enum, and
//! adding an outlet means one new module plus one new variant here.

use std::error::Error;

use clap::ValueEnum;
use tracing::{info, instrument};
use url::Url;

use crate::engine::{id_space, page_crawl, page_range, PagedOutlet};
use crate::fetch::{Fetch, Pacing};
use crate::models::{Category, CategoryReport, CrawlLimits, CrawlWindow, OutletReport};
use crate::storage::Storage;

pub mod chinatimes;
pub mod epochtimes;
pub mod ntdtv;

/// The outlets this crate knows how to harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Outlet {
    Chinatimes,
    Epochtimes,
    Ntdtv,
}

impl Outlet {
    /// Every outlet, in the order a full run crawls them.
    pub const ALL: [Outlet; 3] = [Outlet::Chinatimes, Outlet::Epochtimes, Outlet::Ntdtv];

    /// Label used in logs, reports, and on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Outlet::Chinatimes => "chinatimes",
            Outlet::Epochtimes => "epochtimes",
            Outlet::Ntdtv => "ntdtv",
        }
    }

    /// Fixed numeric identity; the storage key space for the outlet.
    pub fn company_id(self) -> i64 {
        match self {
            Outlet::Chinatimes => 1,
            Outlet::Epochtimes => 2,
            Outlet::Ntdtv => 3,
        }
    }

    /// The outlet's static category table.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Outlet::Chinatimes => chinatimes::CATEGORIES,
            Outlet::Epochtimes => epochtimes::CATEGORIES,
            Outlet::Ntdtv => ntdtv::CATEGORIES,
        }
    }
}

/// Crawl one outlet across its whole category table, committing after every
/// batch: one batch per category for ID-space outlets, one per page chunk
/// for paged outlets.
#[instrument(level = "info", skip_all, fields(outlet = outlet.label()))]
pub async fn crawl_outlet<F: Fetch>(
    outlet: Outlet,
    fetcher: &F,
    pacing: &Pacing,
    window: &CrawlWindow,
    limits: &CrawlLimits,
    storage: &Storage,
) -> Result<OutletReport, Box<dyn Error>> {
    let categories = match outlet {
        Outlet::Chinatimes => {
            let mut reports = Vec::new();
            for category in outlet.categories() {
                let (records, failures) = id_space::crawl_category(
                    &chinatimes::Chinatimes,
                    category.api,
                    fetcher,
                    pacing,
                    window,
                    limits,
                )
                .await;
                let fetched = records.len();
                let inserted = storage.write_new_records(&records).await?;
                info!(
                    category = category.name,
                    fetched,
                    inserted,
                    failures = failures.total(),
                    "category committed"
                );
                reports.push(CategoryReport {
                    category: category.name.to_string(),
                    fetched,
                    inserted,
                    failures,
                });
            }
            reports
        }
        Outlet::Epochtimes => {
            crawl_paged(
                &epochtimes::Epochtimes,
                outlet.categories(),
                fetcher,
                pacing,
                window,
                limits,
                storage,
            )
            .await?
        }
        Outlet::Ntdtv => {
            crawl_paged(
                &ntdtv::Ntdtv,
                outlet.categories(),
                fetcher,
                pacing,
                window,
                limits,
                storage,
            )
            .await?
        }
    };

    Ok(OutletReport {
        outlet: outlet.label().to_string(),
        categories,
    })
}

/// Shared driver for paged outlets: locate the range, crawl it in
/// commit-sized chunks, and stop the category once the floor is crossed.
/// An empty chunk that did not cross the floor just moves on; unfetchable
/// pages stay non-fatal.
async fn crawl_paged<O, F>(
    adapter: &O,
    table: &'static [Category],
    fetcher: &F,
    pacing: &Pacing,
    window: &CrawlWindow,
    limits: &CrawlLimits,
    storage: &Storage,
) -> Result<Vec<CategoryReport>, Box<dyn Error>>
where
    O: PagedOutlet,
    F: Fetch,
{
    let interval = adapter.commit_page_interval().max(1);
    let mut reports = Vec::new();

    for category in table {
        let (range, mut failures) =
            page_range::find_page_range(adapter, category.api, fetcher, pacing, window, limits)
                .await;

        let mut fetched = 0;
        let mut inserted = 0;
        let mut from = range.first;
        while from <= range.last {
            let to = from.saturating_add(interval).min(range.last.saturating_add(1));
            // At the u32 ceiling `to` saturates onto `from`; the empty chunk
            // can never advance, so the ceiling page stays unfetched.
            if to == from {
                break;
            }
            let chunk =
                page_crawl::crawl_pages(adapter, category.api, fetcher, pacing, window, from..to)
                    .await;

            failures.merge(&chunk.tally);
            fetched += chunk.records.len();
            inserted += storage.write_new_records(&chunk.records).await?;

            if chunk.crossed_past {
                break;
            }
            from = to;
        }

        info!(
            category = category.name,
            fetched,
            inserted,
            failures = failures.total(),
            "category committed"
        );
        reports.push(CategoryReport {
            category: category.name.to_string(),
            fetched,
            inserted,
            failures,
        });
    }

    Ok(reports)
}

/// Resolve a possibly-relative href against the page it appeared on.
pub(crate) fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|url| url.to_string())
}
