//! epochtimes.com adapter.
//!
//! Listings are plain numbered pages:
//!
//! ```text
//! https://www.epochtimes.com/b5/{api}_{page}.htm
//! ```
//!
//! starting at page 2: the category root (`{api}.htm`) has a different
//! shape than the numbered pages, so pagination begins one page in.
//!
//! # URL Pattern
//!
//! Article URLs embed a two-digit year:
//!
//! ```text
//! https://www.epochtimes.com/b5/23/1/11/n13908765.htm
//! ```
//!
//! Candidate links are recognized by that shape anywhere on the listing,
//! rather than by a listing-specific selector.

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{absolutize, Outlet};
use crate::engine::PagedOutlet;
use crate::models::Category;

/// Site prefix shared by listings and articles.
pub const COMPANY_URL: &str = "https://www.epochtimes.com/b5/";

/// Pages crawled between storage commits.
const COMMIT_PAGE_INTERVAL: u32 = 10;

/// Numbered listing pages start here; `{api}.htm` is not `{api}_1.htm`.
const FIRST_PAGE: u32 = 2;

/// Category table as the outlet publishes it.
pub const CATEGORIES: &[Category] = &[
    Category { name: "大陸", api: "nsc413" },
    Category { name: "美國", api: "nsc412" },
    Category { name: "香港", api: "ncid1349362" },
    Category { name: "國際", api: "nsc418" },
    Category { name: "台灣", api: "ncid1349361" },
    Category { name: "科技", api: "nsc419" },
    Category { name: "財經", api: "nsc420" },
    Category { name: "文化", api: "nsc2007" },
];

static ARTICLE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://www\.epochtimes\.com/b5/(\d{1,2})/(\d{1,2})/(\d{1,2})/n\d+\.htm$")
        .unwrap()
});

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static PAGE_NUMBERS: Lazy<Selector> = Lazy::new(|| Selector::parse("a.page-numbers").unwrap());

static PUBLISHED_META: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[property=\"article:published_time\"]").unwrap());

/// Paged adapter for epochtimes.
#[derive(Debug, Clone, Copy)]
pub struct Epochtimes;

impl Epochtimes {
    fn date_in_url(url: &str) -> Option<DateTime<Utc>> {
        let caps = ARTICLE_URL.captures(url)?;
        let year: i32 = caps[1].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(
            2000 + year,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }
}

impl PagedOutlet for Epochtimes {
    fn company_id(&self) -> i64 {
        Outlet::Epochtimes.company_id()
    }

    fn first_page(&self) -> u32 {
        FIRST_PAGE
    }

    fn commit_page_interval(&self) -> u32 {
        COMMIT_PAGE_INTERVAL
    }

    fn listing_url(&self, api: &str, page: u32) -> String {
        format!("{COMPANY_URL}{api}_{page}.htm")
    }

    /// Largest numeric entry in the pagination strip.
    fn max_page(&self, html: &str) -> Option<u32> {
        let document = Html::parse_document(html);
        document
            .select(&PAGE_NUMBERS)
            .filter_map(|el| {
                el.text()
                    .collect::<String>()
                    .trim()
                    .replace(',', "")
                    .parse::<u32>()
                    .ok()
            })
            .max()
    }

    fn listed_dates(&self, html: &str) -> Vec<DateTime<Utc>> {
        self.article_links(COMPANY_URL, html)
            .iter()
            .filter_map(|url| Self::date_in_url(url))
            .collect()
    }

    /// Every anchor matching the article URL shape, deduplicated in
    /// document order; listings link each story more than once.
    fn article_links(&self, base: &str, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&ANCHORS)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| absolutize(base, href))
            .filter(|url| ARTICLE_URL.is_match(url))
            .unique()
            .collect()
    }

    fn url_pattern(&self, url: &str) -> Option<String> {
        if !ARTICLE_URL.is_match(url) {
            return None;
        }
        let stem = url.strip_prefix(COMPANY_URL)?;
        Some(stem.strip_suffix(".htm").unwrap_or(stem).to_string())
    }

    /// Prefer the `article:published_time` meta tag; fall back to the date
    /// embedded in the URL, read as midnight UTC.
    fn published_at(&self, url: &str, html: &str) -> Result<DateTime<Utc>, &'static str> {
        let document = Html::parse_document(html);
        if let Some(content) = document
            .select(&PUBLISHED_META)
            .find_map(|el| el.value().attr("content"))
        {
            if let Ok(published) = DateTime::parse_from_rfc3339(content.trim()) {
                return Ok(published.with_timezone(&Utc));
            }
        }
        Self::date_in_url(url).ok_or("date-missing")
    }
}
