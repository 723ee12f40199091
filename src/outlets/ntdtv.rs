//! ntdtv.com adapter.
//!
//! Listings are reverse-chronological WordPress-style pages:
//!
//! ```text
//! https://www.ntdtv.com/b5/prog{api}/{page}
//! ```
//!
//! # URL Pattern
//!
//! Article URLs carry their publication date, which lets page-range
//! discovery date a listing without fetching a single article:
//!
//! ```text
//! https://www.ntdtv.com/b5/2023/01/11/a103629200.html
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{absolutize, Outlet};
use crate::engine::PagedOutlet;
use crate::models::Category;

/// Site prefix shared by listings and articles.
pub const COMPANY_URL: &str = "https://www.ntdtv.com/b5/";

/// Pages crawled between storage commits.
const COMMIT_PAGE_INTERVAL: u32 = 50;

/// Category table as the outlet publishes it.
pub const CATEGORIES: &[Category] = &[
    Category { name: "國際", api: "202" },
    Category { name: "港澳", api: "205" },
    Category { name: "財經", api: "208" },
    Category { name: "健康", api: "1255" },
    Category { name: "體育", api: "211" },
    Category { name: "美國", api: "203" },
    Category { name: "大陸", api: "204" },
    Category { name: "文史", api: "647" },
];

static ARTICLE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://www\.ntdtv\.com/b5/(\d{4})/(\d{2})/(\d{2})/a\d+\.html$").unwrap()
});

static PAGE_NUMBERS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.pagination > a.page-numbers").unwrap());

static LISTED_TITLES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.post_list > div.list_wrapper > div.one_post div.title > a").unwrap()
});

static PUBLISHED_META: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[property=\"article:published_time\"]").unwrap());

/// Paged adapter for ntdtv.
#[derive(Debug, Clone, Copy)]
pub struct Ntdtv;

impl Ntdtv {
    fn date_in_url(url: &str) -> Option<DateTime<Utc>> {
        let caps = ARTICLE_URL.captures(url)?;
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }
}

impl PagedOutlet for Ntdtv {
    fn company_id(&self) -> i64 {
        Outlet::Ntdtv.company_id()
    }

    fn commit_page_interval(&self) -> u32 {
        COMMIT_PAGE_INTERVAL
    }

    fn listing_url(&self, api: &str, page: u32) -> String {
        format!("{COMPANY_URL}prog{api}/{page}")
    }

    /// The pagination strip ends with a next-arrow, so the highest page
    /// number sits second to last. Counts over 999 are rendered with a
    /// thousands separator.
    fn max_page(&self, html: &str) -> Option<u32> {
        let document = Html::parse_document(html);
        let entries: Vec<String> = document
            .select(&PAGE_NUMBERS)
            .map(|el| el.text().collect::<String>())
            .collect();
        if entries.len() < 2 {
            return None;
        }
        entries[entries.len() - 2].trim().replace(',', "").parse().ok()
    }

    fn listed_dates(&self, html: &str) -> Vec<DateTime<Utc>> {
        self.article_links(COMPANY_URL, html)
            .iter()
            .filter_map(|url| Self::date_in_url(url))
            .collect()
    }

    fn article_links(&self, base: &str, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&LISTED_TITLES)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| absolutize(base, href))
            .collect()
    }

    fn url_pattern(&self, url: &str) -> Option<String> {
        if !ARTICLE_URL.is_match(url) {
            return None;
        }
        let stem = url.strip_prefix(COMPANY_URL)?;
        Some(stem.strip_suffix(".html").unwrap_or(stem).to_string())
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
