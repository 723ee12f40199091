//! Data models shared by the crawl engine, the outlet adapters, and storage.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawRecord`]: One fetched article payload, keyed for deduplication
//! - [`CrawlWindow`]: The validated UTC time window a run is allowed to touch
//! - [`FailureTally`]: Per-reason failure counts returned from every crawl
//! - [`CrawlLimits`]: Explicit bounds for the walker and locator loops
//! - [`Category`]: One entry of an outlet's static category table
//! - Report types: [`CategoryReport`], [`OutletReport`], [`RunSummary`]
//!
//! Failure counts travel as values through return types rather than living in
//! shared state, so callers can merge and report them per category, per
//! outlet, and per run.

use std::collections::BTreeMap;
use std::error::Error;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

/// Tally keys shared by the fetch classifier and the crawl loops.
///
/// Outlet adapters add their own keys for parse-level rejections
/// (for example `article-body-missing` or `date-missing`).
pub mod reason {
    /// The outlet answered HTTP 403; the crawler backs off before continuing.
    pub const BANNED: &str = "banned";
    /// The outlet answered HTTP 404; for ID-space outlets this is the common
    /// "hole in the sequence" signal.
    pub const NOT_FOUND: &str = "not-found";
    /// Any other HTTP status, or a transport-level failure such as a timeout.
    pub const TRANSIENT: &str = "transient";
}

/// A raw article exactly as fetched, ready for deduplicated persistence.
///
/// The crawler never parses article fields out of the payload; downstream
/// pipelines work from `raw_content`. The storage row index is assigned by
/// SQLite on insert and is not part of this struct.
///
/// # Fields
///
/// * `company_id` - Fixed numeric identity of the outlet
/// * `url_pattern` - Outlet-relative identifier derived from the article URL;
///   unique per `company_id` in storage and stable across runs
/// * `raw_content` - The unparsed response body, stored verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Fixed numeric identity of the outlet this article belongs to.
    pub company_id: i64,
    /// Normalized dedup key, e.g. `20230102000001` or `2023/01/02/a103629200`.
    pub url_pattern: String,
    /// The fetched payload, unmodified.
    pub raw_content: String,
}

/// The UTC time window a run is allowed to harvest.
///
/// Constructed through [`CrawlWindow::new`], which rejects an inverted window
/// before any storage or network activity happens. Both bounds are inclusive
/// for article timestamps; day iteration steps back from `current` and stops
/// once the cursor is no newer than `past`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlWindow {
    past: DateTime<Utc>,
    current: DateTime<Utc>,
}

impl CrawlWindow {
    /// Validate and build a window from its oldest and newest bounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `past` is later than `current`.
    pub fn new(past: DateTime<Utc>, current: DateTime<Utc>) -> Result<Self, Box<dyn Error>> {
        if past > current {
            return Err("Must have `past <= current`.".into());
        }
        Ok(Self { past, current })
    }

    /// Oldest instant the run may touch.
    pub fn past(&self) -> DateTime<Utc> {
        self.past
    }

    /// Newest instant the run may touch.
    pub fn current(&self) -> DateTime<Utc> {
        self.current
    }

    /// Whether `t` falls inside the window, inclusive at both ends.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.past <= t && t <= self.current
    }

    /// Calendar days to scan, newest first.
    ///
    /// Walks a cursor back from `current` in whole days while it is strictly
    /// newer than `past`, so a window from `01-01T00:00` to `01-03T00:00`
    /// yields the 3rd and the 2nd but not the 1st.
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut cursor = self.current;
        while cursor > self.past {
            days.push(cursor.date_naive());
            cursor = cursor - Duration::days(1);
        }
        days
    }
}

/// Failure counts keyed by a short reason string.
///
/// Every crawl invocation returns one of these alongside its records; callers
/// merge tallies upward instead of mutating shared counters. The map is
/// ordered so logs and summaries come out deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FailureTally {
    counts: BTreeMap<String, u64>,
}

impl FailureTally {
    /// Count one failure under `reason`.
    pub fn bump(&mut self, reason: &str) {
        *self.counts.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Fold another tally into this one.
    pub fn merge(&mut self, other: &FailureTally) {
        for (reason, count) in &other.counts {
            *self.counts.entry(reason.clone()).or_insert(0) += count;
        }
    }

    /// Count recorded under `reason`, zero when absent.
    pub fn get(&self, reason: &str) -> u64 {
        self.counts.get(reason).copied().unwrap_or(0)
    }

    /// Total failures across all reasons.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// True when nothing failed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(reason, count)` pairs in reason order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(reason, count)| (reason.as_str(), *count))
    }
}

/// Explicit bounds for the crawl loops.
///
/// These were tuning constants buried in earlier crawler generations; keeping
/// them together and caller-supplied makes day-scan and discovery termination
/// testable with small numbers.
#[derive(Debug, Clone)]
pub struct CrawlLimits {
    /// Consecutive non-success fetches that end one day's ID-space scan.
    pub continue_fail_count: u32,
    /// Hard ceiling on sequence numbers probed per day, whatever the
    /// fail counter says.
    pub daily_id_ceiling: u32,
    /// Consecutive listing-fetch failures that abort page-range discovery.
    pub scan_fail_limit: u32,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            continue_fail_count: 5_000,
            daily_id_ceiling: 100_000,
            scan_fail_limit: 5,
        }
    }
}

/// One entry of an outlet's static category table.
///
/// `api` is the opaque outlet-side identifier spliced into URLs: a numeric
/// code for some outlets, an `nsc` slug for others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    /// Human-readable category name, as the outlet labels it.
    pub name: &'static str,
    /// Outlet-side identifier used when building listing or article URLs.
    pub api: &'static str,
}

/// Outcome of crawling one category: volume in, volume kept, what failed.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    /// Category name from the outlet's table.
    pub category: String,
    /// Records produced by the crawl, before deduplication.
    pub fetched: usize,
    /// Records that survived deduplication and were committed.
    pub inserted: usize,
    /// Failures observed while crawling this category.
    pub failures: FailureTally,
}

/// Outcome of crawling one outlet across its whole category table.
#[derive(Debug, Clone, Serialize)]
pub struct OutletReport {
    /// Outlet label, e.g. `chinatimes`.
    pub outlet: String,
    /// Per-category outcomes, in table order.
    pub categories: Vec<CategoryReport>,
}

impl OutletReport {
    /// Records committed across all categories.
    pub fn inserted(&self) -> usize {
        self.categories.iter().map(|c| c.inserted).sum()
    }

    /// All failures across all categories, merged.
    pub fn failures(&self) -> FailureTally {
        let mut tally = FailureTally::default();
        for category in &self.categories {
            tally.merge(&category.failures);
        }
        tally
    }
}

/// Whole-run summary, serialized to JSON when `--summary` is given.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Oldest bound of the crawled window.
    pub past: DateTime<Utc>,
    /// Newest bound of the crawled window.
    pub current: DateTime<Utc>,
    /// Records committed across all outlets.
    pub inserted: usize,
    /// Failures across all outlets, merged.
    pub failures: FailureTally,
    /// Per-outlet outcomes.
    pub outlets: Vec<OutletReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let err = CrawlWindow::new(utc(2023, 1, 3, 0), utc(2023, 1, 1, 0)).unwrap_err();
        assert!(err.to_string().contains("past <= current"));
    }

    #[test]
    fn test_window_accepts_equal_bounds() {
        let window = CrawlWindow::new(utc(2023, 1, 1, 12), utc(2023, 1, 1, 12)).unwrap();
        assert!(window.contains(utc(2023, 1, 1, 12)));
        assert!(window.days().is_empty());
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let window = CrawlWindow::new(utc(2023, 1, 1, 0), utc(2023, 1, 3, 0)).unwrap();
        assert!(window.contains(utc(2023, 1, 1, 0)));
        assert!(window.contains(utc(2023, 1, 3, 0)));
        assert!(window.contains(utc(2023, 1, 2, 15)));
        assert!(!window.contains(utc(2022, 12, 31, 23)));
        assert!(!window.contains(utc(2023, 1, 3, 1)));
    }

    #[test]
    fn test_window_days_newest_first_excluding_past_day() {
        let window = CrawlWindow::new(utc(2023, 1, 1, 0), utc(2023, 1, 3, 0)).unwrap();
        assert_eq!(
            window.days(),
            vec![
                NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            ]
        );
    }

    #[test]
    fn test_window_days_includes_past_day_with_partial_overlap() {
        // A mid-day floor leaves part of its own calendar day in the window.
        let window = CrawlWindow::new(utc(2023, 1, 1, 6), utc(2023, 1, 2, 18)).unwrap();
        assert_eq!(
            window.days(),
            vec![
                NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_tally_bump_and_get() {
        let mut tally = FailureTally::default();
        tally.bump(reason::NOT_FOUND);
        tally.bump(reason::NOT_FOUND);
        tally.bump(reason::BANNED);
        assert_eq!(tally.get(reason::NOT_FOUND), 2);
        assert_eq!(tally.get(reason::BANNED), 1);
        assert_eq!(tally.get(reason::TRANSIENT), 0);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_tally_merge() {
        let mut left = FailureTally::default();
        left.bump(reason::BANNED);
        let mut right = FailureTally::default();
        right.bump(reason::BANNED);
        right.bump("date-missing");

        left.merge(&right);
        assert_eq!(left.get(reason::BANNED), 2);
        assert_eq!(left.get("date-missing"), 1);
        assert!(right.get(reason::BANNED) == 1, "merge must not drain the source");
    }

    #[test]
    fn test_tally_serializes_as_plain_map() {
        let mut tally = FailureTally::default();
        tally.bump(reason::TRANSIENT);
        let json = serde_json::to_string(&tally).unwrap();
        assert_eq!(json, r#"{"transient":1}"#);
    }

    #[test]
    fn test_limits_defaults() {
        let limits = CrawlLimits::default();
        assert_eq!(limits.continue_fail_count, 5_000);
        assert_eq!(limits.daily_id_ceiling, 100_000);
        assert_eq!(limits.scan_fail_limit, 5);
    }

    #[test]
    fn test_outlet_report_rollups() {
        let mut failures = FailureTally::default();
        failures.bump(reason::NOT_FOUND);
        let report = OutletReport {
            outlet: "ntdtv".to_string(),
            categories: vec![
                CategoryReport {
                    category: "國際".to_string(),
                    fetched: 4,
                    inserted: 3,
                    failures: failures.clone(),
                },
                CategoryReport {
                    category: "財經".to_string(),
                    fetched: 2,
                    inserted: 2,
                    failures,
                },
            ],
        };

        assert_eq!(report.inserted(), 5);
        assert_eq!(report.failures().get(reason::NOT_FOUND), 2);
    }

    #[test]
    fn test_run_summary_serialization() {
        let summary = RunSummary {
            past: utc(2023, 1, 1, 0),
            current: utc(2023, 1, 3, 0),
            inserted: 7,
            failures: FailureTally::default(),
            outlets: vec![],
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("2023-01-01"));
        assert!(json.contains("\"inserted\":7"));
    }
}
