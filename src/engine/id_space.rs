//! Walker over dense per-day article ID spaces.
//!
//! Outlets addressed this way publish articles at `{date}{sequence:06}`
//! slots, with sequences handed out densely from zero each day. Nothing
//! announces where a day's sequence ends, so the walker probes slots in
//! order and treats a long run of consecutive misses as the end-of-day
//! signal. A hard per-day ceiling bounds the probe count even when the
//! outlet keeps answering.

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::fetch::{Fetch, FetchOutcome, Pacing};
use crate::models::{reason, CrawlLimits, CrawlWindow, FailureTally, RawRecord};

use super::IdSpaceOutlet;

/// Walk one category's ID space across every day of the window, newest day
/// first.
///
/// Records are in-window by construction: the day is part of the slot
/// address, so no per-record timestamp filter is needed.
///
/// # Returns
///
/// Records in probe order plus the failure tally for the whole category.
#[instrument(level = "info", skip_all, fields(api = api))]
pub async fn crawl_category<O, F>(
    outlet: &O,
    api: &str,
    fetcher: &F,
    pacing: &Pacing,
    window: &CrawlWindow,
    limits: &CrawlLimits,
) -> (Vec<RawRecord>, FailureTally)
where
    O: IdSpaceOutlet,
    F: Fetch,
{
    let mut records = Vec::new();
    let mut tally = FailureTally::default();

    for day in window.days() {
        let day_records = scan_day(outlet, api, fetcher, pacing, limits, day, &mut tally).await;
        records.extend(day_records);
    }

    info!(
        records = records.len(),
        failures = tally.total(),
        "ID-space category crawled"
    );
    (records, tally)
}

/// Probe one day's sequence slots until the miss run or the ceiling ends it.
///
/// `fail_count` counts consecutive non-success fetches and resets on every
/// HTTP 200, whether or not the payload passes vetting; a rejected payload
/// still proves the ID space is alive. Vetting failures are tallied without
/// touching the counter.
async fn scan_day<O, F>(
    outlet: &O,
    api: &str,
    fetcher: &F,
    pacing: &Pacing,
    limits: &CrawlLimits,
    day: NaiveDate,
    tally: &mut FailureTally,
) -> Vec<RawRecord>
where
    O: IdSpaceOutlet,
    F: Fetch,
{
    let mut records = Vec::new();
    let mut fail_count = 0u32;

    for seq in 0..limits.daily_id_ceiling {
        // No more news to crawl today.
        if fail_count >= limits.continue_fail_count {
            debug!(%day, seq, fail_count, "day exhausted");
            break;
        }

        let url = outlet.article_url(api, day, seq);
        match fetcher.get(&url).await {
            FetchOutcome::Success(body) => {
                fail_count = 0;
                match outlet.inspect(&body) {
                    Ok(()) => records.push(RawRecord {
                        company_id: outlet.company_id(),
                        url_pattern: outlet.url_pattern(day, seq),
                        raw_content: body,
                    }),
                    Err(why) => {
                        debug!(%url, why, "payload rejected");
                        tally.bump(why);
                    }
                }
                pacing.after_success().await;
            }
            FetchOutcome::Banned => {
                warn!(%url, "banned; cooling down");
                tally.bump(reason::BANNED);
                pacing.after_ban().await;
                fail_count += 1;
            }
            FetchOutcome::NotFound => {
                tally.bump(reason::NOT_FOUND);
                fail_count += 1;
            }
            FetchOutcome::Transient => {
                tally.bump(reason::TRANSIENT);
                fail_count += 1;
            }
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use crate::engine::fixtures::FakeIdSpace;
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

    fn one_day_window() -> CrawlWindow {
        // days() yields exactly 2023-01-02.
        CrawlWindow::new(utc(2023, 1, 1, 0), utc(2023, 1, 2, 0)).unwrap()
    }

    fn limits(fail: u32, ceiling: u32) -> CrawlLimits {
        CrawlLimits {
            continue_fail_count: fail,
            daily_id_ceiling: ceiling,
            scan_fail_limit: 5,
        }
    }

    fn slot_url(day: &str, seq: u32) -> String {
        format!("https://ids.test/77/{day}{seq:06}")
    }

    #[tokio::test]
    async fn test_day_scan_stops_after_exact_fail_run() {
        let fetcher = ScriptedFetcher::new();
        let (records, tally) = crawl_category(
            &FakeIdSpace,
            "77",
            &fetcher,
            &Pacing::instant(),
            &one_day_window(),
            &limits(3, 100),
        )
        .await;

        // Exactly three misses, then the scan ends without another probe.
        assert_eq!(fetcher.calls(), 3);
        assert!(records.is_empty());
        assert_eq!(tally.get(reason::NOT_FOUND), 3);
    }

    #[tokio::test]
    async fn test_success_resets_the_fail_run() {
        let fetcher = ScriptedFetcher::new().ok(slot_url("20230102", 2), "an article");
        let (records, _) = crawl_category(
            &FakeIdSpace,
            "77",
            &fetcher,
            &Pacing::instant(),
            &one_day_window(),
            &limits(3, 100),
        )
        .await;

        // Two misses, a hit that resets the counter, then three fresh misses.
        assert_eq!(fetcher.calls(), 6);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url_pattern, "20230102000002");
        assert_eq!(records[0].company_id, 901);
    }

    #[tokio::test]
    async fn test_ceiling_bounds_the_day() {
        let fetcher = ScriptedFetcher::new();
        let (_, tally) = crawl_category(
            &FakeIdSpace,
            "77",
            &fetcher,
            &Pacing::instant(),
            &one_day_window(),
            &limits(100, 4),
        )
        .await;

        assert_eq!(fetcher.calls(), 4);
        assert_eq!(tally.get(reason::NOT_FOUND), 4);
    }

    #[tokio::test]
    async fn test_rejected_payload_resets_counter_without_emitting() {
        let fetcher = ScriptedFetcher::new().ok(slot_url("20230102", 1), "login wall");
        let (records, tally) = crawl_category(
            &FakeIdSpace,
            "77",
            &fetcher,
            &Pacing::instant(),
            &one_day_window(),
            &limits(2, 100),
        )
        .await;

        // miss, rejected-200 (counter back to zero), then two fresh misses.
        assert_eq!(fetcher.calls(), 4);
        assert!(records.is_empty());
        assert_eq!(tally.get("article-body-missing"), 1);
        assert_eq!(tally.get(reason::NOT_FOUND), 3);
    }

    #[tokio::test]
    async fn test_ban_counts_toward_the_fail_run() {
        let fetcher = ScriptedFetcher::new().on(slot_url("20230102", 0), FetchOutcome::Banned);
        let (_, tally) = crawl_category(
            &FakeIdSpace,
            "77",
            &fetcher,
            &Pacing::instant(),
            &one_day_window(),
            &limits(2, 100),
        )
        .await;

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(tally.get(reason::BANNED), 1);
        assert_eq!(tally.get(reason::NOT_FOUND), 1);
    }

    #[tokio::test]
    async fn test_single_hit_day_inside_multi_day_window() {
        // Window covers the 3rd and the 2nd; only 20230102000001 exists.
        let window = CrawlWindow::new(utc(2023, 1, 1, 0), utc(2023, 1, 3, 0)).unwrap();
        let fetcher = ScriptedFetcher::new().ok(slot_url("20230102", 1), "the article");

        let (records, _) = crawl_category(
            &FakeIdSpace,
            "77",
            &fetcher,
            &Pacing::instant(),
            &window,
            &limits(20, 64),
        )
        .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url_pattern, "20230102000001");
        // Newest day first: the very first probe is the 3rd's slot zero.
        assert_eq!(fetcher.requested()[0], slot_url("20230103", 0));
        // The hit reset the counter, so the day ran 20 misses past it.
        let day_two_probes = fetcher
            .requested()
            .iter()
            .filter(|url| url.contains("20230102"))
            .count();
        assert_eq!(day_two_probes, 22);
    }
}
