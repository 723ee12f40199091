//! HTTP fetching, response classification, and crawl pacing.
//!
//! Every crawl loop in this crate drives its network access through the
//! [`Fetch`] trait, so the engines can be exercised in tests without a
//! server on the other end.
//!
//! # Architecture
//!
//! - [`classify_status`]: Pure mapping from HTTP status to [`FetchKind`]
//! - [`FetchOutcome`]: Tagged result of one exchange; `Success` carries the body
//! - [`Fetch`]: Core trait the engines are generic over
//! - [`HttpFetcher`]: `reqwest`-backed implementation with timeout and UA
//! - [`Pacing`]: The two delays that keep the crawler under the radar
//!
//! # Classification
//!
//! | Observation                    | Outcome     |
//! |--------------------------------|-------------|
//! | HTTP 200                       | `Success`   |
//! | HTTP 403                       | `Banned`    |
//! | HTTP 404                       | `NotFound`  |
//! | any other status               | `Transient` |
//! | transport error / timeout      | `Transient` |

use std::error::Error;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Browser-like user agent sent with every request.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How one HTTP exchange is interpreted by the crawl loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// The target exists and its payload was delivered.
    Success,
    /// The outlet's anti-scraping layer refused us.
    Banned,
    /// The target does not exist.
    NotFound,
    /// Anything else; worth another try on a later run.
    Transient,
}

/// Classify an HTTP status code.
///
/// Pure and total: 200 is `Success`, 403 is `Banned`, 404 is `NotFound`,
/// every other status is `Transient`.
pub fn classify_status(status: u16) -> FetchKind {
    match status {
        200 => FetchKind::Success,
        403 => FetchKind::Banned,
        404 => FetchKind::NotFound,
        _ => FetchKind::Transient,
    }
}

/// The classified result of fetching one URL.
///
/// Failures are values here, not errors: the crawl loops branch on the tag
/// and keep going, tallying what they skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200, with the response body.
    Success(String),
    /// HTTP 403.
    Banned,
    /// HTTP 404.
    NotFound,
    /// Unexpected status or transport failure, timeouts included.
    Transient,
}

impl FetchOutcome {
    /// The classification without the payload.
    pub fn kind(&self) -> FetchKind {
        match self {
            FetchOutcome::Success(_) => FetchKind::Success,
            FetchOutcome::Banned => FetchKind::Banned,
            FetchOutcome::NotFound => FetchKind::NotFound,
            FetchOutcome::Transient => FetchKind::Transient,
        }
    }
}

/// Trait for fetching and classifying one URL.
///
/// Implementors never return an error; whatever happens on the wire is
/// folded into the [`FetchOutcome`] tag so callers have exactly four cases
/// to handle.
pub trait Fetch {
    /// Fetch `url` and classify the exchange.
    async fn get(&self, url: &str) -> FetchOutcome;
}

/// `reqwest`-backed [`Fetch`] implementation.
///
/// One shared client carries the connection pool, the per-request timeout,
/// and the user agent. Redirects follow reqwest's default policy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> FetchOutcome {
        let t0 = Instant::now();
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "request failed in transit"
                );
                return FetchOutcome::Transient;
            }
        };

        let status = response.status().as_u16();
        match classify_status(status) {
            FetchKind::Success => match response.text().await {
                Ok(body) => {
                    debug!(bytes = body.len(), "fetched");
                    FetchOutcome::Success(body)
                }
                Err(e) => {
                    warn!(error = %e, "body read failed");
                    FetchOutcome::Transient
                }
            },
            FetchKind::Banned => {
                warn!(status, "refused by the outlet");
                FetchOutcome::Banned
            }
            FetchKind::NotFound => {
                debug!("not found");
                FetchOutcome::NotFound
            }
            FetchKind::Transient => {
                warn!(status, "unexpected status");
                FetchOutcome::Transient
            }
        }
    }
}

/// The two delays that keep a serialized crawl under the radar.
///
/// `after_success` is a short breather invoked by every fetch loop after
/// every `Success`, including successful fetches whose payload is later
/// rejected by an adapter. `after_ban` is the long cooldown invoked whenever
/// a 403 is observed, before any further request goes out.
#[derive(Debug, Clone)]
pub struct Pacing {
    pace: Duration,
    cooldown: Duration,
}

impl Pacing {
    /// Policy with explicit delays.
    pub fn new(pace: Duration, cooldown: Duration) -> Self {
        Self { pace, cooldown }
    }

    /// Zero-delay policy for tests.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Breathe after a successful fetch.
    pub async fn after_success(&self) {
        if !self.pace.is_zero() {
            sleep(self.pace).await;
        }
    }

    /// Cool down after the outlet refused us.
    pub async fn after_ban(&self) {
        if !self.cooldown.is_zero() {
            debug!(cooldown_ms = self.cooldown.as_millis() as u64, "cooling down after ban");
            sleep(self.cooldown).await;
        }
    }
}

impl Default for Pacing {
    /// One second between successful fetches, one minute after a ban.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}
