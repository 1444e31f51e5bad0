//! data.police.uk street-level crime client.
//!
//! One request per (coordinate, month) against the `crimes-street`
//! endpoint, which returns every crime recorded within a fixed radius of
//! the point:
//!
//! ```text
//! GET {base_url}?lat=53.4808&lng=-2.2426&date=2024-05
//! ```
//!
//! The response is a JSON array of crime objects. Only `category` is
//! required; `outcome_status.category` and `location.street.name` are
//! read when present. Any other shape is a payload error.
//!
//! See <https://data.police.uk/docs/method/crime-street/>

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use crime_enrich_crime_models::{Incident, Period};
use crime_enrich_property_models::Coordinate;
use serde::Deserialize;

use crate::rate_limit::{Clock, RateLimiter, SystemClock};
use crate::{IncidentSource, SourceError, http};

/// Connection settings for the street-level crime API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoliceConfig {
    /// Endpoint URL (e.g., `"https://data.police.uk/api/crimes-street/all-crime"`).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for PoliceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.police.uk/api/crimes-street/all-crime".to_string(),
            timeout_secs: 20,
            rate_limit_ms: 250,
            user_agent: concat!("crime_enrich/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Request counters for one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Requests issued, failed ones included.
    pub calls: u64,
    /// Requests that ended in a soft failure.
    pub soft_failures: u64,
}

/// Rate-limited client for the street-level crime endpoint.
#[derive(Debug)]
pub struct PoliceClient {
    client: reqwest::Client,
    config: PoliceConfig,
    limiter: RateLimiter,
    calls: AtomicU64,
    soft_failures: AtomicU64,
}

impl PoliceClient {
    /// Creates a client that spaces requests on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: PoliceConfig) -> Result<Self, SourceError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a client that spaces requests on `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn with_clock(config: PoliceConfig, clock: Arc<dyn Clock>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        let limiter = RateLimiter::new(Duration::from_millis(config.rate_limit_ms), clock);

        Ok(Self {
            client,
            config,
            limiter,
            calls: AtomicU64::new(0),
            soft_failures: AtomicU64::new(0),
        })
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &PoliceConfig {
        &self.config
    }

    /// Request counters so far.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            calls: self.calls.load(Ordering::Relaxed),
            soft_failures: self.soft_failures.load(Ordering::Relaxed),
        }
    }

    async fn request(
        &self,
        coordinate: Coordinate,
        period: Period,
    ) -> Result<Vec<Incident>, SourceError> {
        let query = [
            ("lat", coordinate.latitude().to_string()),
            ("lng", coordinate.longitude().to_string()),
            ("date", period.to_string()),
        ];
        log::debug!("police_uk: GET {} {query:?}", self.config.base_url);

        let body = http::send_json(self.client.get(&self.config.base_url).query(&query)).await?;
        parse_incidents(body, period)
    }
}

#[async_trait]
impl IncidentSource for PoliceClient {
    fn id(&self) -> &str {
        "police_uk"
    }

    async fn try_fetch(
        &self,
        coordinate: Coordinate,
        period: Period,
    ) -> Result<Vec<Incident>, SourceError> {
        self.limiter.acquire().await;
        self.calls.fetch_add(1, Ordering::Relaxed);

        let result = self.request(coordinate, period).await;
        if result.is_err() {
            self.soft_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

#[derive(Debug, Deserialize)]
struct RawCrime {
    category: String,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    outcome_status: Option<RawOutcome>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default)]
    street: Option<RawStreet>,
}

#[derive(Debug, Deserialize)]
struct RawStreet {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutcome {
    #[serde(default)]
    category: Option<String>,
}

/// Converts a `crimes-street` response body into incidents for `period`.
///
/// A `null` body means the month had no data and yields no incidents.
///
/// # Errors
///
/// Returns [`SourceError::Payload`] if the body is not an array of crime
/// objects each carrying a string `category`.
pub fn parse_incidents(body: serde_json::Value, period: Period) -> Result<Vec<Incident>, SourceError> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    if !body.is_array() {
        return Err(SourceError::Payload {
            message: "crimes-street response is not an array".to_string(),
        });
    }

    let raw: Vec<RawCrime> = serde_json::from_value(body).map_err(|e| SourceError::Payload {
        message: format!("crimes-street element has unexpected shape: {e}"),
    })?;

    Ok(raw
        .into_iter()
        .map(|crime| Incident {
            category: crime.category,
            outcome: crime
                .outcome_status
                .and_then(|outcome| non_blank(outcome.category)),
            street_label: crime
                .location
                .and_then(|location| location.street)
                .and_then(|street| non_blank(street.name)),
            period,
        })
        .collect())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
