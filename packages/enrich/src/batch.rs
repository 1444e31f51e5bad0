//! Sequential batch enrichment.
//!
//! [`Enricher`] walks a list of property records in order and, for each
//! one, looks up every month of the shared window, aggregates the results,
//! and attaches a narrative plus the aggregate. A property that cannot be
//! enriched (bad coordinate, lookups failing on every attempt, or an
//! internal failure, panics included) comes back without crime fields; it
//! never stops the rest of the batch.
//!
//! Lookups are issued one at a time. Request spacing is the incident
//! source's job; the enricher only adds the fixed delay between retry
//! attempts for a property.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crime_enrich_crime_models::Period;
use crime_enrich_property_models::{
    Coordinate, CrimeLookup, EnrichedProperty, Enrichment, PropertyRecord, Unavailable,
};
use crime_enrich_source::IncidentSource;
use crime_enrich_source::rate_limit::{Clock, SystemClock};
use futures::FutureExt;

use crate::EnrichError;
use crate::aggregate::{self, PeriodIncidents};
use crate::narrative::{self, NarrativeContext};
use crate::progress::{ProgressCallback, null_progress};
use crate::{risk, trend};

/// Tunables for a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichOptions {
    /// Extra whole-property attempts when monthly lookups fail.
    pub max_retries: u32,
    /// Fixed delay before each extra attempt.
    pub retry_delay: Duration,
    /// Minimum incidents before a trend direction is called.
    pub min_incidents: u64,
    /// Search radius quoted in narratives, in kilometres.
    pub radius_km: f64,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::from_secs(2),
            min_incidents: trend::DEFAULT_MIN_INCIDENTS,
            radius_km: NarrativeContext::default().radius_km,
        }
    }
}

/// Outcome counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Properties that received crime fields.
    pub enriched: usize,
    /// Properties skipped for a missing or invalid coordinate.
    pub invalid_coordinates: usize,
    /// Properties whose lookups failed on every attempt.
    pub lookups_failed: usize,
    /// Properties lost to an internal error.
    pub internal_errors: usize,
}

impl EnrichStats {
    /// Tallies outcomes over a batch's results.
    #[must_use]
    pub fn from_results(results: &[EnrichedProperty]) -> Self {
        let mut stats = Self::default();
        for result in results {
            match &result.crime {
                CrimeLookup::Available(_) => stats.enriched += 1,
                CrimeLookup::Unavailable(Unavailable::InvalidCoordinate(_)) => {
                    stats.invalid_coordinates += 1;
                }
                CrimeLookup::Unavailable(Unavailable::LookupsFailed { .. }) => {
                    stats.lookups_failed += 1;
                }
                CrimeLookup::Unavailable(Unavailable::Internal { .. }) => {
                    stats.internal_errors += 1;
                }
            }
        }
        stats
    }

    /// Number of properties processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.enriched + self.invalid_coordinates + self.lookups_failed + self.internal_errors
    }
}

impl std::fmt::Display for EnrichStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Enriched {}/{} properties ({} invalid coordinates, {} lookups failed, {} internal errors)",
            self.enriched,
            self.total(),
            self.invalid_coordinates,
            self.lookups_failed,
            self.internal_errors,
        )
    }
}

/// Drives the enrichment pipeline over a batch of properties.
pub struct Enricher<S> {
    source: S,
    window: Vec<Period>,
    clock: Arc<dyn Clock>,
    options: EnrichOptions,
    progress: Arc<dyn ProgressCallback>,
}

impl<S: IncidentSource> Enricher<S> {
    /// Creates an enricher looking up `window` through `source`.
    #[must_use]
    pub fn new(source: S, window: Vec<Period>) -> Self {
        Self {
            source,
            window,
            clock: Arc::new(SystemClock),
            options: EnrichOptions::default(),
            progress: null_progress(),
        }
    }

    /// Uses `clock` for retry delays.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the default options.
    #[must_use]
    pub fn with_options(mut self, options: EnrichOptions) -> Self {
        self.options = options;
        self
    }

    /// Reports per-property progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The incident source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The shared month window, oldest first.
    #[must_use]
    pub fn window(&self) -> &[Period] {
        &self.window
    }

    /// Enriches every property in order. Always returns one result per
    /// input record.
    pub async fn enrich_all(&self, properties: Vec<PropertyRecord>) -> Vec<EnrichedProperty> {
        log::info!(
            "Enriching {} properties from {} over {} months ({}..{})",
            properties.len(),
            self.source.id(),
            self.window.len(),
            self.window.first().map(ToString::to_string).unwrap_or_default(),
            self.window.last().map(ToString::to_string).unwrap_or_default(),
        );
        self.progress.set_total(properties.len() as u64);

        let mut results = Vec::with_capacity(properties.len());
        for (index, record) in properties.into_iter().enumerate() {
            let key = record.id().unwrap_or_else(|| format!("#{}", index + 1));
            self.progress.set_message(format!("Property {key}"));

            let crime = match AssertUnwindSafe(self.enrich_one(&key, &record))
                .catch_unwind()
                .await
            {
                Ok(crime) => crime,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    log::error!("Enrichment of property {key} panicked: {message}");
                    CrimeLookup::Unavailable(Unavailable::Internal { message })
                }
            };

            results.push(EnrichedProperty { record, crime });
            self.progress.inc(1);
        }

        let stats = EnrichStats::from_results(&results);
        log::info!(
            "Enrichment complete: {} enriched, {} invalid coordinates, {} lookups failed, {} internal errors",
            stats.enriched,
            stats.invalid_coordinates,
            stats.lookups_failed,
            stats.internal_errors,
        );
        self.progress.finish(format!(
            "Enriched {}/{} properties",
            stats.enriched,
            stats.total()
        ));

        results
    }

    /// Runs the pipeline for a single record. `key` identifies the record
    /// in log lines.
    pub async fn enrich_one(&self, key: &str, record: &PropertyRecord) -> CrimeLookup {
        let coordinate = match record.coordinate() {
            Ok(coordinate) => coordinate,
            Err(e) => {
                log::warn!("Skipping property {key}: {e}");
                return CrimeLookup::Unavailable(Unavailable::InvalidCoordinate(e));
            }
        };

        let batches = match self.collect_incidents(key, coordinate).await {
            Ok(batches) => batches,
            Err(reason) => {
                log::warn!("Property {key} left unenriched: {reason}");
                return CrimeLookup::Unavailable(reason);
            }
        };

        match self.summarize(record, batches) {
            Ok(enrichment) => {
                log::debug!("Property {key}: {}", enrichment.summary);
                CrimeLookup::Available(enrichment)
            }
            Err(e) => {
                log::error!("Enrichment of property {key} failed: {e}");
                CrimeLookup::Unavailable(Unavailable::Internal {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Looks up every month of the window, re-running the whole window
    /// when any month fails and attempts remain.
    ///
    /// Once attempts run out, months that still failed count as zero
    /// unless every month failed.
    async fn collect_incidents(
        &self,
        key: &str,
        coordinate: Coordinate,
    ) -> Result<Vec<PeriodIncidents>, Unavailable> {
        let attempts = self.options.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            if attempt > 1 {
                log::warn!(
                    "  retry {}/{} for property {key} in {:?}...",
                    attempt - 1,
                    self.options.max_retries,
                    self.options.retry_delay
                );
                self.clock.sleep(self.options.retry_delay).await;
            }

            let mut batches = Vec::with_capacity(self.window.len());
            let mut failed = 0_usize;
            for &period in &self.window {
                match self.source.try_fetch(coordinate, period).await {
                    Ok(incidents) => batches.push(PeriodIncidents { period, incidents }),
                    Err(e) => {
                        log::warn!("  {period} lookup for property {key} failed: {e}");
                        failed += 1;
                        batches.push(PeriodIncidents::empty(period));
                    }
                }
            }

            if failed == 0 {
                return Ok(batches);
            }
            if attempt == attempts {
                if failed == self.window.len() {
                    return Err(Unavailable::LookupsFailed { attempts });
                }
                log::warn!(
                    "Property {key}: {failed}/{} months unavailable after {attempts} attempt(s), \
                     counting them as zero",
                    self.window.len()
                );
                return Ok(batches);
            }
        }

        Err(Unavailable::LookupsFailed { attempts })
    }

    fn summarize(
        &self,
        record: &PropertyRecord,
        batches: Vec<PeriodIncidents>,
    ) -> Result<Enrichment, EnrichError> {
        let aggregate = aggregate::aggregate(&self.window, batches)?;
        let trend = trend::classify(&aggregate.monthly_counts, self.options.min_incidents);
        let tier = risk::classify(aggregate.total);
        let data = aggregate.with_trend(trend);
        let context = NarrativeContext {
            radius_km: self.options.radius_km,
            window_months: self.window.len(),
        };
        let summary = narrative::render(&record.label(), &data, tier, &context);

        Ok(Enrichment {
            summary,
            data,
            tier,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use crime_enrich_crime_models::{Incident, RiskTier, Trend};
    use crime_enrich_property_models::CoordinateError;
    use crime_enrich_source::SourceError;
    use crime_enrich_source::rate_limit::{RateLimiter, VirtualClock};
    use serde_json::json;

    use super::*;
    use crate::period::recent_periods;

    const FAILING_LAT: f64 = 51.0;
    const PANIC_LAT: f64 = 52.0;

    struct ScriptedSource {
        incidents: BTreeMap<Period, Vec<Incident>>,
        failing: BTreeSet<Period>,
        limiter: RateLimiter,
        clock: Arc<VirtualClock>,
        calls: Mutex<Vec<(f64, Period, Instant)>>,
    }

    impl ScriptedSource {
        fn new(clock: Arc<VirtualClock>, spacing: Duration) -> Self {
            Self {
                incidents: BTreeMap::new(),
                failing: BTreeSet::new(),
                limiter: RateLimiter::new(spacing, clock.clone()),
                clock,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(f64, Period, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IncidentSource for ScriptedSource {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn try_fetch(
            &self,
            coordinate: Coordinate,
            period: Period,
        ) -> Result<Vec<Incident>, SourceError> {
            self.limiter.acquire().await;
            let lat = coordinate.latitude();
            self.calls
                .lock()
                .unwrap()
                .push((lat, period, self.clock.now()));

            assert!((lat - PANIC_LAT).abs() > f64::EPSILON, "scripted panic");
            if (lat - FAILING_LAT).abs() < f64::EPSILON || self.failing.contains(&period) {
                return Err(SourceError::Payload {
                    message: "scripted failure".to_string(),
                });
            }
            Ok(self.incidents.get(&period).cloned().unwrap_or_default())
        }
    }

    fn window() -> Vec<Period> {
        recent_periods(6, NaiveDate::from_ymd_opt(2024, 8, 18).unwrap())
    }

    fn incidents(period: Period, count: usize, street: &str) -> Vec<Incident> {
        (0..count)
            .map(|i| Incident {
                category: if i % 2 == 0 { "anti-social-behaviour" } else { "burglary" }.to_string(),
                outcome: None,
                street_label: Some(street.to_string()),
                period,
            })
            .collect()
    }

    fn property(id: &str, lat: f64) -> PropertyRecord {
        serde_json::from_value(json!({
            "property_id": id,
            "address": format!("{id} Mill Lane"),
            "lat": lat,
            "lng": -2.24,
        }))
        .unwrap()
    }

    fn options(max_retries: u32) -> EnrichOptions {
        EnrichOptions {
            max_retries,
            ..EnrichOptions::default()
        }
    }

    #[tokio::test]
    async fn documentation_example_is_rising_and_moderate() {
        let clock = Arc::new(VirtualClock::new());
        let w = window();
        let mut source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        for (period, count) in w.iter().zip([0, 0, 2, 4, 1, 2]) {
            source
                .incidents
                .insert(*period, incidents(*period, count, "On or near Mill Lane"));
        }

        let enricher = Enricher::new(source, w.clone()).with_clock(clock.clone());
        let results = enricher.enrich_all(vec![property("a", 53.48)]).await;

        let enrichment = results[0].crime.enrichment().unwrap();
        assert_eq!(enrichment.data.total, 9);
        assert_eq!(enrichment.data.trend, Trend::Rising);
        assert_eq!(enrichment.tier, RiskTier::Moderate);
        assert!(enrichment.data.is_consistent());
        assert_eq!(
            enrichment.data.monthly_counts.values().copied().collect::<Vec<_>>(),
            vec![0, 0, 2, 4, 1, 2]
        );
        assert!(enrichment.summary.contains("9 incidents"));
        assert!(enrichment.summary.contains("(near On or near Mill Lane)"));
        assert!(enrichment.summary.contains("mainly Anti Social Behaviour"));
    }

    #[tokio::test]
    async fn narrative_quotes_the_queried_window_length() {
        let clock = Arc::new(VirtualClock::new());
        let w = recent_periods(12, NaiveDate::from_ymd_opt(2024, 8, 18).unwrap());
        let mut source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        for period in &w {
            source.incidents.insert(*period, incidents(*period, 1, "High Street"));
        }

        let enricher = Enricher::new(source, w).with_clock(clock.clone());
        let results = enricher.enrich_all(vec![property("a", 53.48)]).await;

        let enrichment = results[0].crime.enrichment().unwrap();
        assert_eq!(enrichment.data.monthly_counts.len(), 12);
        assert!(
            enrichment.summary.contains("within 1km radius in past 12 months"),
            "{}",
            enrichment.summary
        );
    }

    #[tokio::test]
    async fn missing_coordinate_does_not_stop_the_batch() {
        let clock = Arc::new(VirtualClock::new());
        let source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        let enricher = Enricher::new(source, window()).with_clock(clock.clone());

        let missing: PropertyRecord =
            serde_json::from_value(json!({"property_id": "b", "lat": null, "lng": null})).unwrap();
        let results = enricher
            .enrich_all(vec![property("a", 53.48), missing, property("c", 53.49)])
            .await;

        let ids: Vec<Option<String>> = results.iter().map(|r| r.record.id()).collect();
        assert_eq!(
            ids,
            vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]
        );
        assert!(results[0].is_enriched());
        assert_eq!(
            results[1].crime,
            CrimeLookup::Unavailable(Unavailable::InvalidCoordinate(CoordinateError::Missing))
        );
        assert!(results[2].is_enriched());
        assert_eq!(enricher.source().calls().len(), 12);
    }

    #[tokio::test]
    async fn one_spaced_call_per_month_even_when_months_fail() {
        let clock = Arc::new(VirtualClock::new());
        let w = window();
        let mut source = ScriptedSource::new(clock.clone(), Duration::from_millis(250));
        source.failing.insert(w[1]);
        source.failing.insert(w[4]);
        source.incidents.insert(w[5], incidents(w[5], 3, "Park Road"));

        let enricher = Enricher::new(source, w.clone())
            .with_clock(clock.clone())
            .with_options(options(0));
        let results = enricher.enrich_all(vec![property("a", 53.48)]).await;

        let calls = enricher.source().calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls.iter().map(|c| c.1).collect::<Vec<_>>(), w);
        for pair in calls.windows(2) {
            assert!(pair[1].2.duration_since(pair[0].2) >= Duration::from_millis(250));
        }

        let data = &results[0].crime.enrichment().unwrap().data;
        assert_eq!(data.total, 3);
        assert_eq!(data.monthly_counts[&w[1]], 0);
        assert_eq!(data.monthly_counts[&w[4]], 0);
        assert_eq!(data.monthly_counts.len(), 6);
    }

    #[tokio::test]
    async fn failing_months_retry_the_whole_property() {
        let clock = Arc::new(VirtualClock::new());
        let w = window();
        let mut source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        source.failing.insert(w[2]);

        let enricher = Enricher::new(source, w)
            .with_clock(clock.clone())
            .with_options(options(2));
        let results = enricher.enrich_all(vec![property("a", 53.48)]).await;

        assert_eq!(enricher.source().calls().len(), 18);
        assert!(clock.elapsed() >= Duration::from_secs(4));
        assert!(results[0].is_enriched());
    }

    #[tokio::test]
    async fn exhausted_retries_leave_property_unenriched() {
        let clock = Arc::new(VirtualClock::new());
        let source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        let enricher = Enricher::new(source, window())
            .with_clock(clock.clone())
            .with_options(options(1));

        let results = enricher
            .enrich_all(vec![property("down", FAILING_LAT), property("up", 53.48)])
            .await;

        assert_eq!(
            results[0].crime,
            CrimeLookup::Unavailable(Unavailable::LookupsFailed { attempts: 2 })
        );
        assert!(results[1].is_enriched());

        let failing_calls = enricher
            .source()
            .calls()
            .iter()
            .filter(|c| (c.0 - FAILING_LAT).abs() < f64::EPSILON)
            .count();
        assert_eq!(failing_calls, 12);

        let value = serde_json::to_value(&results[0]).unwrap();
        assert!(value.get("crime_summary").is_none());
        assert!(value.get("crime_data").is_none());
    }

    #[tokio::test]
    async fn panicking_pipeline_is_isolated() {
        let clock = Arc::new(VirtualClock::new());
        let source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        let enricher = Enricher::new(source, window()).with_clock(clock.clone());

        let results = enricher
            .enrich_all(vec![property("boom", PANIC_LAT), property("fine", 53.48)])
            .await;

        assert!(matches!(
            &results[0].crime,
            CrimeLookup::Unavailable(Unavailable::Internal { message }) if message.contains("scripted panic")
        ));
        assert!(results[1].is_enriched());
        assert_eq!(EnrichStats::from_results(&results).internal_errors, 1);
    }

    #[tokio::test]
    async fn zero_incidents_is_still_enriched() {
        let clock = Arc::new(VirtualClock::new());
        let source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        let enricher = Enricher::new(source, window()).with_clock(clock.clone());

        let results = enricher.enrich_all(vec![property("a", 53.48)]).await;
        let enrichment = results[0].crime.enrichment().unwrap();
        assert_eq!(enrichment.data.total, 0);
        assert_eq!(enrichment.tier, RiskTier::Low);
        assert_eq!(enrichment.data.trend, Trend::InsufficientData);
        assert!(enrichment.summary.contains("Safe area"), "{}", enrichment.summary);

        let value = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(value["property_id"], "a");
        assert_eq!(value["crime_data"]["monthly_counts"].as_object().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn stats_cover_every_outcome() {
        let clock = Arc::new(VirtualClock::new());
        let source = ScriptedSource::new(clock.clone(), Duration::ZERO);
        let enricher = Enricher::new(source, window())
            .with_clock(clock.clone())
            .with_options(options(0));

        let results = enricher
            .enrich_all(vec![
                property("ok", 53.48),
                property("bad", 95.0),
                property("down", FAILING_LAT),
            ])
            .await;

        assert_eq!(
            EnrichStats::from_results(&results),
            EnrichStats {
                enriched: 1,
                invalid_coordinates: 1,
                lookups_failed: 1,
                internal_errors: 0,
            }
        );
    }

    #[test]
    fn stats_summary_names_every_outcome() {
        let stats = EnrichStats {
            enriched: 7,
            invalid_coordinates: 1,
            lookups_failed: 2,
            internal_errors: 1,
        };
        assert_eq!(
            stats.to_string(),
            "Enriched 7/11 properties (1 invalid coordinates, 2 lookups failed, 1 internal errors)"
        );
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
