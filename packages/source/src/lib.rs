#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Street-level crime incident lookups.
//!
//! An incident source answers one question: which incidents were reported
//! near a coordinate during a given month. The [`IncidentSource`] trait is
//! the seam the enrichment engine drives; [`police::PoliceClient`] is the
//! production implementation backed by the public data.police.uk API.
//!
//! Lookups never retry internally and never abort a batch: a failed month
//! is a soft failure that contributes zero incidents. Request spacing is
//! enforced by the [`rate_limit::RateLimiter`] each client owns.

pub mod http;
pub mod police;
pub mod rate_limit;

use async_trait::async_trait;
use crime_enrich_crime_models::{Incident, Period};
use crime_enrich_property_models::Coordinate;

/// Errors that can occur during an incident lookup.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Status code returned.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response parsed as JSON but not in the expected shape.
    #[error("Unexpected payload: {message}")]
    Payload {
        /// Description of what went wrong.
        message: String,
    },
}

/// Something that can list incidents near a coordinate for one month.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"police_uk"`).
    fn id(&self) -> &str;

    /// Performs exactly one lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response cannot
    /// be understood.
    async fn try_fetch(
        &self,
        coordinate: Coordinate,
        period: Period,
    ) -> Result<Vec<Incident>, SourceError>;

    /// Performs exactly one lookup, degrading any failure to an empty list.
    async fn fetch(&self, coordinate: Coordinate, period: Period) -> Vec<Incident> {
        match self.try_fetch(coordinate, period).await {
            Ok(incidents) => incidents,
            Err(e) => {
                log::warn!(
                    "{}: lookup at {coordinate} for {period} failed, counting no incidents: {e}",
                    self.id()
                );
                Vec::new()
            }
        }
    }
}
