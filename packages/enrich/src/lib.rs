#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime aggregation and enrichment engine.
//!
//! For every property coordinate the engine builds a rolling window of
//! calendar months, looks up incidents for each month through an
//! [`IncidentSource`](crime_enrich_source::IncidentSource), aggregates them,
//! classifies the trend and risk tier, and renders a one-line narrative.
//! [`batch::Enricher`] drives the whole pipeline over a list of records.
//!
//! Pipeline stages, leaves first:
//!
//! 1. [`period`]: the shared month window
//! 2. [`aggregate`]: category, street, outcome, and monthly tallies
//! 3. [`trend`]: rising / falling / stable / insufficient data
//! 4. [`risk`]: low / moderate / high
//! 5. [`narrative`]: the `crime_summary` sentence
//! 6. [`batch`]: sequential, failure-isolated driver

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod narrative;
pub mod period;
pub mod progress;
pub mod risk;
pub mod trend;

pub use batch::{EnrichOptions, EnrichStats, Enricher};
pub use config::EnrichConfig;

/// Errors raised by the enrichment engine.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// Aggregation produced inconsistent results or received data it
    /// cannot place in the window.
    #[error("Aggregation error: {message}")]
    Aggregation {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Incident source could not be set up.
    #[error("Source error: {0}")]
    Source(#[from] crime_enrich_source::SourceError),
}
