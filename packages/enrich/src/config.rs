//! Enrichment configuration.
//!
//! Defaults live in `config/default.toml`, embedded at compile time. A user
//! file passed with `--config` replaces it; any key the user file leaves
//! out falls back to the built-in default.

use std::path::Path;
use std::time::Duration;

use crime_enrich_source::police::PoliceConfig;
use serde::Deserialize;

use crate::EnrichError;
use crate::batch::EnrichOptions;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Full enrichment configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Incident API connection settings.
    pub police: PoliceConfig,
    /// Lookback window.
    pub window: WindowConfig,
    /// Per-property retry policy.
    pub retry: RetryConfig,
    /// Trend classification.
    pub trend: TrendConfig,
    /// Narrative wording.
    pub narrative: NarrativeConfig,
}

/// Lookback window settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of calendar months, current month included.
    pub months: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { months: 6 }
    }
}

/// Per-property retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after the first when monthly lookups fail.
    pub max_retries: u32,
    /// Fixed delay before each extra attempt, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay_ms: 2000,
        }
    }
}

/// Trend classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Minimum incidents across the window before a direction is called.
    pub min_incidents: u64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_incidents: crate::trend::DEFAULT_MIN_INCIDENTS,
        }
    }
}

/// Narrative settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Search radius quoted in the narrative, in kilometres.
    pub radius_km: f64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self { radius_km: 1.0 }
    }
}

impl EnrichConfig {
    /// The built-in configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `config/default.toml` is malformed (a
    /// compile-time guarantee, covered by tests).
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(DEFAULT_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Config`] if the text is not valid TOML or has
    /// keys of the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, EnrichError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Loads the configuration from `path`, or the built-in one when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, EnrichError> {
        let Some(path) = path else {
            return Ok(Self::embedded());
        };
        log::info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Engine options derived from this configuration.
    #[must_use]
    pub fn options(&self) -> EnrichOptions {
        EnrichOptions {
            max_retries: self.retry.max_retries,
            retry_delay: Duration::from_millis(self.retry.delay_ms),
            min_incidents: self.trend.min_incidents,
            radius_km: self.narrative.radius_km,
        }
    }
}
