#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident, period, and crime aggregate types.
//!
//! These are the shapes shared by the incident client, the aggregation
//! engine, and the enriched property records handed back to callers.
//! [`CrimeData`] is the `crime_data` object attached to each listing.

pub mod period;
pub mod tally;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use period::{InvalidPeriodError, Period};
pub use tally::Tally;

/// One reported crime near a coordinate.
///
/// Only the incident client creates these; the aggregator consumes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Crime category slug as reported (e.g., `"anti-social-behaviour"`).
    pub category: String,
    /// Latest outcome status, when one has been recorded.
    pub outcome: Option<String>,
    /// Approximate location label (e.g., `"On or near Park Road"`).
    pub street_label: Option<String>,
    /// Month the incident was reported in.
    pub period: Period,
}

/// Direction of the monthly incident series.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    /// Recent months saw more incidents than earlier months.
    Rising,
    /// Recent months saw fewer incidents than earlier months.
    Falling,
    /// Both halves of the window saw the same number of incidents.
    Stable,
    /// Too few incidents to infer a direction.
    InsufficientData,
}

impl Trend {
    /// Phrase used in the narrative summary.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Rising => "rising trend",
            Self::Falling => "falling trend",
            Self::Stable => "stable trend",
            Self::InsufficientData => "too few incidents to call a trend",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Rising,
            Self::Falling,
            Self::Stable,
            Self::InsufficientData,
        ]
    }
}

/// Traffic-light risk classification derived from the total incident count.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskTier {
    /// Green: a handful of incidents at most.
    Low,
    /// Amber.
    Moderate,
    /// Red.
    High,
}

impl RiskTier {
    /// Traffic-light marker leading the narrative.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Low => "\u{1f7e2}",
            Self::Moderate => "\u{1f7e1}",
            Self::High => "\u{1f534}",
        }
    }

    /// Short headline used in the narrative (e.g., `"Moderate crime"`).
    #[must_use]
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Low => "Low crime",
            Self::Moderate => "Moderate crime",
            Self::High => "High crime area",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Moderate, Self::High]
    }
}

/// Tallies over every incident found around one coordinate, before a trend
/// has been classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentAggregate {
    /// Number of incidents across the whole window.
    pub total: u64,
    /// Incidents per category.
    pub by_category: Tally,
    /// Incidents per street label (incidents without a label are skipped).
    pub top_streets: Tally,
    /// Incidents per outcome (incidents without an outcome are skipped).
    pub outcomes: Tally,
    /// Incidents per month, one entry for every month of the window.
    pub monthly_counts: BTreeMap<Period, u64>,
}

impl IncidentAggregate {
    /// Whether `total` agrees with the category and monthly sums.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.by_category.total()
            && self.total == self.monthly_counts.values().sum::<u64>()
    }

    /// Attaches the classified trend, producing the final [`CrimeData`].
    #[must_use]
    pub fn with_trend(self, trend: Trend) -> CrimeData {
        CrimeData {
            total: self.total,
            by_category: self.by_category,
            top_streets: self.top_streets,
            outcomes: self.outcomes,
            monthly_counts: self.monthly_counts,
            trend,
        }
    }
}

/// The `crime_data` object attached to an enriched listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrimeData {
    /// Number of incidents across the whole window.
    pub total: u64,
    /// Incidents per category.
    pub by_category: Tally,
    /// Incidents per street label.
    pub top_streets: Tally,
    /// Incidents per outcome.
    pub outcomes: Tally,
    /// Incidents per month in chronological order, zero months included.
    pub monthly_counts: BTreeMap<Period, u64>,
    /// Direction of the monthly series.
    pub trend: Trend,
}

impl CrimeData {
    /// Whether `total` agrees with the category and monthly sums.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.by_category.total()
            && self.total == self.monthly_counts.values().sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Trend::InsufficientData).unwrap(),
            "\"insufficient_data\""
        );
        assert_eq!(Trend::Rising.to_string(), "rising");
        assert_eq!(
            "insufficient_data".parse::<Trend>().unwrap(),
            Trend::InsufficientData
        );
    }

    #[test]
    fn every_tier_has_marker_and_headline() {
        for tier in RiskTier::all() {
            assert!(!tier.marker().is_empty(), "{tier:?} has no marker");
            assert!(!tier.headline().is_empty(), "{tier:?} has no headline");
        }
    }

    #[test]
    fn every_trend_has_a_description() {
        for trend in Trend::all() {
            assert!(trend.describe().contains("trend"), "{trend:?}");
        }
    }

    #[test]
    fn crime_data_serializes_expected_keys() {
        let mut monthly_counts = BTreeMap::new();
        monthly_counts.insert(Period::new(2024, 1).unwrap(), 1);
        monthly_counts.insert(Period::new(2024, 2).unwrap(), 0);

        let aggregate = IncidentAggregate {
            total: 1,
            by_category: ["burglary"].into_iter().collect(),
            top_streets: ["On or near Mill Lane"].into_iter().collect(),
            outcomes: Tally::new(),
            monthly_counts,
        };
        assert!(aggregate.is_consistent());

        let data = aggregate.with_trend(Trend::InsufficientData);
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["by_category"]["burglary"], 1);
        assert_eq!(value["top_streets"]["On or near Mill Lane"], 1);
        assert_eq!(value["monthly_counts"]["2024-02"], 0);
        assert_eq!(value["trend"], "insufficient_data");
    }

    #[test]
    fn detects_inconsistent_totals() {
        let aggregate = IncidentAggregate {
            total: 2,
            by_category: ["burglary"].into_iter().collect(),
            ..IncidentAggregate::default()
        };
        assert!(!aggregate.is_consistent());
    }
}
