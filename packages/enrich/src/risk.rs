//! Risk tier classification.

use crime_enrich_crime_models::RiskTier;

/// Highest total still classified as [`RiskTier::Low`].
pub const LOW_MAX: u64 = 5;

/// Highest total still classified as [`RiskTier::Moderate`].
pub const MODERATE_MAX: u64 = 20;

/// Maps a window's total incident count to a traffic-light tier.
#[must_use]
pub const fn classify(total: u64) -> RiskTier {
    if total <= LOW_MAX {
        RiskTier::Low
    } else if total <= MODERATE_MAX {
        RiskTier::Moderate
    } else {
        RiskTier::High
    }
}
