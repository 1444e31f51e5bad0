//! Trend classification.
//!
//! Neighborhood-level monthly counts are small and noisy, so the direction
//! is read from a plain two-window comparison: the older half of the window
//! against the newer half. With an odd number of months the middle month
//! belongs to neither half.

use std::collections::BTreeMap;

use crime_enrich_crime_models::{Period, Trend};

/// Fewest incidents across the window for which a direction is called.
pub const DEFAULT_MIN_INCIDENTS: u64 = 3;

/// Classifies the direction of a chronologically ordered monthly series.
///
/// Windows shorter than two months cannot be split and always yield
/// [`Trend::InsufficientData`].
#[must_use]
pub fn classify(monthly_counts: &BTreeMap<Period, u64>, min_incidents: u64) -> Trend {
    let counts: Vec<u64> = monthly_counts.values().copied().collect();
    let half = counts.len() / 2;
    let total: u64 = counts.iter().sum();

    if half == 0 || total < min_incidents {
        return Trend::InsufficientData;
    }

    let earlier: u64 = counts[..half].iter().sum();
    let later: u64 = counts[counts.len() - half..].iter().sum();

    match later.cmp(&earlier) {
        std::cmp::Ordering::Less => Trend::Falling,
        std::cmp::Ordering::Greater => Trend::Rising,
        std::cmp::Ordering::Equal => Trend::Stable,
    }
}
