//! Incident aggregation.
//!
//! Folds the incidents found for every month of the window into the
//! category, street, outcome, and monthly tallies of an
//! [`IncidentAggregate`]. Every month of the window gets an entry, even
//! when nothing was found (or the lookup failed) for it.

use std::collections::BTreeSet;

use crime_enrich_crime_models::{Incident, IncidentAggregate, Period};

use crate::EnrichError;

/// Incidents returned for one month of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodIncidents {
    /// The month looked up.
    pub period: Period,
    /// Incidents found for that month.
    pub incidents: Vec<Incident>,
}

impl PeriodIncidents {
    /// A month that contributes no incidents.
    #[must_use]
    pub const fn empty(period: Period) -> Self {
        Self {
            period,
            incidents: Vec::new(),
        }
    }
}

/// Aggregates per-month incident lists over `window`.
///
/// # Errors
///
/// Returns [`EnrichError::Aggregation`] if a batch belongs to a month
/// outside the window, the same month appears twice, or the resulting
/// totals disagree.
pub fn aggregate(
    window: &[Period],
    batches: Vec<PeriodIncidents>,
) -> Result<IncidentAggregate, EnrichError> {
    let mut result = IncidentAggregate {
        monthly_counts: window.iter().map(|&period| (period, 0)).collect(),
        ..IncidentAggregate::default()
    };
    let mut seen = BTreeSet::new();

    for batch in batches {
        if !seen.insert(batch.period) {
            return Err(EnrichError::Aggregation {
                message: format!("month {} was supplied more than once", batch.period),
            });
        }
        let Some(month_count) = result.monthly_counts.get_mut(&batch.period) else {
            return Err(EnrichError::Aggregation {
                message: format!("month {} is outside the lookup window", batch.period),
            });
        };

        *month_count += batch.incidents.len() as u64;

        for incident in &batch.incidents {
            result.total += 1;
            result.by_category.record(&incident.category);
            if let Some(outcome) = &incident.outcome {
                result.outcomes.record(outcome);
            }
            if let Some(street) = &incident.street_label {
                result.top_streets.record(street);
            }
        }
    }

    if !result.is_consistent() {
        return Err(EnrichError::Aggregation {
            message: format!(
                "total {} disagrees with category sum {} or monthly sum {}",
                result.total,
                result.by_category.total(),
                result.monthly_counts.values().sum::<u64>()
            ),
        });
    }

    Ok(result)
}
