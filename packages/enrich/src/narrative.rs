//! One-line crime summaries.
//!
//! The rendered sentence is a pure function of its inputs: no clock, no
//! randomness, and ties between equally frequent streets or categories go
//! to whichever was seen first.

use crime_enrich_crime_models::{CrimeData, RiskTier};

/// Fixed context quoted in every narrative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrativeContext {
    /// Search radius in kilometres.
    pub radius_km: f64,
    /// Window length in months.
    pub window_months: usize,
}

impl Default for NarrativeContext {
    fn default() -> Self {
        Self {
            radius_km: 1.0,
            window_months: 6,
        }
    }
}

/// Renders the `crime_summary` sentence for one property.
///
/// ```text
/// 🟡 1 Mill Lane (M1): Moderate crime - 9 incidents within 1km radius in past 6 months (near On or near Mill Lane), mainly Anti Social Behaviour (rising trend)
/// ```
#[must_use]
pub fn render(label: &str, data: &CrimeData, tier: RiskTier, context: &NarrativeContext) -> String {
    let scope = format!(
        "within {}km radius in past {} months",
        context.radius_km, context.window_months
    );

    if data.total == 0 {
        return format!(
            "{} {label}: Safe area - no crimes reported {scope}",
            tier.marker()
        );
    }

    let incidents = if data.total == 1 {
        "incident"
    } else {
        "incidents"
    };
    let near = data
        .top_streets
        .top()
        .map(|(street, _)| format!(" (near {street})"))
        .unwrap_or_default();
    let category = data
        .by_category
        .top()
        .map_or_else(|| "unclassified incidents".to_string(), |(c, _)| prettify_category(c));

    format!(
        "{} {label}: {} - {} {incidents} {scope}{near}, mainly {category} ({})",
        tier.marker(),
        tier.headline(),
        data.total,
        data.trend.describe(),
    )
}

/// Turns a category slug into title case words
/// (`"anti-social-behaviour"` → `"Anti Social Behaviour"`).
#[must_use]
pub fn prettify_category(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crime_enrich_crime_models::{Period, Tally, Trend};

    use super::*;

    fn data(categories: &[&str], streets: &[&str], trend: Trend) -> CrimeData {
        let mut monthly_counts = BTreeMap::new();
        monthly_counts.insert(Period::new(2024, 6).unwrap(), categories.len() as u64);
        CrimeData {
            total: categories.len() as u64,
            by_category: categories.iter().copied().collect(),
            top_streets: streets.iter().copied().collect(),
            outcomes: Tally::new(),
            monthly_counts,
            trend,
        }
    }

    #[test]
    fn zero_incidents_renders_safe_area_sentence() {
        let summary = render(
            "1 Mill Lane (M1)",
            &data(&[], &[], Trend::InsufficientData),
            RiskTier::Low,
            &NarrativeContext::default(),
        );
        assert_eq!(
            summary,
            "\u{1f7e2} 1 Mill Lane (M1): Safe area - no crimes reported within 1km radius in past 6 months"
        );
    }

    #[test]
    fn names_top_street_category_and_trend() {
        let summary = render(
            "Flat 2",
            &data(
                &["anti-social-behaviour", "burglary", "anti-social-behaviour"],
                &["On or near Park Road", "On or near Park Road"],
                Trend::Rising,
            ),
            RiskTier::Low,
            &NarrativeContext::default(),
        );
        assert_eq!(
            summary,
            "\u{1f7e2} Flat 2: Low crime - 3 incidents within 1km radius in past 6 months \
             (near On or near Park Road), mainly Anti Social Behaviour (rising trend)"
        );
    }

    #[test]
    fn ties_go_to_first_seen() {
        let summary = render(
            "x",
            &data(
                &["drugs", "robbery", "robbery", "drugs"],
                &["Mill Lane", "Park Road", "Park Road", "Mill Lane"],
                Trend::Stable,
            ),
            RiskTier::Low,
            &NarrativeContext::default(),
        );
        assert!(summary.contains("(near Mill Lane)"), "{summary}");
        assert!(summary.contains("mainly Drugs"), "{summary}");
    }

    #[test]
    fn omits_street_when_none_known() {
        let summary = render(
            "x",
            &data(&["burglary"], &[], Trend::InsufficientData),
            RiskTier::Low,
            &NarrativeContext::default(),
        );
        assert!(!summary.contains("near"), "{summary}");
        assert!(summary.contains("1 incident within"), "{summary}");
        assert!(summary.contains("(too few incidents to call a trend)"), "{summary}");
    }

    #[test]
    fn high_tier_uses_red_marker_and_custom_context() {
        let categories = vec!["violent-crime"; 25];
        let summary = render(
            "x",
            &data(&categories, &[], Trend::Falling),
            RiskTier::High,
            &NarrativeContext {
                radius_km: 1.5,
                window_months: 12,
            },
        );
        assert!(summary.starts_with("\u{1f534} x: High crime area - 25 incidents"), "{summary}");
        assert!(summary.contains("within 1.5km radius in past 12 months"), "{summary}");
    }

    #[test]
    fn rendering_is_deterministic() {
        let d = data(
            &["burglary", "drugs", "drugs", "robbery"],
            &["A Street", "B Street"],
            Trend::Falling,
        );
        let first = render("label", &d, RiskTier::Low, &NarrativeContext::default());
        let second = render("label", &d, RiskTier::Low, &NarrativeContext::default());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn prettifies_category_slugs() {
        assert_eq!(prettify_category("anti-social-behaviour"), "Anti Social Behaviour");
        assert_eq!(prettify_category("criminal-damage-arson"), "Criminal Damage Arson");
        assert_eq!(prettify_category("drugs"), "Drugs");
        assert_eq!(prettify_category(""), "");
    }
}
