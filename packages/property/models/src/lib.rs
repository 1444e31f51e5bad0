#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Property records as they flow through the enrichment stage.
//!
//! Listings arrive from the scraper as loosely-shaped JSON objects. A
//! [`PropertyRecord`] wraps one such object without reshaping it: every
//! field passes through untouched, and the enrichment stage only reads the
//! identifier, coordinate, and label fields it needs. The result of the
//! stage is an [`EnrichedProperty`], which serializes back to the original
//! object plus `crime_summary` and `crime_data`.

use crime_enrich_crime_models::{CrimeData, RiskTier};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key holding the rendered narrative on enriched records.
pub const CRIME_SUMMARY_KEY: &str = "crime_summary";
/// Key holding the [`CrimeData`] object on enriched records.
pub const CRIME_DATA_KEY: &str = "crime_data";

const ID_KEYS: &[&str] = &["property_id", "id", "listing_id"];
const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lng", "lon", "longitude"];
const ADDRESS_KEYS: &[&str] = &["address_full", "address"];
const TITLE_KEYS: &[&str] = &["listing_title", "title"];
const POSTCODE_KEYS: &[&str] = &["postcode", "outcode"];

/// Why a record's coordinate cannot be used for a lookup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    /// No latitude/longitude pair on the record.
    #[error("no coordinate on record")]
    Missing,

    /// A coordinate field holds something other than a number.
    #[error("coordinate field '{field}' is not numeric")]
    NotNumeric {
        /// The offending key.
        field: String,
    },

    /// Not finite, or outside -90..=90 / -180..=180.
    #[error("coordinate ({latitude}, {longitude}) is out of range")]
    OutOfRange {
        /// Rejected latitude.
        latitude: f64,
        /// Rejected longitude.
        longitude: f64,
    },

    /// Exactly (0, 0), which scrapers emit when a listing has no location.
    #[error("coordinate is (0, 0)")]
    NullIsland,
}

/// A validated WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Validates and creates a coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::OutOfRange`] for non-finite or out-of-range
    /// values and [`CoordinateError::NullIsland`] for exactly `(0, 0)`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(CoordinateError::OutOfRange {
                latitude,
                longitude,
            });
        }
        if latitude == 0.0 && longitude == 0.0 {
            return Err(CoordinateError::NullIsland);
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// One listing as supplied by the upstream scraper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyRecord(Map<String, Value>);

impl PropertyRecord {
    /// Wraps an already-parsed JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// All fields, in their original order.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwraps the underlying JSON object.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Looks up a single field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The listing identifier, if the record carries one.
    ///
    /// Numeric identifiers are rendered as strings.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        ID_KEYS
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Extracts and validates the record's coordinate.
    ///
    /// Looks at top-level `lat`/`latitude` and `lng`/`lon`/`longitude`
    /// first, then at a nested `location: {latitude, longitude}` object.
    /// Values may be JSON numbers or numeric strings.
    ///
    /// # Errors
    ///
    /// Returns a [`CoordinateError`] describing why no usable coordinate
    /// exists.
    pub fn coordinate(&self) -> Result<Coordinate, CoordinateError> {
        let top_level = (
            first_number(&self.0, LATITUDE_KEYS)?,
            first_number(&self.0, LONGITUDE_KEYS)?,
        );

        let (latitude, longitude) = match top_level {
            (Some(lat), Some(lng)) => return Coordinate::new(lat, lng),
            _ => match self.0.get("location") {
                Some(Value::Object(location)) => (
                    first_number(location, &["latitude", "lat"])?,
                    first_number(location, &["longitude", "lng", "lon"])?,
                ),
                _ => top_level,
            },
        };

        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
            _ => Err(CoordinateError::Missing),
        }
    }

    /// Human-readable label for narratives: address, else title, else
    /// identifier, followed by the postcode in parentheses when known.
    #[must_use]
    pub fn label(&self) -> String {
        let name = first_text(&self.0, ADDRESS_KEYS)
            .or_else(|| first_text(&self.0, TITLE_KEYS))
            .map(ToString::to_string)
            .or_else(|| self.id())
            .unwrap_or_else(|| "This property".to_string());

        match self.postcode() {
            Some(postcode) => format!("{name} ({postcode})"),
            None => name,
        }
    }

    /// Street address, if present.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        first_text(&self.0, ADDRESS_KEYS)
    }

    /// Postcode or outward code, if present.
    #[must_use]
    pub fn postcode(&self) -> Option<&str> {
        first_text(&self.0, POSTCODE_KEYS)
    }
}

impl From<Map<String, Value>> for PropertyRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn first_text<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn first_number(fields: &Map<String, Value>, keys: &[&str]) -> Result<Option<f64>, CoordinateError> {
    for key in keys {
        match fields.get(*key) {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => {
                return n
                    .as_f64()
                    .map(Some)
                    .ok_or_else(|| CoordinateError::NotNumeric {
                        field: (*key).to_string(),
                    });
            }
            Some(Value::String(s)) if s.trim().is_empty() => {}
            Some(Value::String(s)) => {
                return s
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| CoordinateError::NotNumeric {
                        field: (*key).to_string(),
                    });
            }
            Some(_) => {
                return Err(CoordinateError::NotNumeric {
                    field: (*key).to_string(),
                });
            }
        }
    }
    Ok(None)
}

/// Crime context computed for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    /// One-line narrative.
    pub summary: String,
    /// Aggregated incident data.
    pub data: CrimeData,
    /// Risk tier derived from `data.total`.
    pub tier: RiskTier,
}

/// Why a property was left without crime fields.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Unavailable {
    /// The record had no usable coordinate; no lookups were made.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(CoordinateError),

    /// Every monthly lookup failed on every attempt.
    #[error("all lookups failed after {attempts} attempt(s)")]
    LookupsFailed {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Something unexpected broke inside the property's pipeline.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Outcome of enriching one property.
///
/// Keeps "zero incidents found" ([`CrimeLookup::Available`] with a zero
/// total) apart from "nothing could be looked up".
#[derive(Debug, Clone, PartialEq)]
pub enum CrimeLookup {
    /// Crime context was computed.
    Available(Enrichment),
    /// Crime context could not be computed.
    Unavailable(Unavailable),
}

impl CrimeLookup {
    /// The enrichment, when available.
    #[must_use]
    pub const fn enrichment(&self) -> Option<&Enrichment> {
        match self {
            Self::Available(enrichment) => Some(enrichment),
            Self::Unavailable(_) => None,
        }
    }
}

/// A property record together with its enrichment outcome.
///
/// Serializes as the original record's fields followed by
/// `crime_summary` and `crime_data` when enrichment succeeded. Any
/// pre-existing `crime_summary`/`crime_data` keys on the input are dropped
/// so stale values never survive a failed run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedProperty {
    /// The untouched input record.
    pub record: PropertyRecord,
    /// What the enrichment stage produced.
    pub crime: CrimeLookup,
}

impl EnrichedProperty {
    /// Whether crime fields will be attached.
    #[must_use]
    pub const fn is_enriched(&self) -> bool {
        matches!(self.crime, CrimeLookup::Available(_))
    }

    /// Row for the standalone summaries report, when enriched.
    #[must_use]
    pub fn summary_row(&self) -> Option<CrimeSummaryRow> {
        let enrichment = self.crime.enrichment()?;
        let coordinate = self.record.coordinate().ok()?;
        Some(CrimeSummaryRow {
            address: self.record.address().map(ToString::to_string),
            postcode: self.record.postcode().map(ToString::to_string),
            lat: coordinate.latitude(),
            lng: coordinate.longitude(),
            summary: enrichment.summary.clone(),
            aggregate: enrichment.data.clone(),
        })
    }
}

impl Serialize for EnrichedProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let passthrough = self
            .record
            .fields()
            .iter()
            .filter(|(key, _)| *key != CRIME_SUMMARY_KEY && *key != CRIME_DATA_KEY);

        let mut map = serializer.serialize_map(None)?;
        for (key, value) in passthrough {
            map.serialize_entry(key, value)?;
        }
        if let CrimeLookup::Available(enrichment) = &self.crime {
            map.serialize_entry(CRIME_SUMMARY_KEY, &enrichment.summary)?;
            map.serialize_entry(CRIME_DATA_KEY, &enrichment.data)?;
        }
        map.end()
    }
}

/// One entry of the standalone crime summaries report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrimeSummaryRow {
    /// Street address of the listing.
    pub address: Option<String>,
    /// Postcode of the listing.
    pub postcode: Option<String>,
    /// Latitude used for the lookup.
    pub lat: f64,
    /// Longitude used for the lookup.
    pub lng: f64,
    /// Rendered narrative.
    pub summary: String,
    /// Aggregated incident data.
    pub aggregate: CrimeData,
}
