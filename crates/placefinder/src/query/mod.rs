//! Classification of raw location input into a typed [`QueryIntent`].
//!
//! Input is tried against an ordered list of matchers: a bare numeric id, a
//! coordinate pair, a coordinate pair prefixed with feature tokens. Anything
//! else is free text.

mod coordinate;
mod features;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

pub use coordinate::{Axis, Dms, Hemisphere};
use coordinate::{DECIMAL, DMS_LATITUDE, DMS_LONGITUDE, parse_component};
pub use error::QueryError;
use error::Result;
pub use features::{FeatureFilter, FeatureToken};

use crate::geo::Coordinate;

/// What a raw query asks for.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryIntent {
    GeonameIdLookup {
        id: u32,
    },
    CoordinateLookup {
        coordinate: Coordinate,
    },
    CoordinateWithFeatureFilter {
        coordinate: Coordinate,
        features: FeatureFilter,
    },
    FreeTextSearch {
        terms: Vec<String>,
    },
}

impl QueryIntent {
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::CoordinateLookup { coordinate }
            | Self::CoordinateWithFeatureFilter { coordinate, .. } => Some(*coordinate),
            Self::GeonameIdLookup { .. } | Self::FreeTextSearch { .. } => None,
        }
    }

    #[must_use]
    pub fn features(&self) -> Option<&FeatureFilter> {
        match self {
            Self::CoordinateWithFeatureFilter { features, .. } => Some(features),
            _ => None,
        }
    }

    /// Search terms; empty for every intent but free text.
    #[must_use]
    pub fn terms(&self) -> &[String] {
        match self {
            Self::FreeTextSearch { terms } => terms,
            _ => &[],
        }
    }
}

type Matcher = fn(&str) -> Result<Option<QueryIntent>>;

/// Matchers in priority order; the first one returning an intent wins.
const MATCHERS: [(&str, Matcher); 3] = [
    ("geoname_id", match_geoname_id),
    ("coordinate", match_coordinate),
    ("coordinate_with_features", match_coordinate_with_features),
];

static GEONAME_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("id pattern is valid"));

static COORDINATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<lat>{DECIMAL}|{DMS_LATITUDE}) *[,/| ]+ *(?P<lon>{DECIMAL}|{DMS_LONGITUDE})$"
    ))
    .expect("coordinate pattern is valid")
});

static COORDINATE_WITH_FEATURES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<features>[A-Z][A-Z0-9]*(?:\|[A-Z][A-Z0-9]*)*)[ :] *(?P<lat>{DECIMAL}|{DMS_LATITUDE}) *[,/| ]+ *(?P<lon>{DECIMAL}|{DMS_LONGITUDE})$"
    ))
    .expect("feature coordinate pattern is valid")
});

/// Classifies `input` into exactly one intent.
///
/// Free text is the catch-all, so the only failure is input that has the shape
/// of a coordinate query but cannot be read as one.
pub fn parse(input: &str) -> Result<QueryIntent> {
    let input = input.trim();
    for (name, matcher) in MATCHERS {
        if let Some(intent) = matcher(input)? {
            trace!(matcher = name, ?intent, "Query classified");
            return Ok(intent);
        }
    }
    trace!(matcher = "free_text", "Query classified");
    Ok(QueryIntent::FreeTextSearch {
        terms: vec![input.to_string()],
    })
}

fn match_geoname_id(input: &str) -> Result<Option<QueryIntent>> {
    if !GEONAME_ID.is_match(input) {
        return Ok(None);
    }
    // Ids beyond u32 are not geoname ids and fall through to text.
    Ok(input
        .parse()
        .ok()
        .map(|id| QueryIntent::GeonameIdLookup { id }))
}

fn coordinate_from(caps: &regex::Captures<'_>) -> Result<Coordinate> {
    Ok(Coordinate::new(
        parse_component(&caps["lat"], Axis::Latitude)?,
        parse_component(&caps["lon"], Axis::Longitude)?,
    ))
}

fn match_coordinate(input: &str) -> Result<Option<QueryIntent>> {
    COORDINATE
        .captures(input)
        .map(|caps| Ok(QueryIntent::CoordinateLookup {
            coordinate: coordinate_from(&caps)?,
        }))
        .transpose()
}

fn match_coordinate_with_features(input: &str) -> Result<Option<QueryIntent>> {
    COORDINATE_WITH_FEATURES
        .captures(input)
        .map(|caps| {
            Ok(QueryIntent::CoordinateWithFeatureFilter {
                features: FeatureFilter::parse(&caps["features"])?,
                coordinate: coordinate_from(&caps)?,
            })
        })
        .transpose()
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum QueryError {
        #[error("Invalid coordinate component: {0:?}")]
        InvalidCoordinate(String),
        #[error("Invalid feature token {token:?}: length {length} is neither a class (1) nor a code (2-5)")]
        InvalidFeatureToken { token: String, length: usize },
    }
    pub type Result<T> = std::result::Result<T, QueryError>;
}
