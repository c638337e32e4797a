//! Typed candidates from store result rows.

use placefinder_data::schema::{
    ADMIN_CODES, ALTERNATE_NAMES, CLOSEST_DISTANCE, CLOSEST_POINT, COUNTRY_CODE, FEATURE_CLASS,
    FEATURE_CODE, GEONAME_ID, ID, LATITUDE, LONGITUDE, NAME, POPULATION, RELEVANCE_SCORE,
};
use polars::prelude::*;
use tracing::trace;

pub use error::HydrateError;
use error::Result;

use crate::{admin::AdminPath, geo::Coordinate};

/// Columns every result row must carry.
const REQUIRED: [&str; 9] = [
    ID,
    GEONAME_ID,
    NAME,
    LATITUDE,
    LONGITUDE,
    FEATURE_CLASS,
    FEATURE_CODE,
    POPULATION,
    COUNTRY_CODE,
];

/// Columns a result row may carry in addition to the required ones.
const OPTIONAL: [&str; 8] = [
    ADMIN_CODES[0],
    ADMIN_CODES[1],
    ADMIN_CODES[2],
    ADMIN_CODES[3],
    ALTERNATE_NAMES,
    RELEVANCE_SCORE,
    CLOSEST_DISTANCE,
    CLOSEST_POINT,
];

/// A ranked search result.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: u32,
    pub geoname_id: u32,
    pub name: String,
    pub coordinate: Coordinate,
    pub feature_class: String,
    pub feature_code: String,
    pub population: i64,
    pub country_code: String,
    pub admin_codes: [Option<String>; 4],
    pub alternate_names: Vec<String>,
    pub relevance_score: Option<i64>,
    /// Only set when the search had an origin. Measured to `closest_point` when
    /// that is set.
    pub distance_meters: Option<f64>,
    /// Nearest point of the place's river centerline.
    pub closest_point: Option<Coordinate>,
}

impl Candidate {
    #[must_use]
    pub fn admin_path(&self) -> AdminPath {
        AdminPath::new(self.admin_codes.clone())
    }
}

/// Maps result rows to candidates, row order preserved.
///
/// Any column outside the known result layout, a missing required column or a
/// null required value fails the whole batch.
pub fn hydrate(rows: &DataFrame) -> Result<Vec<Candidate>> {
    if let Some(unknown) = rows
        .get_column_names()
        .into_iter()
        .find(|name| !REQUIRED.contains(&name.as_str()) && !OPTIONAL.contains(&name.as_str()))
    {
        return Err(HydrateError::UnknownColumn(unknown.to_string()));
    }

    let ids = u32_values(rows, ID)?;
    let geoname_ids = u32_values(rows, GEONAME_ID)?;
    let names = string_values(rows, NAME)?;
    let latitudes = f64_values(rows, LATITUDE)?;
    let longitudes = f64_values(rows, LONGITUDE)?;
    let classes = string_values(rows, FEATURE_CLASS)?;
    let codes = string_values(rows, FEATURE_CODE)?;
    let populations = i64_values(rows, POPULATION)?;
    let countries = string_values(rows, COUNTRY_CODE)?;

    let height = rows.height();
    let optional = |column: &'static str| {
        if rows.schema().contains(column) {
            string_values(rows, column)
        } else {
            Ok(vec![None; height])
        }
    };
    let admin = ADMIN_CODES
        .into_iter()
        .map(optional)
        .collect::<Result<Vec<_>>>()?;
    let alternates = optional(ALTERNATE_NAMES)?;
    let points = optional(CLOSEST_POINT)?;
    let scores = if rows.schema().contains(RELEVANCE_SCORE) {
        i64_values(rows, RELEVANCE_SCORE)?
    } else {
        vec![None; height]
    };
    let distances = if rows.schema().contains(CLOSEST_DISTANCE) {
        f64_values(rows, CLOSEST_DISTANCE)?
    } else {
        vec![None; height]
    };

    let candidates = (0..height)
        .map(|row| {
            let closest_point = points[row]
                .as_deref()
                .map(|wkt| {
                    Coordinate::from_wkt(wkt).ok_or_else(|| HydrateError::InvalidPoint {
                        row,
                        value: wkt.to_string(),
                    })
                })
                .transpose()?;
            if closest_point.is_some() && distances[row].is_none() {
                return Err(HydrateError::UnmeasuredPoint { row });
            }
            Ok(Candidate {
                id: required(&ids, ID, row)?,
                geoname_id: required(&geoname_ids, GEONAME_ID, row)?,
                name: required(&names, NAME, row)?,
                coordinate: Coordinate::new(
                    required(&latitudes, LATITUDE, row)?,
                    required(&longitudes, LONGITUDE, row)?,
                ),
                feature_class: required(&classes, FEATURE_CLASS, row)?,
                feature_code: required(&codes, FEATURE_CODE, row)?,
                population: required(&populations, POPULATION, row)?,
                country_code: required(&countries, COUNTRY_CODE, row)?,
                admin_codes: std::array::from_fn(|level| admin[level][row].clone()),
                alternate_names: alternates[row]
                    .as_deref()
                    .map(split_alternate_names)
                    .unwrap_or_default(),
                relevance_score: scores[row],
                distance_meters: distances[row],
                closest_point,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    trace!(rows = candidates.len(), "Rows hydrated");
    Ok(candidates)
}

fn split_alternate_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<T: Clone>(values: &[Option<T>], column: &'static str, row: usize) -> Result<T> {
    values[row]
        .clone()
        .ok_or(HydrateError::NullValue { column, row })
}

fn cast(rows: &DataFrame, column: &'static str, dtype: &DataType) -> Result<Column> {
    rows.column(column)
        .map_err(|_| HydrateError::MissingColumn(column))?
        .strict_cast(dtype)
        .map_err(|_| HydrateError::NotNumeric { column })
}

fn u32_values(rows: &DataFrame, column: &'static str) -> Result<Vec<Option<u32>>> {
    Ok(cast(rows, column, &DataType::UInt32)?.u32()?.into_iter().collect())
}

fn i64_values(rows: &DataFrame, column: &'static str) -> Result<Vec<Option<i64>>> {
    Ok(cast(rows, column, &DataType::Int64)?.i64()?.into_iter().collect())
}

/// Text and numeric columns alike are coerced to floating point.
fn f64_values(rows: &DataFrame, column: &'static str) -> Result<Vec<Option<f64>>> {
    Ok(cast(rows, column, &DataType::Float64)?.f64()?.into_iter().collect())
}

fn string_values(rows: &DataFrame, column: &'static str) -> Result<Vec<Option<String>>> {
    let values = rows
        .column(column)
        .map_err(|_| HydrateError::MissingColumn(column))?
        .cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum HydrateError {
        #[error("Unexpected column '{0}' in result rows")]
        UnknownColumn(String),
        #[error("Required column '{0}' missing from result rows")]
        MissingColumn(&'static str),
        #[error("Null value in required column '{column}' at row {row}")]
        NullValue { column: &'static str, row: usize },
        #[error("Column '{column}' holds values that are not numeric")]
        NotNumeric { column: &'static str },
        #[error("Malformed closest point {value:?} at row {row}")]
        InvalidPoint { row: usize, value: String },
        #[error("Closest point without a distance at row {row}")]
        UnmeasuredPoint { row: usize },
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
    }
    pub type Result<T> = std::result::Result<T, HydrateError>;
}
