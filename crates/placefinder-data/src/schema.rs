//! Column layout of the gazetteer frames.
//!
//! The places frame holds one row per `GeoNames` place. `relevance` is the
//! precomputed text score assigned when the search index was built; a null
//! relevance means the place has no index entry. The rivers frame holds the
//! centerline of every river-mapped place as an ordered point sequence.

use polars::prelude::*;

use super::{DataError, Result};

pub const ID: &str = "id";
pub const GEONAME_ID: &str = "geoname_id";
pub const NAME: &str = "name";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const FEATURE_CLASS: &str = "feature_class";
pub const FEATURE_CODE: &str = "feature_code";
pub const POPULATION: &str = "population";
pub const COUNTRY_CODE: &str = "country_code";
pub const ADMIN1_CODE: &str = "admin1_code";
pub const ADMIN2_CODE: &str = "admin2_code";
pub const ADMIN3_CODE: &str = "admin3_code";
pub const ADMIN4_CODE: &str = "admin4_code";
pub const ALTERNATE_NAMES: &str = "alternate_names";
pub const RELEVANCE: &str = "relevance";

/// Position of a point inside its river centerline.
pub const SEQ: &str = "seq";

/// Scored relevance of a search result row.
pub const RELEVANCE_SCORE: &str = "relevance_score";
/// Effective distance in meters of a result row to the search origin.
pub const CLOSEST_DISTANCE: &str = "closest_distance";
/// WKT point on a river centerline nearest to the search origin.
pub const CLOSEST_POINT: &str = "closest_point";

/// Admin code columns, ordered from admin1 to admin4.
pub const ADMIN_CODES: [&str; 4] = [ADMIN1_CODE, ADMIN2_CODE, ADMIN3_CODE, ADMIN4_CODE];

pub const PLACES_SCHEMA: [(PlSmallStr, DataType); 15] = [
    (PlSmallStr::from_static(ID), DataType::UInt32),
    (PlSmallStr::from_static(GEONAME_ID), DataType::UInt32),
    (PlSmallStr::from_static(NAME), DataType::String),
    (PlSmallStr::from_static(LATITUDE), DataType::Float64),
    (PlSmallStr::from_static(LONGITUDE), DataType::Float64),
    (PlSmallStr::from_static(FEATURE_CLASS), DataType::String),
    (PlSmallStr::from_static(FEATURE_CODE), DataType::String),
    (PlSmallStr::from_static(POPULATION), DataType::Int64),
    (PlSmallStr::from_static(COUNTRY_CODE), DataType::String),
    (PlSmallStr::from_static(ADMIN1_CODE), DataType::String),
    (PlSmallStr::from_static(ADMIN2_CODE), DataType::String),
    (PlSmallStr::from_static(ADMIN3_CODE), DataType::String),
    (PlSmallStr::from_static(ADMIN4_CODE), DataType::String),
    (PlSmallStr::from_static(ALTERNATE_NAMES), DataType::String),
    (PlSmallStr::from_static(RELEVANCE), DataType::Int64),
];

pub const RIVERS_SCHEMA: [(PlSmallStr, DataType); 4] = [
    (PlSmallStr::from_static(GEONAME_ID), DataType::UInt32),
    (PlSmallStr::from_static(SEQ), DataType::UInt32),
    (PlSmallStr::from_static(LATITUDE), DataType::Float64),
    (PlSmallStr::from_static(LONGITUDE), DataType::Float64),
];

/// Selects the schema columns in canonical order, cast to their canonical types.
///
/// Columns outside the schema are dropped. A value that cannot be cast fails
/// the collect rather than turning into a null.
fn conform(
    lf: LazyFrame,
    schema: &[(PlSmallStr, DataType)],
    frame: &'static str,
) -> Result<LazyFrame> {
    let mut lf = lf;
    let present = lf.collect_schema()?;
    let mut exprs = Vec::with_capacity(schema.len());
    for (name, dtype) in schema {
        if present.get(name).is_none() {
            return Err(DataError::MissingColumn {
                frame,
                column: name.to_string(),
            });
        }
        exprs.push(col(name.clone()).strict_cast(dtype.clone()));
    }
    Ok(lf.select(exprs))
}

pub fn conform_places(lf: LazyFrame) -> Result<LazyFrame> {
    conform(lf, &PLACES_SCHEMA, "places")
}

pub fn conform_rivers(lf: LazyFrame) -> Result<LazyFrame> {
    conform(lf, &RIVERS_SCHEMA, "rivers")
        .map(|lf| lf.sort([GEONAME_ID, SEQ], SortMultipleOptions::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conform_places_reports_missing_column() {
        let df = df!(
            "geoname_id" => &[1u32],
            "name" => &["Somewhere"],
        )
        .unwrap();
        let err = conform_places(df.lazy()).err().expect("expected an error");
        assert!(
            matches!(err, DataError::MissingColumn { frame: "places", ref column } if column == "id"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_conform_rivers_orders_points_and_drops_extra_columns() {
        let df = df!(
            "seq" => &["1", "0", "0"],
            "geoname_id" => &["7", "7", "3"],
            "latitude" => &["52.1", "52.0", "10.0"],
            "longitude" => &["13.1", "13.0", "20.0"],
            "comment" => &["x", "y", "z"],
        )
        .unwrap();
        let out = conform_rivers(df.lazy()).unwrap().collect().unwrap();

        assert_eq!(out.width(), 4);
        assert_eq!(out.column("geoname_id").unwrap().dtype(), &DataType::UInt32);
        let gids: Vec<Option<u32>> = out.column("geoname_id").unwrap().u32().unwrap().into_iter().collect();
        let seqs: Vec<Option<u32>> = out.column("seq").unwrap().u32().unwrap().into_iter().collect();
        assert_eq!(gids, vec![Some(3), Some(7), Some(7)]);
        assert_eq!(seqs, vec![Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn test_conform_rejects_uncastable_values() {
        let df = df!(
            "geoname_id" => &["7"],
            "seq" => &["first"],
            "latitude" => &["52.0"],
            "longitude" => &["13.0"],
        )
        .unwrap();
        let result = conform_rivers(df.lazy()).unwrap().collect();
        assert!(result.is_err(), "a non-numeric seq must not become null");
    }
}
