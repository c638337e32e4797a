use std::{path::{Path, PathBuf}, sync::Arc, time::Instant};

use ahash::AHashMap;
use anyhow::anyhow;
use itertools::izip;
use placefinder_data::{
    GazetteerFrames,
    schema::{
        ADMIN_CODES, ADMIN1_CODE, ALTERNATE_NAMES, CLOSEST_DISTANCE, CLOSEST_POINT, COUNTRY_CODE,
        FEATURE_CLASS, FEATURE_CODE, GEONAME_ID, ID, LATITUDE, LONGITUDE, NAME, POPULATION,
        RELEVANCE, RELEVANCE_SCORE,
    },
};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use super::{GazetteerStore, StoreError};
use crate::{
    admin::{AdminQuery, COUNTRY_CODES, STATE_CODE, UnitQuery},
    geo::{Coordinate, closest_point_on_line},
    plan::{CountQuery, DataQuery, Predicate, SearchScope, SortOrder},
    query::FeatureFilter,
    text::TextNormalizer,
};

const NORMALIZED_TEXT: &str = "normalized_text";
const STEMMED_TEXT: &str = "stemmed_text";
const DISTANCE_PENALTY: &str = "distance_penalty";

type Result<T> = std::result::Result<T, StoreError>;

/// In-memory gazetteer over polars frames.
///
/// Text representations are computed once on construction; river centerlines
/// are kept as point lines keyed by geoname id. Clones share all data.
#[derive(Debug, Clone)]
pub struct FrameStore {
    places: DataFrame,
    rivers: Arc<AHashMap<u32, Vec<Coordinate>>>,
}

impl FrameStore {
    #[instrument(name = "Build FrameStore", level = "info", skip_all, fields(places = frames.places.height()))]
    pub fn new(frames: &GazetteerFrames, normalizer: &TextNormalizer) -> Result<Self> {
        let t_build = Instant::now();
        let rows = frames
            .places
            .column(NAME)?
            .str()?
            .into_iter()
            .zip(frames.places.column(ALTERNATE_NAMES)?.str()?)
            .collect::<Vec<_>>();
        let (normalized, stemmed): (Vec<String>, Vec<String>) = rows
            .par_iter()
            .map(|(name, alternates)| {
                normalizer.representations(name.unwrap_or_default(), *alternates)
            })
            .unzip();

        let mut places = frames.places.clone();
        places.with_column(Series::new(NORMALIZED_TEXT.into(), normalized))?;
        places.with_column(Series::new(STEMMED_TEXT.into(), stemmed))?;

        let rivers = frames
            .river_lines()?
            .into_iter()
            .map(|(gid, line)| {
                let line = line
                    .into_iter()
                    .map(|(lat, lon)| Coordinate::new(lat, lon))
                    .collect();
                (gid, line)
            })
            .collect::<AHashMap<_, _>>();

        info!(
            places = places.height(),
            rivers = rivers.len(),
            elapsed = ?t_build.elapsed(),
            "FrameStore ready"
        );
        Ok(Self {
            places,
            rivers: Arc::new(rivers),
        })
    }

    /// Loads CSV or Parquet gazetteer files and builds a store over them.
    pub fn from_paths(
        places_path: impl AsRef<Path>,
        rivers_path: Option<PathBuf>,
        normalizer: &TextNormalizer,
    ) -> Result<Self> {
        let frames = GazetteerFrames::from_paths(places_path, rivers_path)?;
        Self::new(&frames, normalizer)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.places.height()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.places.height() == 0
    }

    /// Rows of the scope with `closest_distance`, `closest_point` and
    /// `relevance_score` attached. Radius filtering happens last since it
    /// needs the effective distance.
    fn scoped(&self, scope: &SearchScope) -> Result<DataFrame> {
        let radius = scope.radius();
        if radius.is_some() && scope.origin.is_none() {
            return Err(anyhow!("radius filter without a search origin").into());
        }

        let mut lf = self.places.clone().lazy();
        for expr in scope.predicates.iter().filter_map(predicate_expr) {
            lf = lf.filter(expr);
        }
        let mut df = lf.collect()?;

        let penalties: Vec<Option<i64>> = match &scope.origin {
            Some(origin) => {
                let (distances, points) = self.effective_distances(&df, origin)?;
                let penalties = distances
                    .iter()
                    .map(|distance| distance.map(|d| (d * scope.distance_penalty).round() as i64))
                    .collect();
                df.with_column(Series::new(CLOSEST_DISTANCE.into(), distances))?;
                df.with_column(Series::new(CLOSEST_POINT.into(), points))?;
                penalties
            }
            None => vec![None; df.height()],
        };
        df.with_column(Series::new(DISTANCE_PENALTY.into(), penalties))?;

        let mut lf = df.lazy().with_column(
            (col(RELEVANCE).fill_null(lit(0i64)) - col(DISTANCE_PENALTY).fill_null(lit(0i64)))
                .alias(RELEVANCE_SCORE),
        );
        if let Some(radius) = radius {
            lf = lf.filter(col(CLOSEST_DISTANCE).lt_eq(lit(radius)));
        }
        Ok(lf.collect()?)
    }

    /// Distance to the nearest point of the river centerline when the place
    /// has one, else to the place's own coordinate.
    fn effective_distances(
        &self,
        df: &DataFrame,
        origin: &Coordinate,
    ) -> Result<(Vec<Option<f64>>, Vec<Option<String>>)> {
        Ok(izip!(
            df.column(GEONAME_ID)?.u32()?,
            df.column(LATITUDE)?.f64()?,
            df.column(LONGITUDE)?.f64()?,
        )
        .map(|(gid, lat, lon)| {
            let on_river = gid
                .and_then(|gid| self.rivers.get(&gid))
                .and_then(|line| closest_point_on_line(origin, line));
            match (on_river, lat.zip(lon)) {
                (Some(closest), _) => (
                    Some(closest.distance_meters),
                    Some(closest.point.to_wkt()),
                ),
                (None, Some((lat, lon))) => {
                    (Some(origin.distance_to(&Coordinate::new(lat, lon))), None)
                }
                (None, None) => (None, None),
            }
        })
        .unzip())
    }
}

fn place_columns() -> Vec<Expr> {
    [
        ID,
        GEONAME_ID,
        NAME,
        LATITUDE,
        LONGITUDE,
        FEATURE_CLASS,
        FEATURE_CODE,
        POPULATION,
        COUNTRY_CODE,
    ]
    .into_iter()
    .chain(ADMIN_CODES)
    .chain([ALTERNATE_NAMES])
    .map(col)
    .collect()
}

fn predicate_expr(predicate: &Predicate) -> Option<Expr> {
    match predicate {
        Predicate::IndexEntry => Some(col(RELEVANCE).is_not_null()),
        Predicate::Text {
            normalized,
            stemmed,
        } => Some(all_prefixes(NORMALIZED_TEXT, normalized).or(all_prefixes(STEMMED_TEXT, stemmed))),
        Predicate::GeonameId(id) => Some(col(GEONAME_ID).eq(lit(*id))),
        Predicate::Features(features) => Some(features_expr(features)),
        Predicate::WithinRadius(_) => None,
    }
}

/// Every token must start some word of the space padded representation.
fn all_prefixes(column: &str, tokens: &[String]) -> Expr {
    tokens
        .iter()
        .map(|token| col(column).str().contains_literal(lit(format!(" {token}"))))
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(|| lit(false))
}

fn is_in_set<'a>(column: &str, values: impl IntoIterator<Item = &'a str>) -> Expr {
    let values = Series::new(
        format!("{column}_allowed").into(),
        values.into_iter().collect::<Vec<_>>(),
    );
    col(column).is_in(lit(values).implode(), false)
}

fn features_expr(features: &FeatureFilter) -> Expr {
    let mut parts = Vec::with_capacity(2);
    if !features.feature_classes.is_empty() {
        parts.push(is_in_set(
            FEATURE_CLASS,
            features.feature_classes.iter().map(String::as_str),
        ));
    }
    if !features.feature_codes.is_empty() {
        parts.push(is_in_set(
            FEATURE_CODE,
            features.feature_codes.iter().map(String::as_str),
        ));
    }
    parts
        .into_iter()
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(|| lit(true))
}

impl GazetteerStore for FrameStore {
    #[instrument(name = "FrameStore fetch", level = "debug", skip_all, fields(order = ?query.order, page = ?query.page))]
    fn fetch(&self, query: &DataQuery) -> Result<DataFrame> {
        let with_distance = query.scope.origin.is_some();
        let (by, descending) = match query.order {
            SortOrder::RelevanceDesc => (vec![RELEVANCE_SCORE, GEONAME_ID], vec![true, false]),
            SortOrder::DistanceAsc if with_distance => {
                (vec![CLOSEST_DISTANCE, GEONAME_ID], vec![false, false])
            }
            SortOrder::DistanceAsc => {
                return Err(anyhow!("distance order without a search origin").into());
            }
            SortOrder::NameAsc => (vec![NAME, GEONAME_ID], vec![false, false]),
            SortOrder::GeonameIdAsc => (vec![GEONAME_ID], vec![false]),
        };

        let mut columns = place_columns();
        columns.push(col(RELEVANCE_SCORE));
        if with_distance {
            columns.extend([col(CLOSEST_DISTANCE), col(CLOSEST_POINT)]);
        }

        let mut lf = self.scoped(&query.scope)?.lazy().select(columns).sort(
            by,
            SortMultipleOptions::default()
                .with_order_descending_multi(descending)
                .with_nulls_last(true)
                .with_maintain_order(true),
        );
        if query.page.offset > 0 || query.page.limit.is_some() {
            // Past the addressable range a page is empty or unbounded anyway.
            lf = lf.slice(
                i64::try_from(query.page.offset).unwrap_or(i64::MAX),
                query
                    .page
                    .limit
                    .map_or(IdxSize::MAX, |limit| IdxSize::try_from(limit).unwrap_or(IdxSize::MAX)),
            );
        }
        let rows = lf.collect()?;
        debug!(rows = rows.height(), "Search rows fetched");
        Ok(rows)
    }

    #[instrument(name = "FrameStore count", level = "debug", skip_all)]
    fn count(&self, query: &CountQuery) -> Result<usize> {
        let total = self.scoped(&query.scope)?.height();
        debug!(total, "Search rows counted");
        Ok(total)
    }

    #[instrument(name = "FrameStore nearby", level = "debug", skip_all, fields(country = %query.country_code, radius = query.radius_meters))]
    fn nearby(&self, query: &AdminQuery) -> Result<DataFrame> {
        let mut filter = col(COUNTRY_CODE)
            .eq(lit(query.country_code.as_str()))
            .and(is_in_set(
                FEATURE_CODE,
                query.feature_codes.iter().map(String::as_str),
            ));
        if let Some(admin1) = &query.admin1 {
            filter = filter.and(col(ADMIN1_CODE).eq(lit(admin1.as_str())));
        }
        let mut df = self.places.clone().lazy().filter(filter).collect()?;

        let distances = izip!(df.column(LATITUDE)?.f64()?, df.column(LONGITUDE)?.f64()?)
            .map(|(lat, lon)| {
                lat.zip(lon)
                    .map(|(lat, lon)| query.anchor.distance_to(&Coordinate::new(lat, lon)))
            })
            .collect::<Vec<_>>();
        df.with_column(Series::new(CLOSEST_DISTANCE.into(), distances))?;

        let mut columns = place_columns();
        columns.push(col(CLOSEST_DISTANCE));
        let rows = df
            .lazy()
            .filter(col(CLOSEST_DISTANCE).lt_eq(lit(query.radius_meters)))
            .select(columns)
            .sort(
                [CLOSEST_DISTANCE, GEONAME_ID],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;
        debug!(rows = rows.height(), "Nearby admin candidates");
        Ok(rows)
    }

    #[instrument(name = "FrameStore units", level = "debug", skip_all, fields(country = %query.country_code))]
    fn units(&self, query: &UnitQuery) -> Result<DataFrame> {
        let mut unit = is_in_set(FEATURE_CODE, COUNTRY_CODES);
        if let Some(admin1) = &query.admin1 {
            unit = unit.or(col(FEATURE_CODE)
                .eq(lit(STATE_CODE))
                .and(col(ADMIN1_CODE).eq(lit(admin1.as_str()))));
        }
        Ok(self
            .places
            .clone()
            .lazy()
            .filter(col(COUNTRY_CODE).eq(lit(query.country_code.as_str())).and(unit))
            .select(place_columns())
            .sort([GEONAME_ID], SortMultipleOptions::default())
            .collect()?)
    }
}
