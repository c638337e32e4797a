use std::path::{Path, PathBuf};

use itertools::{Itertools, izip};
use polars::prelude::*;
use tracing::{info, instrument};

use super::{
    DataError, Result,
    schema::{GEONAME_ID, LATITUDE, LONGITUDE, conform_places, conform_rivers},
};

/// The two frames a gazetteer store is built from.
#[derive(Debug, Clone)]
pub struct GazetteerFrames {
    pub places: DataFrame,
    pub rivers: DataFrame,
}

impl GazetteerFrames {
    /// Conforms already materialized frames to the gazetteer schema.
    pub fn from_frames(places: DataFrame, rivers: DataFrame) -> Result<Self> {
        Ok(Self {
            places: conform_places(places.lazy())?.collect()?,
            rivers: conform_rivers(rivers.lazy())?.collect()?,
        })
    }

    /// Loads the gazetteer from CSV or Parquet files, chosen by file extension.
    ///
    /// Without a rivers file the gazetteer has no river-mapped places.
    #[instrument(name = "Load Gazetteer", level = "info", skip_all, fields(places = ?places_path.as_ref()))]
    pub fn from_paths(
        places_path: impl AsRef<Path>,
        rivers_path: Option<PathBuf>,
    ) -> Result<Self> {
        let t_load = std::time::Instant::now();
        let places = conform_places(scan(places_path.as_ref())?)?.collect()?;
        let rivers = match rivers_path {
            Some(path) => conform_rivers(scan(&path)?)?.collect()?,
            None => empty_rivers()?,
        };
        info!(
            places = places.height(),
            river_points = rivers.height(),
            elapsed = ?t_load.elapsed(),
            "Gazetteer frames loaded"
        );
        Ok(Self { places, rivers })
    }

    /// Groups the rivers frame into one `(latitude, longitude)` line per river.
    ///
    /// Points keep their `seq` order. Rows with a null id or coordinate are
    /// skipped.
    pub fn river_lines(&self) -> Result<Vec<(u32, Vec<(f64, f64)>)>> {
        let points = izip!(
            self.rivers.column(GEONAME_ID)?.u32()?,
            self.rivers.column(LATITUDE)?.f64()?,
            self.rivers.column(LONGITUDE)?.f64()?,
        )
        .filter_map(|(gid, lat, lon)| Some((gid?, (lat?, lon?))));

        Ok(points
            .chunk_by(|(gid, _)| *gid)
            .into_iter()
            .map(|(gid, line)| (gid, line.map(|(_, point)| point).collect()))
            .collect())
    }
}

fn scan(path: &Path) -> Result<LazyFrame> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("parquet") => Ok(LazyFrame::scan_parquet(path, Default::default())?),
        // Every CSV column is read as text so codes such as "00" survive; the
        // schema cast happens in `conform`.
        Some("csv") => Ok(LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?),
        other => Err(DataError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

pub fn empty_rivers() -> Result<DataFrame> {
    Ok(DataFrame::empty_with_schema(&Schema::from_iter(
        super::schema::RIVERS_SCHEMA,
    )))
}
