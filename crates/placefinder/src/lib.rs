//! Placefinder - gazetteer query classification, ranked search and
//! administrative hierarchy resolution.
//!
//! Raw user input is classified into an intent (a geoname id, a coordinate, a
//! coordinate with a feature filter, or free text), planned into a data query
//! and a count query sharing one predicate scope, executed against a
//! [`GazetteerStore`] and hydrated into typed [`Candidate`]s. Candidates can be
//! enriched with their breadcrumb of administrative units.
//!
//! # Quick Start
//!
//! ```rust
//! use placefinder::{LocationService, SearchConfig, SearchOptions, data::test_data};
//!
//! let service = LocationService::from_frames(&test_data::gazetteer()?, SearchConfig::default())?;
//!
//! let page = service.query("Berlin Hauptbahnhof", &SearchOptions::new())?;
//! let station = &page.candidates[0];
//!
//! let levels = service.enrich(station)?;
//! assert_eq!(levels.city_municipality.unwrap().name, "Berlin");
//! # Ok::<(), placefinder::error::PlacefinderError>(())
//! ```
//!
//! # Stores
//!
//! [`FrameStore`] answers queries in memory over polars frames. Other backends
//! implement [`GazetteerStore`]; [`plan::sql`] renders the same plans as
//! parameterized PostGIS statements.

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod admin;
mod config;
mod core;
pub mod error;
mod geo;
mod hydrate;
pub mod plan;
mod query;
mod rerank;
mod store;
mod text;

pub use crate::core::{LocationService, SearchPage};

pub use admin::{
    AdminLevels, AdminPath, AdminQuery, AdminResolution, AdminUnit, BucketMatch, LocationType,
    UnitQuery, resolve_levels,
};
pub use config::{SearchConfig, SearchConfigBuilder};
pub use geo::{ClosestPoint, Coordinate, EARTH_RADIUS_METERS, closest_point_on_line};
pub use hydrate::{Candidate, HydrateError, hydrate};
pub use placefinder_data as data;
pub use plan::{PlanError, SearchOptions, SearchQueryBuilder, SortKey};
pub use polars;
pub use query::{Dms, FeatureFilter, FeatureToken, Hemisphere, QueryError, QueryIntent, parse};
pub use rerank::rerank;
pub use store::{FrameStore, GazetteerStore, StoreError};
pub use tantivy::tokenizer::Language;
pub use text::TextNormalizer;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for placefinder.
///
/// `RUST_LOG` takes precedence over `level`. Repeated calls are no-ops.
///
/// ```rust
/// use placefinder::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), placefinder::error::PlacefinderError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::PlacefinderError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?)
            .add_directive("polars=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_init_logging_twice() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_service_creation() {
        setup_test_env();
        let service =
            LocationService::from_frames(&data::test_data::gazetteer().unwrap(), SearchConfig::default());
        assert!(service.is_ok(), "Should build a service over the fixture");
        assert_eq!(service.unwrap().store().len(), data::test_data::PLACES.len());
    }

    #[test]
    fn test_empty_query_lists_index() {
        setup_test_env();
        let service =
            LocationService::from_frames(&data::test_data::gazetteer().unwrap(), SearchConfig::default())
                .unwrap();
        let page = service.query("   ", &SearchOptions::new()).unwrap();
        assert_eq!(page.total, data::test_data::PLACES.len());
        assert!(page.candidates.len() <= page.total);
    }
}
