//! The [`LocationService`] facade.
//!
//! Every operation is a sequential, stateless pipeline over a read-only
//! [`GazetteerStore`]:
//!
//! ```text
//! raw input -> parse -> intent -> plan -> store -> hydrate -> (rerank)
//! ```
//!
//! ```rust
//! use placefinder::{LocationService, SearchConfig, SearchOptions, data::test_data};
//!
//! let service = LocationService::from_frames(&test_data::gazetteer()?, SearchConfig::default())?;
//! let page = service.query("cecilienhof", &SearchOptions::new())?;
//! assert_eq!(page.candidates[0].name, "Schloss Cecilienhof");
//! # Ok::<(), placefinder::error::PlacefinderError>(())
//! ```

use std::time::Instant;

use placefinder_data::GazetteerFrames;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::{
    admin::{AdminLevels, AdminPath, AdminQuery, AdminResolution, UnitQuery, resolve_levels},
    config::SearchConfig,
    error::Result,
    geo::Coordinate,
    hydrate::{Candidate, hydrate},
    plan::{SearchOptions, SearchQueryBuilder},
    query::{self, FeatureFilter, QueryIntent},
    rerank::rerank,
    store::{FrameStore, GazetteerStore},
    text::TextNormalizer,
};

/// One page of search results and the size of the unpaged result set.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub candidates: Vec<Candidate>,
    pub total: usize,
}

/// Query classification, ranked search and admin hierarchy resolution over a
/// gazetteer store.
///
/// The service holds no mutable state; share it across threads freely.
#[derive(Debug, Clone)]
pub struct LocationService<S = FrameStore> {
    store: S,
    config: SearchConfig,
    normalizer: TextNormalizer,
}

impl LocationService<FrameStore> {
    /// Builds an in-memory [`FrameStore`] over `frames` and serves from it.
    #[instrument(name = "Create LocationService", level = "info", skip_all)]
    pub fn from_frames(frames: &GazetteerFrames, config: SearchConfig) -> Result<Self> {
        let t_init = Instant::now();
        let normalizer = TextNormalizer::new(config.language);
        let store = FrameStore::new(frames, &normalizer)?;
        info!(
            places = store.len(),
            elapsed = ?t_init.elapsed(),
            "LocationService ready"
        );
        Ok(Self {
            store,
            config,
            normalizer,
        })
    }
}

impl<S: GazetteerStore> LocationService<S> {
    /// Serves from an existing store.
    ///
    /// Text representations inside the store must come from the same stemmer
    /// language as `config.language`.
    pub fn new(store: S, config: SearchConfig) -> Self {
        Self {
            normalizer: TextNormalizer::new(config.language),
            store,
            config,
        }
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Classifies raw user input.
    pub fn classify(&self, raw: &str) -> Result<QueryIntent> {
        Ok(query::parse(raw)?)
    }

    /// Runs one search and counts the unpaged result set.
    ///
    /// A missing limit falls back to the configured page size.
    #[instrument(name = "Search", level = "debug", skip_all, fields(intent = ?intent))]
    pub fn search(&self, intent: &QueryIntent, options: &SearchOptions) -> Result<SearchPage> {
        let t_search = Instant::now();
        let queries = SearchQueryBuilder::from_intent(intent, options)
            .limit(options.limit.or(self.config.default_limit))
            .distance_penalty(self.config.distance_penalty)
            .build(&self.normalizer)?;

        let rows = self.store.fetch(&queries.data)?;
        let total = self.store.count(&queries.count)?;
        let candidates = hydrate(&rows)?;
        debug!(
            returned = candidates.len(),
            total,
            elapsed = ?t_search.elapsed(),
            "Search complete"
        );
        Ok(SearchPage { candidates, total })
    }

    /// Classifies `raw` and searches with the resulting intent.
    pub fn query(&self, raw: &str, options: &SearchOptions) -> Result<SearchPage> {
        let intent = self.classify(raw)?;
        self.search(&intent, options)
    }

    /// Runs independent queries in parallel. Results keep input order; the
    /// first failing query fails the batch.
    #[instrument(name = "Bulk Search", level = "info", skip_all, fields(queries = raw_queries.len()))]
    pub fn search_bulk<Q: AsRef<str> + Sync>(
        &self,
        raw_queries: &[Q],
        options: &SearchOptions,
    ) -> Result<Vec<SearchPage>> {
        let t_bulk = Instant::now();
        let pages = raw_queries
            .par_iter()
            .map(|raw| self.query(raw.as_ref(), options))
            .collect::<Result<Vec<_>>>()?;
        info!(elapsed = ?t_bulk.elapsed(), "Bulk search complete");
        Ok(pages)
    }

    /// Resolves the breadcrumb levels around `coordinate` within the
    /// configured admin radius.
    #[instrument(name = "Resolve Admin Path", level = "debug", skip(self))]
    pub fn resolve_admin_path(
        &self,
        coordinate: Coordinate,
        country_code: &str,
        path: &AdminPath,
    ) -> Result<AdminResolution> {
        let nearby = self.store.nearby(&AdminQuery::new(
            coordinate,
            country_code,
            path,
            self.config.admin_radius_meters,
        ))?;
        let units = self.store.units(&UnitQuery::new(country_code, path))?;
        Ok(resolve_levels(
            &coordinate,
            path,
            &hydrate(&nearby)?,
            &hydrate(&units)?,
        ))
    }

    /// Breadcrumb levels anchored at the candidate's own coordinate and path.
    pub fn enrich(&self, candidate: &Candidate) -> Result<AdminLevels> {
        Ok(self
            .resolve_admin_path(
                candidate.coordinate,
                &candidate.country_code,
                &candidate.admin_path(),
            )?
            .levels)
    }

    /// Short, display ordered suggestions for partially typed terms.
    ///
    /// Names starting with the first term are boosted unless a feature filter
    /// is given.
    #[instrument(name = "Autocomplete", level = "debug", skip_all, fields(terms = terms.len()))]
    pub fn autocomplete<T: AsRef<str>>(
        &self,
        terms: &[T],
        features: &FeatureFilter,
    ) -> Result<Vec<Candidate>> {
        let intent = QueryIntent::FreeTextSearch {
            terms: terms.iter().map(|term| term.as_ref().to_string()).collect(),
        };
        let options = SearchOptions::new()
            .features(features.clone())
            .limit(self.config.autocomplete_limit);
        let page = self.search(&intent, &options)?;
        Ok(rerank(
            page.candidates,
            terms,
            features.is_empty(),
            &self.normalizer,
        ))
    }
}
