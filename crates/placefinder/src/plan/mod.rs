//! Store independent search plans.
//!
//! A search is described once as a [`SearchScope`] (what rows qualify and how
//! they are scored) and then split into a [`DataQuery`] and a [`CountQuery`].
//! Both carry the same scope, so a page of results and its total can never
//! disagree about which rows match.

pub mod sql;

use std::{fmt, str::FromStr};

use tracing::{debug, instrument};

pub use error::PlanError;
use error::Result;

use crate::{
    geo::Coordinate,
    query::{FeatureFilter, QueryIntent},
    text::TextNormalizer,
};

/// Relevance points subtracted per meter of effective distance.
pub const DEFAULT_DISTANCE_PENALTY: f64 = 0.01;

/// A row filter. Every predicate of a scope must hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The place has a search index entry.
    IndexEntry,
    /// Each token is a prefix of a normalized name token, or each stemmed token
    /// is a prefix of a stemmed name token.
    Text {
        normalized: Vec<String>,
        stemmed: Vec<String>,
    },
    GeonameId(u32),
    /// Feature class or feature code is allowed.
    Features(FeatureFilter),
    /// Effective distance to the scope origin is at most this many meters.
    WithinRadius(f64),
}

/// Qualifying rows and their scoring, shared by the data and count query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchScope {
    pub predicates: Vec<Predicate>,
    pub origin: Option<Coordinate>,
    pub distance_penalty: f64,
}

impl SearchScope {
    #[must_use]
    pub fn radius(&self) -> Option<f64> {
        self.predicates.iter().find_map(|predicate| match predicate {
            Predicate::WithinRadius(radius) => Some(*radius),
            _ => None,
        })
    }
}

/// Caller facing sort keys.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Relevance,
    Distance,
    /// Distance from the caller's own position, the options coordinate. It
    /// takes precedence over a coordinate in the query.
    DistanceUser,
    /// Relevance with the caller's own position as origin, chosen like
    /// [`SortKey::DistanceUser`].
    RelevanceUser,
    Name,
    GeonameId,
}

impl SortKey {
    pub const ALL: [Self; 6] = [
        Self::Relevance,
        Self::Distance,
        Self::DistanceUser,
        Self::RelevanceUser,
        Self::Name,
        Self::GeonameId,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Distance => "distance",
            Self::DistanceUser => "distance_user",
            Self::RelevanceUser => "relevance_user",
            Self::Name => "name",
            Self::GeonameId => "geoname_id",
        }
    }

    #[must_use]
    pub const fn order(self) -> SortOrder {
        match self {
            Self::Relevance | Self::RelevanceUser => SortOrder::RelevanceDesc,
            Self::Distance | Self::DistanceUser => SortOrder::DistanceAsc,
            Self::Name => SortOrder::NameAsc,
            Self::GeonameId => SortOrder::GeonameIdAsc,
        }
    }

    /// Whether the origin is the caller's position rather than the queried one.
    #[must_use]
    pub const fn is_user_relative(self) -> bool {
        matches!(self, Self::DistanceUser | Self::RelevanceUser)
    }

    const fn needs_coordinate(self) -> bool {
        matches!(
            self,
            Self::Distance | Self::DistanceUser | Self::RelevanceUser
        )
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| PlanError::UnknownSortKey(s.to_string()))
    }
}

/// Resolved ordering. Every order is followed by geoname id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    RelevanceDesc,
    DistanceAsc,
    NameAsc,
    GeonameIdAsc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    /// `None` is unbounded.
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    pub scope: SearchScope,
    pub order: SortOrder,
    pub page: Page,
}

/// Counts every row of the scope; never limited.
#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub scope: SearchScope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQueries {
    pub data: DataQuery,
    pub count: CountQuery,
}

/// Per request search options.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub features: FeatureFilter,
    pub coordinate: Option<Coordinate>,
    pub radius_meters: Option<f64>,
    pub limit: Option<usize>,
    /// 1-indexed.
    pub page: usize,
    pub sort: Option<SortKey>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            features: FeatureFilter::default(),
            coordinate: None,
            radius_meters: None,
            limit: None,
            page: 1,
            sort: None,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(mut self, features: FeatureFilter) -> Self {
        self.features = features;
        self
    }

    pub fn coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn radius(mut self, meters: f64) -> Self {
        self.radius_meters = Some(meters);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Assembles the data and count query of one search.
#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
    geoname_id: Option<u32>,
    features: FeatureFilter,
    origin: Option<Coordinate>,
    radius: Option<f64>,
    sort: Option<SortKey>,
    page: usize,
    limit: Option<usize>,
    distance_penalty: f64,
}

impl Default for SearchQueryBuilder {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            geoname_id: None,
            features: FeatureFilter::default(),
            origin: None,
            radius: None,
            sort: None,
            page: 1,
            limit: None,
            distance_penalty: DEFAULT_DISTANCE_PENALTY,
        }
    }
}

impl SearchQueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the builder from a classified intent and the caller's options.
    ///
    /// Feature filters of the intent and the options are merged. A coordinate
    /// in the intent takes precedence over one in the options, unless the sort
    /// key is relative to the caller's position.
    #[must_use]
    pub fn from_intent(intent: &QueryIntent, options: &SearchOptions) -> Self {
        let mut features = options.features.clone();
        if let Some(intent_features) = intent.features() {
            features
                .feature_classes
                .extend(intent_features.feature_classes.iter().cloned());
            features
                .feature_codes
                .extend(intent_features.feature_codes.iter().cloned());
        }
        let mut builder = Self {
            terms: intent.terms().to_vec(),
            features,
            origin: match options.sort {
                Some(sort) if sort.is_user_relative() && options.coordinate.is_some() => {
                    options.coordinate
                }
                _ => intent.coordinate().or(options.coordinate),
            },
            radius: options.radius_meters,
            sort: options.sort,
            page: options.page,
            limit: options.limit,
            ..Self::default()
        };
        if let QueryIntent::GeonameIdLookup { id } = intent {
            builder.geoname_id = Some(*id);
        }
        if builder.sort.is_none() && intent.coordinate().is_some() {
            builder.sort = Some(SortKey::Distance);
        }
        builder
    }

    pub fn terms<I: IntoIterator<Item = S>, S: Into<String>>(mut self, terms: I) -> Self {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn geoname_id(mut self, id: u32) -> Self {
        self.geoname_id = Some(id);
        self
    }

    pub fn features(mut self, features: FeatureFilter) -> Self {
        self.features = features;
        self
    }

    pub fn coordinate(mut self, origin: Coordinate) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn radius(mut self, meters: f64) -> Self {
        self.radius = Some(meters);
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn distance_penalty(mut self, penalty: f64) -> Self {
        self.distance_penalty = penalty;
        self
    }

    /// Validates the combination and emits both queries from a single scope.
    #[instrument(name = "Build search queries", level = "debug", skip_all)]
    pub fn build(self, normalizer: &TextNormalizer) -> Result<SearchQueries> {
        let sort = self.sort.unwrap_or(SortKey::Relevance);
        if self.origin.is_none() {
            if sort.needs_coordinate() {
                return Err(PlanError::MissingCoordinate {
                    reason: format!("sort by {sort}"),
                });
            }
            if self.radius.is_some() {
                return Err(PlanError::MissingCoordinate {
                    reason: "radius filter".to_string(),
                });
            }
        }
        if let Some(radius) = self.radius
            && !(radius.is_finite() && radius >= 0.0)
        {
            return Err(PlanError::InvalidRadius(radius));
        }
        if !(self.distance_penalty.is_finite() && self.distance_penalty >= 0.0) {
            return Err(PlanError::InvalidPenalty(self.distance_penalty));
        }
        let page = self.page_window()?;

        let mut predicates = Vec::new();
        if let Some(id) = self.geoname_id {
            predicates.push(Predicate::GeonameId(id));
        } else {
            predicates.push(Predicate::IndexEntry);
            let joined = self.terms.join(" ");
            // Terms without a single token still have to match, so they match nothing.
            if !joined.trim().is_empty() {
                predicates.push(Predicate::Text {
                    normalized: normalizer.normalized_tokens(&joined),
                    stemmed: normalizer.stemmed_tokens(&joined),
                });
            }
        }
        if !self.features.is_empty() {
            predicates.push(Predicate::Features(self.features));
        }
        if let Some(radius) = self.radius {
            predicates.push(Predicate::WithinRadius(radius));
        }

        let scope = SearchScope {
            predicates,
            origin: self.origin,
            distance_penalty: self.distance_penalty,
        };
        debug!(?scope, order = ?sort.order(), ?page, "Search scope built");
        Ok(SearchQueries {
            count: CountQuery {
                scope: scope.clone(),
            },
            data: DataQuery {
                scope,
                order: sort.order(),
                page,
            },
        })
    }

    fn page_window(&self) -> Result<Page> {
        match (self.page, self.limit) {
            (0, _) => Err(PlanError::InvalidPage(0)),
            (1, limit) => Ok(Page { limit, offset: 0 }),
            (page, Some(limit)) => Ok(Page {
                limit: Some(limit),
                offset: (page - 1)
                    .checked_mul(limit)
                    .ok_or(PlanError::PageOutOfRange { page, limit })?,
            }),
            (page, None) => Err(PlanError::PageWithoutLimit(page)),
        }
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum PlanError {
        #[error("A coordinate is required for {reason}")]
        MissingCoordinate { reason: String },
        #[error("Pages are 1-indexed, got page {0}")]
        InvalidPage(usize),
        #[error("Page {0} requested without a limit")]
        PageWithoutLimit(usize),
        #[error("Page {page} of size {limit} is beyond any addressable row")]
        PageOutOfRange { page: usize, limit: usize },
        #[error("Radius must be a non-negative number of meters, got {0}")]
        InvalidRadius(f64),
        #[error("Distance penalty must be non-negative, got {0}")]
        InvalidPenalty(f64),
        #[error("Unknown sort key {0:?}")]
        UnknownSortKey(String),
    }
    pub type Result<T> = std::result::Result<T, PlanError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    fn build(intent: &QueryIntent, options: &SearchOptions) -> Result<SearchQueries> {
        SearchQueryBuilder::from_intent(intent, options).build(&TextNormalizer::default())
    }

    #[test]
    fn test_data_and_count_share_scope() {
        let intent = parse("Berlin Mitte").unwrap();
        let options = SearchOptions::new()
            .coordinate(Coordinate::new(52.52, 13.4))
            .radius(5_000.0)
            .limit(10)
            .page(3);
        let queries = build(&intent, &options).unwrap();
        assert_eq!(queries.data.scope, queries.count.scope);
        assert_eq!(
            queries.data.page,
            Page {
                limit: Some(10),
                offset: 20
            }
        );
        assert_eq!(queries.data.order, SortOrder::RelevanceDesc);
        assert_eq!(queries.count.scope.radius(), Some(5_000.0));
    }

    #[test]
    fn test_text_terms_become_prefix_tokens() {
        let queries = build(&parse("Schloß Cecilienhof").unwrap(), &SearchOptions::new()).unwrap();
        let text = queries
            .data
            .scope
            .predicates
            .iter()
            .find_map(|predicate| match predicate {
                Predicate::Text { normalized, .. } => Some(normalized.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(text, ["schloss", "cecilienhof"]);
        assert!(queries.data.scope.predicates.contains(&Predicate::IndexEntry));
    }

    #[test]
    fn test_empty_terms_only_require_an_index_entry() {
        let queries = build(&parse("").unwrap(), &SearchOptions::new()).unwrap();
        assert_eq!(queries.data.scope.predicates, [Predicate::IndexEntry]);
        assert_eq!(queries.data.page, Page::default());
    }

    #[test]
    fn test_terms_without_tokens_match_nothing() {
        for raw in ["!!!", "--", " , "] {
            let queries = build(&parse(raw).unwrap(), &SearchOptions::new()).unwrap();
            assert_eq!(
                queries.data.scope.predicates,
                [
                    Predicate::IndexEntry,
                    Predicate::Text {
                        normalized: Vec::new(),
                        stemmed: Vec::new(),
                    },
                ],
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_id_lookup_has_no_text_predicate() {
        let queries = build(&parse("2950159").unwrap(), &SearchOptions::new()).unwrap();
        assert_eq!(queries.data.scope.predicates, [Predicate::GeonameId(2_950_159)]);
    }

    #[test]
    fn test_coordinate_intents_default_to_distance_and_merge_features() {
        let intent = parse("AIRP 52.5,13.4").unwrap();
        let options = SearchOptions::new().features(FeatureFilter::classes(["S"]));
        let queries = build(&intent, &options).unwrap();
        assert_eq!(queries.data.order, SortOrder::DistanceAsc);
        assert_eq!(queries.data.scope.origin, Some(Coordinate::new(52.5, 13.4)));
        let Some(Predicate::Features(features)) = queries.data.scope.predicates.last() else {
            panic!("expected a feature predicate");
        };
        assert!(features.feature_classes.contains("S"));
        assert!(features.feature_codes.contains("AIRP"));
    }

    #[test]
    fn test_user_sorts_measure_from_the_caller() {
        let intent = parse("AIRP 28.137008,-15.438614").unwrap();
        let caller = Coordinate::new(52.52, 13.4);

        let user = build(
            &intent,
            &SearchOptions::new().coordinate(caller).sort(SortKey::DistanceUser),
        )
        .unwrap();
        assert_eq!(user.data.scope.origin, Some(caller));
        assert_eq!(user.data.order, SortOrder::DistanceAsc);

        let queried = build(
            &intent,
            &SearchOptions::new().coordinate(caller).sort(SortKey::Distance),
        )
        .unwrap();
        assert_eq!(
            queried.data.scope.origin,
            Some(Coordinate::new(28.137008, -15.438614))
        );

        let no_caller = build(&intent, &SearchOptions::new().sort(SortKey::RelevanceUser)).unwrap();
        assert_eq!(
            no_caller.data.scope.origin,
            Some(Coordinate::new(28.137008, -15.438614))
        );
    }

    #[test]
    fn test_distance_shapes_need_a_coordinate() {
        let intent = parse("Berlin").unwrap();
        for options in [
            SearchOptions::new().sort(SortKey::Distance),
            SearchOptions::new().sort(SortKey::DistanceUser),
            SearchOptions::new().sort(SortKey::RelevanceUser),
            SearchOptions::new().radius(100.0),
        ] {
            assert!(matches!(
                build(&intent, &options),
                Err(PlanError::MissingCoordinate { .. })
            ));
        }
        let user = SearchOptions::new()
            .coordinate(Coordinate::new(0.0, 0.0))
            .sort(SortKey::RelevanceUser);
        assert_eq!(build(&intent, &user).unwrap().data.order, SortOrder::RelevanceDesc);
    }

    #[test]
    fn test_invalid_paging() {
        let intent = parse("Berlin").unwrap();
        assert_eq!(
            build(&intent, &SearchOptions::new().page(0)),
            Err(PlanError::InvalidPage(0))
        );
        assert_eq!(
            build(&intent, &SearchOptions::new().page(2)),
            Err(PlanError::PageWithoutLimit(2))
        );
        assert_eq!(
            build(&intent, &SearchOptions::new().limit(usize::MAX / 2).page(4)),
            Err(PlanError::PageOutOfRange {
                page: 4,
                limit: usize::MAX / 2
            })
        );
        assert_eq!(
            build(&intent, &SearchOptions::new().limit(usize::MAX).page(2))
                .unwrap()
                .data
                .page
                .offset,
            usize::MAX
        );
        assert!(matches!(
            build(
                &intent,
                &SearchOptions::new()
                    .coordinate(Coordinate::new(0.0, 0.0))
                    .radius(-1.0)
            ),
            Err(PlanError::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_sort_keys_parse_from_their_names() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().unwrap(), key);
        }
        assert!(matches!(
            "population".parse::<SortKey>(),
            Err(PlanError::UnknownSortKey(_))
        ));
        assert_eq!(SortKey::Name.order(), SortOrder::NameAsc);
        assert_eq!(SortKey::GeonameId.order(), SortOrder::GeonameIdAsc);
    }
}
