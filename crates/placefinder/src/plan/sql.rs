//! Rendering of search plans and admin lookups as parameterized PostGIS SQL.
//!
//! The data and count statements of a search are rendered from the same
//! `FROM ... WHERE ...` fragment. Placeholders are numbered `$1..$n` in the
//! order of [`SqlStatement::params`].

use std::fmt::Write as _;

use itertools::Itertools;
use tracing::instrument;

use super::{CountQuery, DataQuery, Predicate, SearchScope, SortOrder};
use crate::{
    admin::{AdminQuery, COUNTRY_CODES, STATE_CODE, UnitQuery},
    query::FeatureFilter,
};

const PLACE_COLUMNS: &str = "p.id, p.geoname_id, p.name, p.latitude, p.longitude, \
    p.feature_class, p.feature_code, p.population, p.country_code, \
    p.admin1_code, p.admin2_code, p.admin3_code, p.admin4_code, p.alternate_names";

const FROM_PLACES: &str = "FROM place p LEFT JOIN river r ON r.geoname_id = p.geoname_id";

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Default)]
struct Params(Vec<SqlParam>);

impl Params {
    fn bind(&mut self, param: SqlParam) -> String {
        self.0.push(param);
        format!("${}", self.0.len())
    }
}

/// The shared fragment plus the expressions the select list needs.
struct RenderedScope {
    from_where: String,
    distance: Option<String>,
    origin: Option<String>,
}

fn tsquery(tokens: &[String]) -> String {
    tokens.iter().map(|token| format!("{token}:*")).join(" & ")
}

fn features_sql(features: &FeatureFilter, params: &mut Params) -> String {
    let mut parts = Vec::with_capacity(2);
    if !features.feature_classes.is_empty() {
        let list = params.bind(SqlParam::TextList(
            features.feature_classes.iter().cloned().collect(),
        ));
        parts.push(format!("p.feature_class = ANY({list})"));
    }
    if !features.feature_codes.is_empty() {
        let list = params.bind(SqlParam::TextList(
            features.feature_codes.iter().cloned().collect(),
        ));
        parts.push(format!("p.feature_code = ANY({list})"));
    }
    if parts.is_empty() {
        return "TRUE".to_string();
    }
    format!("({})", parts.join(" OR "))
}

fn render_scope(scope: &SearchScope, params: &mut Params) -> RenderedScope {
    let origin = scope.origin.map(|origin| {
        let lon = params.bind(SqlParam::Float(origin.longitude));
        let lat = params.bind(SqlParam::Float(origin.latitude));
        format!("ST_SetSRID(ST_MakePoint({lon}, {lat}), 4326)")
    });
    let distance = origin.as_ref().map(|origin| {
        format!(
            "COALESCE(ST_Distance(r.geometry::geography, {origin}::geography), \
             ST_Distance(p.location::geography, {origin}::geography))"
        )
    });

    let conditions = scope
        .predicates
        .iter()
        .filter_map(|predicate| match predicate {
            Predicate::IndexEntry => Some("p.relevance IS NOT NULL".to_string()),
            Predicate::Text {
                normalized,
                stemmed,
            } if normalized.is_empty() && stemmed.is_empty() => Some("FALSE".to_string()),
            Predicate::Text {
                normalized,
                stemmed,
            } => {
                let normalized = params.bind(SqlParam::Text(tsquery(normalized)));
                let stemmed = params.bind(SqlParam::Text(tsquery(stemmed)));
                Some(format!(
                    "(p.normalized_tsv @@ to_tsquery('simple', {normalized}) \
                     OR p.stemmed_tsv @@ to_tsquery('simple', {stemmed}))"
                ))
            }
            Predicate::GeonameId(id) => {
                let id = params.bind(SqlParam::Int(i64::from(*id)));
                Some(format!("p.geoname_id = {id}"))
            }
            Predicate::Features(features) => Some(features_sql(features, params)),
            Predicate::WithinRadius(radius) => distance.as_ref().map(|distance| {
                let radius = params.bind(SqlParam::Float(*radius));
                format!("{distance} <= {radius}")
            }),
        })
        .collect_vec();

    let mut from_where = FROM_PLACES.to_string();
    if !conditions.is_empty() {
        let _ = write!(from_where, " WHERE {}", conditions.join(" AND "));
    }
    RenderedScope {
        from_where,
        distance,
        origin,
    }
}

/// Renders the ranked, paged data statement.
#[instrument(name = "Render data SQL", level = "trace", skip_all)]
#[must_use]
pub fn render_data(query: &DataQuery) -> SqlStatement {
    let mut params = Params::default();
    let scope = render_scope(&query.scope, &mut params);

    let penalty = match &scope.distance {
        Some(distance) => {
            let factor = params.bind(SqlParam::Float(query.scope.distance_penalty));
            format!(" - ROUND({distance} * {factor})::bigint")
        }
        None => String::new(),
    };
    let mut select = format!("SELECT {PLACE_COLUMNS}, COALESCE(p.relevance, 0){penalty} AS relevance_score");
    if let (Some(distance), Some(origin)) = (&scope.distance, &scope.origin) {
        let _ = write!(
            select,
            ", {distance} AS closest_distance, \
             ST_AsText(ST_ClosestPoint(r.geometry, {origin})) AS closest_point"
        );
    }

    let order = match query.order {
        SortOrder::RelevanceDesc => "relevance_score DESC, p.geoname_id ASC",
        SortOrder::DistanceAsc => "closest_distance ASC NULLS LAST, p.geoname_id ASC",
        SortOrder::NameAsc => "p.name ASC, p.geoname_id ASC",
        SortOrder::GeonameIdAsc => "p.geoname_id ASC",
    };
    let mut text = format!("{select} {} ORDER BY {order}", scope.from_where);
    if let Some(limit) = query.page.limit {
        let limit = params.bind(SqlParam::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        let _ = write!(text, " LIMIT {limit}");
    }
    if query.page.offset > 0 {
        let offset = params.bind(SqlParam::Int(
            i64::try_from(query.page.offset).unwrap_or(i64::MAX),
        ));
        let _ = write!(text, " OFFSET {offset}");
    }
    SqlStatement {
        text,
        params: params.0,
    }
}

/// Renders the unlimited count statement.
#[instrument(name = "Render count SQL", level = "trace", skip_all)]
#[must_use]
pub fn render_count(query: &CountQuery) -> SqlStatement {
    let mut params = Params::default();
    let scope = render_scope(&query.scope, &mut params);
    SqlStatement {
        text: format!("SELECT COUNT(*) AS total {}", scope.from_where),
        params: params.0,
    }
}

#[must_use]
pub fn render_nearby(query: &AdminQuery) -> SqlStatement {
    let mut params = Params::default();
    let lon = params.bind(SqlParam::Float(query.anchor.longitude));
    let lat = params.bind(SqlParam::Float(query.anchor.latitude));
    let distance = format!(
        "ST_Distance(p.location::geography, ST_SetSRID(ST_MakePoint({lon}, {lat}), 4326)::geography)"
    );
    let country = params.bind(SqlParam::Text(query.country_code.clone()));
    let codes = params.bind(SqlParam::TextList(query.feature_codes.clone()));
    let radius = params.bind(SqlParam::Float(query.radius_meters));
    let mut text = format!(
        "SELECT {PLACE_COLUMNS}, {distance} AS closest_distance FROM place p \
         WHERE p.country_code = {country} AND p.feature_code = ANY({codes}) \
         AND {distance} <= {radius}"
    );
    if let Some(admin1) = &query.admin1 {
        let admin1 = params.bind(SqlParam::Text(admin1.clone()));
        let _ = write!(text, " AND p.admin1_code = {admin1}");
    }
    text.push_str(" ORDER BY closest_distance ASC, p.geoname_id ASC");
    SqlStatement {
        text,
        params: params.0,
    }
}

#[must_use]
pub fn render_units(query: &UnitQuery) -> SqlStatement {
    let mut params = Params::default();
    let country = params.bind(SqlParam::Text(query.country_code.clone()));
    let countries = params.bind(SqlParam::TextList(
        COUNTRY_CODES.iter().map(ToString::to_string).collect(),
    ));
    let mut unit = format!("p.feature_code = ANY({countries})");
    if let Some(admin1) = &query.admin1 {
        let state = params.bind(SqlParam::Text(STATE_CODE.to_string()));
        let admin1 = params.bind(SqlParam::Text(admin1.clone()));
        let _ = write!(
            unit,
            " OR (p.feature_code = {state} AND p.admin1_code = {admin1})"
        );
    }
    SqlStatement {
        text: format!(
            "SELECT {PLACE_COLUMNS} FROM place p WHERE p.country_code = {country} AND ({unit}) \
             ORDER BY p.geoname_id ASC"
        ),
        params: params.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        admin::AdminPath,
        geo::Coordinate,
        plan::{SearchOptions, SearchQueryBuilder, SortKey},
        query::parse,
        text::TextNormalizer,
    };

    fn queries(raw: &str, options: &SearchOptions) -> crate::plan::SearchQueries {
        SearchQueryBuilder::from_intent(&parse(raw).unwrap(), options)
            .build(&TextNormalizer::default())
            .unwrap()
    }

    fn where_clause(text: &str) -> &str {
        let start = text.find(FROM_PLACES).unwrap();
        let end = text.find(" ORDER BY").unwrap_or(text.len());
        &text[start..end]
    }

    #[test]
    fn test_data_and_count_share_from_where() {
        let options = SearchOptions::new()
            .coordinate(Coordinate::new(52.52, 13.4))
            .radius(2_000.0)
            .features(FeatureFilter::parse("P|AIRP").unwrap())
            .limit(20)
            .page(2);
        let q = queries("Berlin Mitte", &options);
        let data = render_data(&q.data);
        let count = render_count(&q.count);

        assert_eq!(where_clause(&data.text), where_clause(&count.text));
        assert_eq!(data.params[..count.params.len()], count.params[..]);
        assert!(data.text.ends_with("LIMIT $9 OFFSET $10"), "{}", data.text);
        assert!(!count.text.contains("LIMIT"));
        assert_eq!(data.params[2], SqlParam::Text("berlin:* & mitte:*".to_string()));
    }

    #[test]
    fn test_empty_search_renders_index_entry_only() {
        let q = queries("", &SearchOptions::new());
        let data = render_data(&q.data);
        assert_eq!(
            data.text,
            format!(
                "SELECT {PLACE_COLUMNS}, COALESCE(p.relevance, 0) AS relevance_score \
                 {FROM_PLACES} WHERE p.relevance IS NOT NULL \
                 ORDER BY relevance_score DESC, p.geoname_id ASC"
            )
        );
        assert!(data.params.is_empty());
    }

    #[test]
    fn test_tokenless_terms_render_false() {
        let q = queries("!!!", &SearchOptions::new());
        let data = render_data(&q.data);
        let count = render_count(&q.count);
        assert!(
            where_clause(&data.text).ends_with("WHERE p.relevance IS NOT NULL AND FALSE"),
            "{}",
            data.text
        );
        assert_eq!(where_clause(&data.text), where_clause(&count.text));
        assert!(!data.text.contains("to_tsquery"));
        assert!(data.params.is_empty());
    }

    #[test]
    fn test_oversized_paging_saturates() {
        let q = queries("berlin", &SearchOptions::new().limit(usize::MAX).page(2));
        let data = render_data(&q.data);
        assert_eq!(data.params[data.params.len() - 2], SqlParam::Int(i64::MAX));
        assert_eq!(data.params[data.params.len() - 1], SqlParam::Int(i64::MAX));
    }

    #[test]
    fn test_distance_sort_projects_river_point() {
        let q = queries("AIRP 52.524889,13.3692797", &SearchOptions::new().sort(SortKey::Distance));
        let data = render_data(&q.data);
        assert!(data.text.contains("ST_ClosestPoint(r.geometry"));
        assert!(data.text.contains("COALESCE(ST_Distance(r.geometry::geography"));
        assert!(data.text.contains("closest_distance ASC NULLS LAST"));
        assert_eq!(data.params[0], SqlParam::Float(13.369_279_7));
        assert_eq!(data.params[1], SqlParam::Float(52.524_889));
    }

    #[test]
    fn test_admin_lookups() {
        let path = AdminPath::from_codes(&["11", "00"]);
        let nearby = render_nearby(&AdminQuery::new(Coordinate::new(52.4, 13.0), "DE", &path, 15_000.0));
        assert!(nearby.text.contains("p.admin1_code = $6"));
        assert_eq!(nearby.params[2], SqlParam::Text("DE".to_string()));

        let units = render_units(&UnitQuery::new("DE", &AdminPath::default()));
        assert!(!units.text.contains("admin1_code ="));
        assert_eq!(units.params.len(), 2);
    }
}
