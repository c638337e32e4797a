//! Best-fit administrative units around an anchor coordinate.
//!
//! Places near the anchor are sorted into buckets by feature code and admin
//! path depth, ranked inside each bucket, and the winners fill the five
//! breadcrumb levels from district up to country.

use std::cmp::Ordering;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::{geo::Coordinate, hydrate::Candidate};

/// Codes of populated places that seat a government or capital.
pub const SEAT_CODES: [&str; 7] = ["PPLC", "PPLA", "PPLA2", "PPLA3", "PPLA4", "PPLA5", "PPLG"];
/// Codes of ordinary populated places.
pub const GENERIC_PLACE_CODES: [&str; 5] = ["PPL", "PPLF", "PPLL", "PPLR", "PPLS"];
pub const DISTRICT_CODE: &str = "PPLX";
pub const STATE_CODE: &str = "ADM1";
/// Country-level units, most authoritative first.
pub const COUNTRY_CODES: [&str; 7] = ["PCLI", "PCLD", "PCLF", "PCLS", "PCLIX", "PCL", "TERR"];

/// Bucket of a nearby place. The discriminant is the bucket's stable id.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationType {
    Adm2 = 10,
    Adm3 = 11,
    Adm4 = 12,
    Adm5 = 13,
    City = 20,
    District = 21,
    CityDistrict = 29,
    Unknown = 90,
}

impl LocationType {
    pub const EMITTED: [Self; 7] = [
        Self::Adm2,
        Self::Adm3,
        Self::Adm4,
        Self::Adm5,
        Self::City,
        Self::District,
        Self::CityDistrict,
    ];

    /// Classifies a place by feature code and the depth of its own admin path.
    #[must_use]
    pub fn classify(feature_code: &str, path: &AdminPath) -> Self {
        match feature_code {
            "ADM2" => Self::Adm2,
            "ADM3" => Self::Adm3,
            "ADM4" => Self::Adm4,
            "ADM5" => Self::Adm5,
            DISTRICT_CODE => Self::District,
            code if SEAT_CODES.contains(&code) => Self::City,
            code if GENERIC_PLACE_CODES.contains(&code) => {
                if path.depth() == 4 {
                    Self::CityDistrict
                } else {
                    Self::City
                }
            }
            _ => Self::Unknown,
        }
    }

    /// Feature codes of the bucket in descending priority.
    #[must_use]
    pub fn priority(self) -> Vec<&'static str> {
        match self {
            Self::Adm2 => vec!["ADM2"],
            Self::Adm3 => vec!["ADM3"],
            Self::Adm4 => vec!["ADM4"],
            Self::Adm5 => vec!["ADM5"],
            Self::City => SEAT_CODES.into_iter().chain(GENERIC_PLACE_CODES).collect(),
            Self::District => vec![DISTRICT_CODE],
            Self::CityDistrict => GENERIC_PLACE_CODES.to_vec(),
            Self::Unknown => Vec::new(),
        }
    }

    /// Admin levels that must agree with the anchor path.
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Self::Adm2 => 2,
            Self::Adm3 | Self::City => 3,
            Self::Adm4 | Self::Adm5 | Self::District | Self::CityDistrict => 4,
            Self::Unknown => 0,
        }
    }

    /// Populated place buckets rank by population before distance.
    #[must_use]
    pub const fn is_place(self) -> bool {
        matches!(self, Self::City | Self::District | Self::CityDistrict)
    }

    /// Whether a place of this bucket with `row` path sits inside `anchor`.
    ///
    /// A level the anchor leaves empty matches anything. An ADM2 unit must
    /// also stop at admin2.
    #[must_use]
    pub fn path_matches(self, anchor: &AdminPath, row: &AdminPath) -> bool {
        if self == Self::Unknown {
            return false;
        }
        let prefix_matches = (0..self.depth()).all(|level| match &anchor.codes[level] {
            Some(code) => row.codes[level].as_ref() == Some(code),
            None => true,
        });
        let stops = self != Self::Adm2 || (row.codes[2].is_none() && row.codes[3].is_none());
        prefix_matches && stops
    }
}

/// Every feature code that lands in an emitted bucket.
#[must_use]
pub fn bucket_feature_codes() -> Vec<&'static str> {
    LocationType::EMITTED
        .into_iter()
        .flat_map(LocationType::priority)
        .unique()
        .collect()
}

/// Admin codes admin1 to admin4; a trailing `None` ends the path.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AdminPath {
    pub codes: [Option<String>; 4],
}

impl AdminPath {
    #[must_use]
    pub fn new(codes: [Option<String>; 4]) -> Self {
        Self {
            codes: codes.map(|code| code.filter(|c| !c.is_empty())),
        }
    }

    #[must_use]
    pub fn from_codes(codes: &[&str]) -> Self {
        Self::new(std::array::from_fn(|level| {
            codes.get(level).map(ToString::to_string)
        }))
    }

    #[must_use]
    pub fn admin1(&self) -> Option<&str> {
        self.codes[0].as_deref()
    }

    /// Number of leading levels that carry a code.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.codes.iter().take_while(|code| code.is_some()).count()
    }
}

/// Places of `country_code` within `radius_meters` of `anchor` whose feature
/// code is one of `feature_codes`, restricted to `admin1` when given.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminQuery {
    pub anchor: Coordinate,
    pub country_code: String,
    pub admin1: Option<String>,
    pub radius_meters: f64,
    pub feature_codes: Vec<String>,
}

/// The country units of `country_code`, plus its `ADM1` unit for `admin1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitQuery {
    pub country_code: String,
    pub admin1: Option<String>,
}

impl AdminQuery {
    #[must_use]
    pub fn new(anchor: Coordinate, country_code: &str, path: &AdminPath, radius_meters: f64) -> Self {
        Self {
            anchor,
            country_code: country_code.to_string(),
            admin1: path.admin1().map(ToString::to_string),
            radius_meters,
            feature_codes: bucket_feature_codes()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl UnitQuery {
    #[must_use]
    pub fn new(country_code: &str, path: &AdminPath) -> Self {
        Self {
            country_code: country_code.to_string(),
            admin1: path.admin1().map(ToString::to_string),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUnit {
    pub name: String,
    pub geoname_id: u32,
}

impl From<&Candidate> for AdminUnit {
    fn from(candidate: &Candidate) -> Self {
        Self {
            name: candidate.name.clone(),
            geoname_id: candidate.geoname_id,
        }
    }
}

/// The five breadcrumb levels; `None` when nothing fits.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminLevels {
    pub district_locality: Option<AdminUnit>,
    pub borough_locality: Option<AdminUnit>,
    pub city_municipality: Option<AdminUnit>,
    pub state: Option<AdminUnit>,
    pub country: Option<AdminUnit>,
}

impl AdminLevels {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.district_locality.is_none()
            && self.borough_locality.is_none()
            && self.city_municipality.is_none()
            && self.state.is_none()
            && self.country.is_none()
    }
}

/// A ranked bucket member that made it into the result.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMatch {
    pub location_type: LocationType,
    pub unit: AdminUnit,
    pub feature_code: String,
    pub distance_meters: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminResolution {
    /// Rank-1 of each non-empty bucket, every row of the city district bucket.
    pub buckets: Vec<BucketMatch>,
    pub levels: AdminLevels,
}

impl AdminResolution {
    pub fn bucket(&self, location_type: LocationType) -> impl Iterator<Item = &BucketMatch> {
        self.buckets
            .iter()
            .filter(move |hit| hit.location_type == location_type)
    }

    fn first(&self, location_type: LocationType) -> Option<AdminUnit> {
        self.bucket(location_type).next().map(|hit| hit.unit.clone())
    }
}

struct Ranked<'a> {
    location_type: LocationType,
    priority: usize,
    distance: f64,
    candidate: &'a Candidate,
}

impl Ranked<'_> {
    fn cmp_rank(&self, other: &Self) -> Ordering {
        let by_population = if self.location_type.is_place() {
            other.candidate.population.cmp(&self.candidate.population)
        } else {
            Ordering::Equal
        };
        self.priority
            .cmp(&other.priority)
            .then(by_population)
            .then(self.distance.total_cmp(&other.distance))
            .then(self.candidate.geoname_id.cmp(&other.candidate.geoname_id))
    }

    fn to_match(&self) -> BucketMatch {
        BucketMatch {
            location_type: self.location_type,
            unit: AdminUnit::from(self.candidate),
            feature_code: self.candidate.feature_code.clone(),
            distance_meters: self.distance,
        }
    }
}

/// Resolves the breadcrumb levels for an anchor from its nearby places and
/// the country and state units of its country.
///
/// An anchor in an unknown country, or with nothing around it, resolves to
/// all levels empty.
#[must_use]
pub fn resolve_levels(
    anchor: &Coordinate,
    path: &AdminPath,
    nearby: &[Candidate],
    units: &[Candidate],
) -> AdminResolution {
    let ranked = nearby
        .iter()
        .filter_map(|candidate| {
            let own_path = candidate.admin_path();
            let location_type = LocationType::classify(&candidate.feature_code, &own_path);
            if !location_type.path_matches(path, &own_path) {
                return None;
            }
            let priority = location_type
                .priority()
                .iter()
                .position(|code| *code == candidate.feature_code)?;
            Some(Ranked {
                location_type,
                priority,
                distance: candidate
                    .distance_meters
                    .unwrap_or_else(|| anchor.distance_to(&candidate.coordinate)),
                candidate,
            })
        })
        .into_group_map_by(|ranked| ranked.location_type);

    let mut buckets = Vec::new();
    for location_type in LocationType::EMITTED {
        let Some(mut members) = ranked.get(&location_type).map(|m| m.iter().collect_vec()) else {
            continue;
        };
        members.sort_by(|a, b| a.cmp_rank(b));
        if location_type == LocationType::CityDistrict {
            buckets.extend(members.iter().map(|member| member.to_match()));
        } else if let Some(best) = members.first() {
            buckets.push(best.to_match());
        }
    }

    let mut resolution = AdminResolution {
        buckets,
        levels: AdminLevels::default(),
    };
    let nearest_city_district = resolution
        .bucket(LocationType::CityDistrict)
        .min_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then(a.unit.geoname_id.cmp(&b.unit.geoname_id))
        })
        .map(|hit| hit.unit.clone());

    resolution.levels = AdminLevels {
        district_locality: resolution.first(LocationType::District),
        borough_locality: nearest_city_district
            .or_else(|| resolution.first(LocationType::Adm5))
            .or_else(|| resolution.first(LocationType::Adm4)),
        city_municipality: resolution
            .first(LocationType::City)
            .or_else(|| resolution.first(LocationType::Adm3))
            .or_else(|| resolution.first(LocationType::Adm2)),
        state: path.admin1().and_then(|admin1| {
            units
                .iter()
                .filter(|unit| {
                    unit.feature_code == STATE_CODE && unit.admin_codes[0].as_deref() == Some(admin1)
                })
                .min_by_key(|unit| unit.geoname_id)
                .map(AdminUnit::from)
        }),
        country: units
            .iter()
            .filter_map(|unit| {
                COUNTRY_CODES
                    .iter()
                    .position(|code| *code == unit.feature_code)
                    .map(|priority| (priority, unit))
            })
            .min_by_key(|(priority, unit)| (*priority, unit.geoname_id))
            .map(|(_, unit)| AdminUnit::from(unit)),
    };

    if resolution.levels.is_empty() {
        warn!(?anchor, ?path, "No administrative unit resolved");
    } else {
        debug!(buckets = resolution.buckets.len(), levels = ?resolution.levels, "Admin levels resolved");
    }
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(gid: u32, name: &str, code: &str, population: i64, distance: f64, path: &[&str]) -> Candidate {
        Candidate {
            id: gid,
            geoname_id: gid,
            name: name.to_string(),
            coordinate: Coordinate::new(0.0, 0.0),
            feature_class: if code.starts_with("PPL") { "P" } else { "A" }.to_string(),
            feature_code: code.to_string(),
            population,
            country_code: "DE".to_string(),
            admin_codes: AdminPath::from_codes(path).codes,
            alternate_names: Vec::new(),
            relevance_score: None,
            distance_meters: Some(distance),
            closest_point: None,
        }
    }

    const FULL: [&str; 4] = ["16", "00", "11000", "11000000"];

    #[test]
    fn test_classification_uses_code_and_depth() {
        let full = AdminPath::from_codes(&FULL);
        let partial = AdminPath::from_codes(&["16", "00", "11000"]);
        assert_eq!(LocationType::classify("PPLC", &full), LocationType::City);
        assert_eq!(LocationType::classify("PPL", &partial), LocationType::City);
        assert_eq!(LocationType::classify("PPL", &full), LocationType::CityDistrict);
        assert_eq!(LocationType::classify("PPLX", &full), LocationType::District);
        assert_eq!(LocationType::classify("ADM3", &partial), LocationType::Adm3);
        assert_eq!(LocationType::classify("RSTN", &full), LocationType::Unknown);
        assert_eq!(LocationType::Adm2 as u8, 10);
        assert_eq!(LocationType::CityDistrict as u8, 29);
    }

    #[test]
    fn test_path_matching_depth() {
        let anchor = AdminPath::from_codes(&FULL);
        let other_admin4 = AdminPath::from_codes(&["16", "00", "11000", "99"]);
        assert!(LocationType::City.path_matches(&anchor, &other_admin4));
        assert!(!LocationType::District.path_matches(&anchor, &other_admin4));

        let adm2 = AdminPath::from_codes(&["16", "00"]);
        let adm2_with_admin3 = AdminPath::from_codes(&["16", "00", "11000"]);
        assert!(LocationType::Adm2.path_matches(&anchor, &adm2));
        assert!(!LocationType::Adm2.path_matches(&anchor, &adm2_with_admin3));

        // an anchor without codes constrains nothing
        assert!(LocationType::District.path_matches(&AdminPath::default(), &other_admin4));
    }

    #[test]
    fn test_ranking_priority_population_then_distance() {
        let anchor = Coordinate::new(0.0, 0.0);
        let path = AdminPath::from_codes(&FULL);
        let nearby = [
            place(1, "Town", "PPL", 900_000, 100.0, &FULL[..3]),
            place(2, "Capital", "PPLC", 10, 5_000.0, &FULL),
            place(3, "Big quarter", "PPLX", 50_000, 3_000.0, &FULL),
            place(4, "Small quarter", "PPLX", 20_000, 10.0, &FULL),
            place(5, "Borough", "ADM4", 1, 900.0, &FULL),
            place(6, "Nearer borough", "ADM4", 1, 300.0, &FULL),
        ];
        let resolution = resolve_levels(&anchor, &path, &nearby, &[]);
        let levels = &resolution.levels;
        assert_eq!(levels.city_municipality.as_ref().unwrap().name, "Capital");
        assert_eq!(levels.district_locality.as_ref().unwrap().name, "Big quarter");
        assert_eq!(levels.borough_locality.as_ref().unwrap().name, "Nearer borough");
        assert!(levels.state.is_none() && levels.country.is_none());
    }

    #[test]
    fn test_city_district_bucket_emits_every_row() {
        let anchor = Coordinate::new(0.0, 0.0);
        let path = AdminPath::from_codes(&FULL);
        let nearby = [
            place(1, "Far locality", "PPL", 100_000, 4_000.0, &FULL),
            place(2, "Near locality", "PPL", 5_000, 800.0, &FULL),
            place(3, "Quarter", "PPLX", 1, 10.0, &FULL),
            place(4, "Other quarter", "PPLX", 2, 10.0, &FULL),
        ];
        let resolution = resolve_levels(&anchor, &path, &nearby, &[]);
        assert_eq!(resolution.bucket(LocationType::CityDistrict).count(), 2);
        for location_type in LocationType::EMITTED {
            if location_type != LocationType::CityDistrict {
                assert!(resolution.bucket(location_type).count() <= 1);
            }
        }
        assert_eq!(
            resolution.levels.borough_locality.as_ref().unwrap().name,
            "Near locality"
        );
    }

    #[test]
    fn test_state_and_country_from_units() {
        let path = AdminPath::from_codes(&FULL);
        let units = [
            place(10, "Other state", "ADM1", 0, 0.0, &["11"]),
            place(11, "Land Berlin", "ADM1", 0, 0.0, &["16"]),
            place(12, "Dependency", "PCLD", 0, 0.0, &[]),
            place(13, "Germany", "PCLI", 0, 0.0, &[]),
        ];
        let levels = resolve_levels(&Coordinate::new(0.0, 0.0), &path, &[], &units).levels;
        assert_eq!(levels.state.unwrap().name, "Land Berlin");
        assert_eq!(levels.country.unwrap().name, "Germany");
    }

    #[test]
    fn test_nothing_nearby_resolves_to_empty_levels() {
        let resolution =
            resolve_levels(&Coordinate::new(0.0, 0.0), &AdminPath::default(), &[], &[]);
        assert!(resolution.levels.is_empty());
        assert!(resolution.buckets.is_empty());
    }

    #[test]
    fn test_bucket_feature_codes_are_unique() {
        let codes = bucket_feature_codes();
        assert_eq!(codes.len(), codes.iter().unique().count());
        assert!(codes.contains(&"PPLX") && codes.contains(&"ADM5"));
        assert!(!codes.contains(&"ADM1"));
    }
}
