//! A small gazetteer slice for tests: Berlin and Potsdam with the Spree and Havel
//! centerlines, and Gran Canaria.

use polars::prelude::*;

use super::{GazetteerFrames, Result};

/// One places-frame row.
#[derive(Debug, Clone, Copy)]
pub struct FixturePlace {
    pub geoname_id: u32,
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub feature_class: &'static str,
    pub feature_code: &'static str,
    pub population: i64,
    pub country_code: &'static str,
    pub admin_codes: [Option<&'static str>; 4],
    pub alternate_names: Option<&'static str>,
    pub relevance: Option<i64>,
}

impl FixturePlace {
    /// A populated place with an index entry and no admin path.
    pub const fn point(geoname_id: u32, name: &'static str, latitude: f64, longitude: f64) -> Self {
        Self {
            geoname_id,
            name,
            latitude,
            longitude,
            feature_class: "P",
            feature_code: "PPL",
            population: 0,
            country_code: "DE",
            admin_codes: [None; 4],
            alternate_names: None,
            relevance: Some(1000),
        }
    }
}

const fn place(
    geoname_id: u32,
    name: &'static str,
    (latitude, longitude): (f64, f64),
    (feature_class, feature_code): (&'static str, &'static str),
    population: i64,
    country_code: &'static str,
    admin_codes: [Option<&'static str>; 4],
    alternate_names: Option<&'static str>,
    relevance: i64,
) -> FixturePlace {
    FixturePlace {
        geoname_id,
        name,
        latitude,
        longitude,
        feature_class,
        feature_code,
        population,
        country_code,
        admin_codes,
        alternate_names,
        relevance: Some(relevance),
    }
}

const BERLIN_PATH: [Option<&str>; 4] = [Some("16"), Some("00"), Some("11000"), Some("11000000")];
const POTSDAM_PATH: [Option<&str>; 4] = [Some("11"), Some("00"), Some("12054"), Some("12054000")];

pub const PLACES: &[FixturePlace] = &[
    place(2921044, "Germany", (51.5, 10.5), ("A", "PCLI"), 82_927_922, "DE", [None; 4], Some("Deutschland,Allemagne,Alemania"), 900),
    place(2950157, "Land Berlin", (52.5, 13.416_67), ("A", "ADM1"), 3_426_354, "DE", [Some("16"), None, None, None], Some("Berlin"), 600),
    place(2945356, "Brandenburg", (52.0, 13.5), ("A", "ADM1"), 2_521_893, "DE", [Some("11"), None, None, None], Some("Land Brandenburg"), 600),
    place(6547383, "Berlin, Stadt", (52.524_37, 13.410_53), ("A", "ADM3"), 3_426_354, "DE", [Some("16"), Some("00"), Some("11000"), None], None, 500),
    place(6547539, "Berlin", (52.524_37, 13.410_53), ("A", "ADM4"), 3_426_354, "DE", BERLIN_PATH, None, 500),
    place(2950159, "Berlin", (52.524_37, 13.410_53), ("P", "PPLC"), 3_426_354, "DE", BERLIN_PATH, Some("Berlino,Berlín,Berlyn"), 1000),
    place(2922530, "Charlottenburg", (52.516_67, 13.283_33), ("P", "PPLX"), 118_704, "DE", BERLIN_PATH, None, 700),
    place(2870912, "Mitte", (52.52, 13.405), ("P", "PPLX"), 98_000, "DE", BERLIN_PATH, Some("Berlin-Mitte"), 700),
    place(2822923, "Spandau", (52.551_1, 13.199_21), ("P", "PPL"), 223_962, "DE", BERLIN_PATH, None, 650),
    place(6944049, "Berlin Hauptbahnhof", (52.525, 13.369_5), ("S", "RSTN"), 0, "DE", BERLIN_PATH, Some("Berlin Central Station,Hbf"), 800),
    place(2831464, "Spree", (52.534_7, 13.312_4), ("H", "STM"), 0, "DE", [Some("16"), None, None, None], None, 700),
    place(2852458, "Potsdam", (52.398_86, 13.065_66), ("P", "PPLA"), 182_112, "DE", POTSDAM_PATH, None, 900),
    place(6547376, "Potsdam, Stadt", (52.4, 13.066_67), ("A", "ADM3"), 182_112, "DE", [Some("11"), Some("00"), Some("12054"), None], None, 450),
    place(2940358, "Schloss Cecilienhof", (52.419_44, 13.070_83), ("S", "CSTL"), 0, "DE", POTSDAM_PATH, Some("Cecilienhof"), 700),
    place(2953107, "Babelsberg", (52.4, 13.1), ("P", "PPLX"), 96_000, "DE", POTSDAM_PATH, None, 600),
    place(2906886, "Havel", (52.8, 12.1), ("H", "STM"), 0, "DE", [Some("11"), None, None, None], None, 700),
    place(9144196, "Flughafen Berlin Brandenburg", (52.366_67, 13.503_33), ("S", "AIRP"), 0, "DE", [Some("11"), Some("00"), Some("12061"), Some("12061260")], Some("BER,Berlin Brandenburg Airport"), 800),
    place(2510769, "Spain", (40.0, -4.0), ("A", "PCLI"), 46_723_749, "ES", [None; 4], Some("España,Spanien"), 900),
    place(2593113, "Canary Islands", (28.0, -15.5), ("A", "ADM1"), 2_172_944, "ES", [Some("53"), None, None, None], Some("Canarias,Islas Canarias"), 600),
    place(2515271, "Provincia de Las Palmas", (28.0, -15.5), ("A", "ADM2"), 1_128_539, "ES", [Some("53"), Some("GC"), None, None], Some("Las Palmas"), 500),
    place(2515270, "Las Palmas de Gran Canaria", (28.099_73, -15.413_43), ("P", "PPLA"), 378_517, "ES", [Some("53"), Some("GC"), Some("35016"), None], Some("Las Palmas"), 900),
    place(6297212, "Gran Canaria Airport", (27.931_89, -15.386_59), ("S", "AIRP"), 0, "ES", [Some("53"), Some("GC"), Some("35026"), None], Some("LPA,Aeropuerto de Gran Canaria"), 800),
    place(6941796, "Puerto de la Luz", (28.141_5, -15.422_8), ("S", "PRT"), 0, "ES", [Some("53"), Some("GC"), Some("35016"), None], None, 600),
];

/// Centerline points per river, in flow order.
pub const RIVERS: &[(u32, &[(f64, f64)])] = &[
    (
        2831464,
        &[
            (52.453_1, 13.624_6),
            (52.49, 13.48),
            (52.513, 13.41),
            (52.52, 13.37),
            (52.517, 13.3),
            (52.536, 13.205),
        ],
    ),
    (
        2906886,
        &[
            (52.57, 13.2),
            (52.5, 13.18),
            (52.43, 13.17),
            (52.4, 13.07),
            (52.39, 12.95),
        ],
    ),
];

/// Builds a places frame from fixture rows, ids assigned in row order.
pub fn places_frame(places: &[FixturePlace]) -> Result<DataFrame> {
    let admin = |level: usize| -> Vec<Option<&str>> {
        places.iter().map(|p| p.admin_codes[level]).collect()
    };
    Ok(df!(
        "id" => (1..=places.len() as u32).collect::<Vec<_>>(),
        "geoname_id" => places.iter().map(|p| p.geoname_id).collect::<Vec<_>>(),
        "name" => places.iter().map(|p| p.name).collect::<Vec<_>>(),
        "latitude" => places.iter().map(|p| p.latitude).collect::<Vec<_>>(),
        "longitude" => places.iter().map(|p| p.longitude).collect::<Vec<_>>(),
        "feature_class" => places.iter().map(|p| p.feature_class).collect::<Vec<_>>(),
        "feature_code" => places.iter().map(|p| p.feature_code).collect::<Vec<_>>(),
        "population" => places.iter().map(|p| p.population).collect::<Vec<_>>(),
        "country_code" => places.iter().map(|p| p.country_code).collect::<Vec<_>>(),
        "admin1_code" => admin(0),
        "admin2_code" => admin(1),
        "admin3_code" => admin(2),
        "admin4_code" => admin(3),
        "alternate_names" => places.iter().map(|p| p.alternate_names).collect::<Vec<_>>(),
        "relevance" => places.iter().map(|p| p.relevance).collect::<Vec<_>>(),
    )?)
}

pub fn rivers_frame(rivers: &[(u32, &[(f64, f64)])]) -> Result<DataFrame> {
    let points = rivers
        .iter()
        .flat_map(|(gid, line)| {
            line.iter()
                .enumerate()
                .map(move |(seq, &(lat, lon))| (*gid, seq as u32, lat, lon))
        })
        .collect::<Vec<_>>();
    Ok(df!(
        "geoname_id" => points.iter().map(|p| p.0).collect::<Vec<_>>(),
        "seq" => points.iter().map(|p| p.1).collect::<Vec<_>>(),
        "latitude" => points.iter().map(|p| p.2).collect::<Vec<_>>(),
        "longitude" => points.iter().map(|p| p.3).collect::<Vec<_>>(),
    )?)
}

/// The full fixture gazetteer.
pub fn gazetteer() -> Result<GazetteerFrames> {
    GazetteerFrames::from_frames(places_frame(PLACES)?, rivers_frame(RIVERS)?)
}

/// A gazetteer built from custom rows and no rivers.
pub fn gazetteer_of(places: &[FixturePlace]) -> Result<GazetteerFrames> {
    GazetteerFrames::from_frames(places_frame(places)?, rivers_frame(&[])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_conforms_to_schema() {
        let frames = gazetteer().unwrap();
        assert_eq!(frames.places.height(), PLACES.len());
        assert_eq!(frames.places.width(), crate::schema::PLACES_SCHEMA.len());
        assert_eq!(
            frames.rivers.height(),
            RIVERS.iter().map(|(_, line)| line.len()).sum::<usize>()
        );
    }

    #[test]
    fn test_fixture_geoname_ids_are_unique() {
        let mut ids = PLACES.iter().map(|p| p.geoname_id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PLACES.len());
    }
}
