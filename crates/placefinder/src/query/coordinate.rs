//! Coordinate components in decimal or degree/minute/second notation.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{QueryError, Result};

/// Signed decimal degrees with an optional trailing degree sign.
pub(super) const DECIMAL: &str = r"[-+]?[0-9]+(?:\.[0-9]+)?°?";
/// `DD°MM′SS.sss″N`, minutes and seconds also accepted with ASCII quotes.
pub(super) const DMS_LATITUDE: &str = r#"[0-9]+°[0-9]+[′'][0-9]+(?:\.[0-9]+)?[″"][NS]"#;
pub(super) const DMS_LONGITUDE: &str = r#"[0-9]+°[0-9]+[′'][0-9]+(?:\.[0-9]+)?[″"][EW]"#;

static DMS_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([0-9]+)°([0-9]+)[′']([0-9]+(?:\.[0-9]+)?)[″"]([NSEW])$"#)
        .expect("DMS pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "N" => Some(Self::North),
            "S" => Some(Self::South),
            "E" => Some(Self::East),
            "W" => Some(Self::West),
            _ => None,
        }
    }

    const fn axis(self) -> Axis {
        match self {
            Self::North | Self::South => Axis::Latitude,
            Self::East | Self::West => Axis::Longitude,
        }
    }

    const fn sign(self) -> f64 {
        match self {
            Self::North | Self::East => 1.0,
            Self::South | Self::West => -1.0,
        }
    }

    const fn letter(self) -> char {
        match self {
            Self::North => 'N',
            Self::South => 'S',
            Self::East => 'E',
            Self::West => 'W',
        }
    }
}

/// A coordinate component in degrees, minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: f64,
    pub hemisphere: Hemisphere,
}

impl Dms {
    #[must_use]
    pub fn to_decimal(&self) -> f64 {
        self.hemisphere.sign()
            * (f64::from(self.degrees) + f64::from(self.minutes) / 60.0 + self.seconds / 3600.0)
    }

    /// Splits decimal degrees into DMS with seconds rounded to milliarcseconds.
    #[must_use]
    pub fn from_decimal(value: f64, axis: Axis) -> Self {
        let hemisphere = match (axis, value < 0.0) {
            (Axis::Latitude, false) => Hemisphere::North,
            (Axis::Latitude, true) => Hemisphere::South,
            (Axis::Longitude, false) => Hemisphere::East,
            (Axis::Longitude, true) => Hemisphere::West,
        };
        let abs = value.abs();
        let mut degrees = abs.floor() as u32;
        let minutes_f = (abs - f64::from(degrees)) * 60.0;
        let mut minutes = minutes_f.floor() as u32;
        let mut seconds = ((minutes_f - f64::from(minutes)) * 60.0 * 1000.0).round() / 1000.0;
        if seconds >= 60.0 {
            seconds -= 60.0;
            minutes += 1;
        }
        if minutes >= 60 {
            minutes -= 60;
            degrees += 1;
        }
        Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        }
    }

    fn parse(token: &str) -> Result<Self> {
        let invalid = || QueryError::InvalidCoordinate(token.to_string());
        let caps = DMS_PARTS.captures(token).ok_or_else(invalid)?;
        let degrees = caps[1].parse().map_err(|_| invalid())?;
        let minutes: u32 = caps[2].parse().map_err(|_| invalid())?;
        let seconds: f64 = caps[3].parse().map_err(|_| invalid())?;
        let hemisphere = Hemisphere::from_letter(&caps[4]).ok_or_else(invalid)?;
        if minutes >= 60 || seconds >= 60.0 {
            return Err(invalid());
        }
        Ok(Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        })
    }
}

impl fmt::Display for Dms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}°{}′{:.3}″{}",
            self.degrees,
            self.minutes,
            self.seconds,
            self.hemisphere.letter()
        )
    }
}

/// Converts one matched coordinate component into decimal degrees.
///
/// Values are not range checked; a latitude of 123 is returned as is.
pub(super) fn parse_component(token: &str, axis: Axis) -> Result<f64> {
    if token.contains(['′', '\'']) {
        let dms = Dms::parse(token)?;
        if dms.hemisphere.axis() != axis {
            return Err(QueryError::InvalidCoordinate(token.to_string()));
        }
        return Ok(dms.to_decimal());
    }
    token
        .trim_end_matches('°')
        .parse()
        .map_err(|_| QueryError::InvalidCoordinate(token.to_string()))
}
