//! Geographic primitives: points, great-circle distance and the nearest point on
//! a river centerline.

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A WGS84 position in decimal degrees.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
    }

    /// Well-known-text form, longitude first.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }

    /// Parses `POINT(lon lat)`.
    #[must_use]
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        let inner = wkt
            .trim()
            .strip_prefix("POINT")?
            .trim_start()
            .strip_prefix('(')?
            .strip_suffix(')')?;
        let mut parts = inner.split_whitespace();
        let longitude = parts.next()?.parse().ok()?;
        let latitude = parts.next()?.parse().ok()?;
        match parts.next() {
            Some(_) => None,
            None => Some(Self::new(latitude, longitude)),
        }
    }
}

/// The point of a line nearest to some origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: Coordinate,
    pub distance_meters: f64,
}

/// Finds the point of the polyline `line` nearest to `origin`.
///
/// Each segment is projected in an equirectangular plane centred on the origin,
/// which is accurate at the scale of a river reach. Returns `None` for an empty
/// line.
#[must_use]
pub fn closest_point_on_line(origin: &Coordinate, line: &[Coordinate]) -> Option<ClosestPoint> {
    let nearest = |point: Coordinate| ClosestPoint {
        point,
        distance_meters: origin.distance_to(&point),
    };
    match line {
        [] => None,
        [only] => Some(nearest(*only)),
        _ => line
            .windows(2)
            .map(|segment| nearest(project_onto_segment(origin, &segment[0], &segment[1])))
            .min_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters)),
    }
}

fn project_onto_segment(origin: &Coordinate, a: &Coordinate, b: &Coordinate) -> Coordinate {
    let scale = origin.latitude.to_radians().cos().max(1e-12);
    let to_plane = |c: &Coordinate| {
        (
            (c.longitude - origin.longitude) * scale,
            c.latitude - origin.latitude,
        )
    };
    let (ax, ay) = to_plane(a);
    let (bx, by) = to_plane(b);
    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / length_sq).clamp(0.0, 1.0)
    };
    Coordinate::new(
        origin.latitude + ay + t * dy,
        origin.longitude + (ax + t * dx) / scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

    #[test]
    fn test_distance_along_meridian() {
        let a = Coordinate::new(52.0, 13.0);
        let b = Coordinate::new(52.0 + 2000.0 / METERS_PER_DEGREE, 13.0);
        assert!((a.distance_to(&b) - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_berlin_potsdam() {
        let berlin = Coordinate::new(52.524_37, 13.410_53);
        let potsdam = Coordinate::new(52.398_86, 13.065_66);
        let d = berlin.distance_to(&potsdam);
        assert!((26_000.0..28_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_closest_point_projects_inside_segment() {
        let line = [Coordinate::new(52.0, 13.0), Coordinate::new(52.0, 13.2)];
        let origin = Coordinate::new(52.01, 13.1);
        let closest = closest_point_on_line(&origin, &line).unwrap();
        assert!((closest.point.latitude - 52.0).abs() < 1e-9);
        assert!((closest.point.longitude - 13.1).abs() < 1e-9);
        assert!((closest.distance_meters - 0.01 * METERS_PER_DEGREE).abs() < 1.0);
    }

    #[test]
    fn test_closest_point_clamps_to_endpoint() {
        let line = [Coordinate::new(52.0, 13.0), Coordinate::new(52.0, 13.2)];
        let origin = Coordinate::new(52.0, 13.5);
        let closest = closest_point_on_line(&origin, &line).unwrap();
        assert!((closest.point.latitude - 52.0).abs() < 1e-9);
        assert!((closest.point.longitude - 13.2).abs() < 1e-9);
    }

    #[test]
    fn test_closest_point_degenerate_lines() {
        let origin = Coordinate::new(1.0, 1.0);
        assert!(closest_point_on_line(&origin, &[]).is_none());
        let single = [Coordinate::new(1.0, 2.0)];
        assert_eq!(
            closest_point_on_line(&origin, &single).unwrap().point,
            single[0]
        );
    }

    #[test]
    fn test_wkt_round_trip_and_rejects_garbage() {
        let c = Coordinate::new(52.52, 13.37);
        assert_eq!(c.to_wkt(), "POINT(13.37 52.52)");
        assert_eq!(Coordinate::from_wkt(&c.to_wkt()), Some(c));
        assert_eq!(Coordinate::from_wkt("POINT (1 2)"), Some(Coordinate::new(2.0, 1.0)));
        assert_eq!(Coordinate::from_wkt("LINESTRING(1 2, 3 4)"), None);
        assert_eq!(Coordinate::from_wkt("POINT(1 2 3)"), None);
        assert_eq!(Coordinate::from_wkt("POINT(a b)"), None);
    }
}
