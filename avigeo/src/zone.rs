use std::fmt;

use crate::course::CourseMask;
use crate::error::{Error, Result};

/// Mean Earth radius used for great-circle distances, in meters.
const EARTH_RADIUS_M: f64 = 6_372_795.0;

/// A geographic zone with an optional course restriction.
///
/// Containment is strict on both variants: a point exactly on a rectangle
/// edge or exactly at circle-radius distance is not contained, so adjacent
/// zones sharing a border never double-match.
#[derive(Debug, Clone, PartialEq)]
pub enum Zone {
    Circle {
        lat: f64,
        lon: f64,
        mask: CourseMask,
        radius_m: f64,
    },
    Rectangle {
        lat_start: f64,
        lon_start: f64,
        mask: CourseMask,
        lat_end: f64,
        lon_end: f64,
    },
}

impl Zone {
    pub fn circle(lat: f64, lon: f64, mask: CourseMask, radius_m: f64) -> Result<Self> {
        check_coordinate(lat, lon)?;
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(Error::InvalidZone(format!("non-positive radius {radius_m}")));
        }
        Ok(Self::Circle {
            lat,
            lon,
            mask,
            radius_m,
        })
    }

    /// Rectangle from its south-west (`start`) and north-east (`end`)
    /// corners; a degenerate or inverted box is a data error.
    pub fn rectangle(
        lat_start: f64,
        lon_start: f64,
        mask: CourseMask,
        lat_end: f64,
        lon_end: f64,
    ) -> Result<Self> {
        check_coordinate(lat_start, lon_start)?;
        check_coordinate(lat_end, lon_end)?;
        if lat_start >= lat_end || lon_start >= lon_end {
            return Err(Error::InvalidZone(format!(
                "inverted rectangle S({lat_start}, {lon_start}) E({lat_end}, {lon_end})"
            )));
        }
        Ok(Self::Rectangle {
            lat_start,
            lon_start,
            mask,
            lat_end,
            lon_end,
        })
    }

    pub fn course_mask(&self) -> CourseMask {
        match *self {
            Self::Circle { mask, .. } | Self::Rectangle { mask, .. } => mask,
        }
    }

    /// Test whether a point lies inside the zone.
    ///
    /// A negative `course` skips course filtering regardless of the zone
    /// mask; a zone with an empty mask never filters on course.
    pub fn contains(&self, lat: f64, lon: f64, course: f64) -> bool {
        match *self {
            Self::Circle {
                lat: c_lat,
                lon: c_lon,
                mask,
                radius_m,
            } => {
                if !course_accepted(mask, course) {
                    return false;
                }
                let distance = great_circle_distance_m(
                    lat.to_radians(),
                    lon.to_radians(),
                    c_lat.to_radians(),
                    c_lon.to_radians(),
                );
                distance < radius_m
            }
            Self::Rectangle {
                lat_start,
                lon_start,
                mask,
                lat_end,
                lon_end,
            } => {
                let inside =
                    lat > lat_start && lat < lat_end && lon > lon_start && lon < lon_end;
                inside && course_accepted(mask, course)
            }
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Circle {
                lat,
                lon,
                mask,
                radius_m,
            } => {
                write!(f, "C({lat:.6}, {lon:.6}), R: {radius_m:.1} m, M: {mask}")
            }
            Self::Rectangle {
                lat_start,
                lon_start,
                mask,
                lat_end,
                lon_end,
            } => write!(
                f,
                "S({lat_start:.6}, {lon_start:.6}), E({lat_end:.6}, {lon_end:.6}), M: {mask}"
            ),
        }
    }
}

fn check_coordinate(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidZone(format!("coordinate ({lat}, {lon})")));
    }
    Ok(())
}

fn course_accepted(mask: CourseMask, course: f64) -> bool {
    if course < 0.0 || mask.is_empty() {
        return true;
    }
    mask.intersects(CourseMask::from_degrees(course))
}

/// Great-circle distance via the haversine-family formula that stays
/// accurate for both antipodal points and short distances. Inputs in
/// radians, result in meters.
fn great_circle_distance_m(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let (slat_a, clat_a) = lat_a.sin_cos();
    let (slat_b, clat_b) = lat_b.sin_cos();
    let (sdlon, cdlon) = (lon_b - lon_a).sin_cos();

    let top = ((clat_b * sdlon).powi(2) + (clat_a * slat_b - slat_a * clat_b * cdlon).powi(2))
        .sqrt();
    let bottom = slat_a * slat_b + clat_a * clat_b * cdlon;

    top.atan2(bottom) * EARTH_RADIUS_M
}

#[cfg(test)]
mod tests {
    use super::*;

    // Red Square, roughly.
    const LAT: f64 = 55.753930;
    const LON: f64 = 37.620795;

    fn distance(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
        great_circle_distance_m(
            lat_a.to_radians(),
            lon_a.to_radians(),
            lat_b.to_radians(),
            lon_b.to_radians(),
        )
    }

    #[test]
    fn circle_containment_is_strict() {
        let point_lat = LAT + 0.001;
        let exact = distance(point_lat, LON, LAT, LON);

        let zone = Zone::circle(LAT, LON, CourseMask::IGNORE, exact).unwrap();
        assert!(!zone.contains(point_lat, LON, -1.0));

        let zone = Zone::circle(LAT, LON, CourseMask::IGNORE, exact + 0.5).unwrap();
        assert!(zone.contains(point_lat, LON, -1.0));
    }

    #[test]
    fn rectangle_edges_are_excluded() {
        let zone = Zone::rectangle(55.0, 37.0, CourseMask::IGNORE, 56.0, 38.0).unwrap();

        assert!(zone.contains(55.5, 37.5, -1.0));
        assert!(!zone.contains(55.0, 37.5, -1.0));
        assert!(!zone.contains(56.0, 37.5, -1.0));
        assert!(!zone.contains(55.5, 37.0, -1.0));
        assert!(!zone.contains(55.5, 38.0, -1.0));
        assert!(!zone.contains(54.9, 37.5, -1.0));
    }

    #[test]
    fn course_filter_applies_only_with_a_mask_and_known_course() {
        let northbound = CourseMask::from_degrees(0.0);
        let zone = Zone::rectangle(55.0, 37.0, northbound, 56.0, 38.0).unwrap();

        assert!(zone.contains(55.5, 37.5, 10.0));
        assert!(!zone.contains(55.5, 37.5, 180.0));
        // Unknown course bypasses the filter.
        assert!(zone.contains(55.5, 37.5, -1.0));

        let unfiltered = Zone::rectangle(55.0, 37.0, CourseMask::IGNORE, 56.0, 38.0).unwrap();
        assert!(unfiltered.contains(55.5, 37.5, 180.0));
    }

    #[test]
    fn circle_course_filter() {
        let eastbound = CourseMask::from_degrees(90.0);
        let zone = Zone::circle(LAT, LON, eastbound, 500.0).unwrap();

        assert!(zone.contains(LAT, LON + 0.001, 100.0));
        assert!(!zone.contains(LAT, LON + 0.001, 271.0));
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        assert!(Zone::circle(LAT, LON, CourseMask::IGNORE, 0.0).is_err());
        assert!(Zone::circle(LAT, LON, CourseMask::IGNORE, -10.0).is_err());
        assert!(Zone::circle(91.0, LON, CourseMask::IGNORE, 100.0).is_err());
        assert!(Zone::rectangle(56.0, 37.0, CourseMask::IGNORE, 55.0, 38.0).is_err());
        assert!(Zone::rectangle(55.0, 37.0, CourseMask::IGNORE, 55.0, 38.0).is_err());
    }

    #[test]
    fn distance_matches_known_reference() {
        // Moscow -> Saint Petersburg is about 634 km.
        let d = distance(55.7558, 37.6173, 59.9343, 30.3351);
        assert!((d - 634_000.0).abs() < 5_000.0, "got {d}");
    }
}
