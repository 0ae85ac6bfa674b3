//! Nearest-stop search.
//!
//! Ranks candidate locations by great-circle (Haversine) distance from a
//! reference point and keeps those within a radius. The search is a
//! linear scan over the candidates, which is fine for a city's stop
//! inventory.

use crate::domain::{GeoPoint, Stop};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Radius used when the caller does not give one.
pub const DEFAULT_RADIUS_M: f64 = 1000.0;

/// Anything with a position that can be ranked by distance.
pub trait Located {
    fn location(&self) -> GeoPoint;
}

impl Located for GeoPoint {
    fn location(&self) -> GeoPoint {
        *self
    }
}

impl Located for Stop {
    fn location(&self) -> GeoPoint {
        Stop::location(self)
    }
}

impl<T: Located> Located for &T {
    fn location(&self) -> GeoPoint {
        (*self).location()
    }
}

/// A candidate paired with its distance from the reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearby<T> {
    pub item: T,
    /// Distance rounded to the nearest whole metre.
    pub distance_m: u64,
}

/// Great-circle distance between two points, in metres.
///
/// # Examples
///
/// ```
/// use bustrack_server::domain::GeoPoint;
/// use bustrack_server::proximity::haversine_distance;
///
/// let origin = GeoPoint::new(0.0, 0.0);
/// let east = GeoPoint::new(0.0, 0.00899322);
/// assert!((haversine_distance(origin, east) - 1000.0).abs() < 1.0);
/// ```
pub fn haversine_distance(from: GeoPoint, to: GeoPoint) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let half_lat = (d_lat / 2.0).sin();
    let half_lon = (d_lon / 2.0).sin();
    let a = half_lat * half_lat
        + from.latitude.to_radians().cos() * to.latitude.to_radians().cos() * half_lon * half_lon;
    // Rounding can push `a` just past 1 for near-antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Rank `candidates` by distance from `reference`, keeping those within
/// `radius_m` metres (`None` means [`DEFAULT_RADIUS_M`]).
///
/// The boundary is inclusive and compares the rounded distance. Results
/// are nearest first; equal distances keep their input order.
pub fn nearby<T, I>(reference: GeoPoint, candidates: I, radius_m: Option<f64>) -> Vec<Nearby<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    let radius_m = radius_m.unwrap_or(DEFAULT_RADIUS_M);

    let mut matches: Vec<Nearby<T>> = candidates
        .into_iter()
        .map(|item| {
            let distance = haversine_distance(reference, item.location());
            Nearby {
                distance_m: distance.round() as u64,
                item,
            }
        })
        .filter(|m| m.distance_m as f64 <= radius_m)
        .collect();

    // sort_by_key is stable
    matches.sort_by_key(|m| m.distance_m);
    matches
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn point() -> impl Strategy<Value = GeoPoint> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
    }

    proptest! {
        /// Distance does not depend on direction
        #[test]
        fn distance_is_symmetric(a in point(), b in point()) {
            let ab = haversine_distance(a, b);
            let ba = haversine_distance(b, a);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        /// Distance never exceeds half the circumference
        #[test]
        fn distance_is_bounded(a in point(), b in point()) {
            let d = haversine_distance(a, b);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_M + 1e-6);
        }

        /// Every result is within the radius and results are sorted
        #[test]
        fn results_sorted_and_within_radius(
            reference in point(),
            candidates in prop::collection::vec(point(), 0..30),
            radius in 0.0f64..5_000_000.0,
        ) {
            let result = nearby(reference, candidates, Some(radius));
            for m in &result {
                prop_assert!(m.distance_m as f64 <= radius);
            }
            for pair in result.windows(2) {
                prop_assert!(pair[0].distance_m <= pair[1].distance_m);
            }
        }
    }
}
