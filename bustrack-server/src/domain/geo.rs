//! Geographic coordinates.

use serde::{Deserialize, Serialize};

/// A location in degrees of latitude and longitude.
///
/// No range validation is performed; callers are expected to supply
/// latitudes in [-90, 90] and longitudes in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}
