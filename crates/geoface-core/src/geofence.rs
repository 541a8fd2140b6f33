//! Great-circle geofencing.
//!
//! Distances use the haversine formula on a spherical earth of mean radius
//! [`EARTH_RADIUS_M`]. The error against the WGS-84 ellipsoid is well under
//! one percent, far below typical phone GPS accuracy.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS-84 coordinate in decimal degrees.
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

    /// Reject NaN/infinite values and coordinates outside the valid ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::Latitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::Longitude(self.longitude));
        }
        Ok(())
    }
}

/// Outcome of a geofence test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceCheck {
    pub ok: bool,
    pub distance_m: f64,
}

/// Haversine great-circle distance in meters. Symmetric in its arguments.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Is `point` within `radius_m` meters of `center`?
///
/// Inclusive on the boundary. A radius of 0 only admits a computed distance
/// of exactly zero.
pub fn within_radius(point: GeoPoint, center: GeoPoint, radius_m: f64) -> GeofenceCheck {
    let distance_m = haversine_distance(point, center);
    GeofenceCheck {
        ok: distance_m <= radius_m,
        distance_m,
    }
}
