use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::geofence::{self, GeoPoint, GeofenceCheck};

/// The single active office geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Geofence radius in meters.
    pub radius: f64,
    /// Admin who last wrote the record. `None` when set from the CLI.
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl OfficeLocation {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Check that the record is acceptable for the registry: non-empty name,
    /// valid coordinates, strictly positive radius.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        self.center().validate()?;
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ValidationError::Radius(self.radius));
        }
        Ok(())
    }

    pub fn contains(&self, point: GeoPoint) -> GeofenceCheck {
        geofence::within_radius(point, self.center(), self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office(radius: f64) -> OfficeLocation {
        OfficeLocation {
            name: "HQ".into(),
            latitude: -6.2,
            longitude: 106.816666,
            radius,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_accepts_sane_office() {
        assert!(office(100.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_radius() {
        assert_eq!(office(0.0).validate(), Err(ValidationError::Radius(0.0)));
        assert_eq!(office(-5.0).validate(), Err(ValidationError::Radius(-5.0)));
    }

    #[test]
    fn test_validate_rejects_bad_coordinates() {
        let mut o = office(100.0);
        o.latitude = -91.0;
        assert_eq!(o.validate(), Err(ValidationError::Latitude(-91.0)));
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut o = office(100.0);
        o.name = "   ".into();
        assert_eq!(o.validate(), Err(ValidationError::EmptyField("name")));
    }

    #[test]
    fn test_contains_center() {
        let o = office(100.0);
        assert!(o.contains(o.center()).ok);
    }
}
