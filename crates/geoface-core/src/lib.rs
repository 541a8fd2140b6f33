//! geoface-core: Face descriptor matching and geofencing for attendance.
//!
//! Pure computation only: the matcher compares sensor-produced descriptors
//! by Euclidean distance, the geofence uses the haversine distance, and the
//! remaining modules hold the domain types the store and daemon share.

pub mod attendance;
pub mod credentials;
pub mod enrollment;
pub mod error;
pub mod geofence;
pub mod office;
pub mod types;
pub mod user;

pub use attendance::{AttendanceRecord, AttendanceStatus, RecordFilter, TodayStatus};
pub use enrollment::EnrollmentPolicy;
pub use error::ValidationError;
pub use geofence::{GeoPoint, GeofenceCheck};
pub use office::OfficeLocation;
pub use types::{Descriptor, EuclideanMatcher, FaceTemplate, MatchResult, Matcher};
pub use user::{Role, User};
