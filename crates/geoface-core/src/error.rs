use thiserror::Error;

/// Malformed input rejected before any state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("enrollment needs at least {min} face samples, got {got}")]
    TooFewSamples { got: usize, min: usize },
    #[error("descriptor {index} has length {got}, expected {expected}")]
    DescriptorLength {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("descriptor {index} contains a non-finite value")]
    NonFiniteDescriptor { index: usize },
    #[error("no face templates enrolled; register your face first")]
    NoTemplates,
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("radius must be a positive number of meters, got {0}")]
    Radius(f64),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("unknown role: {0} (expected \"employee\" or \"admin\")")]
    InvalidRole(String),
    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}
