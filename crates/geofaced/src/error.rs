use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use geoface_core::{AttendanceStatus, ValidationError};
use geoface_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Every way a request can fail. Each variant maps to one error kind on the
/// wire, with the measurement the caller needs to explain it.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("authentication failed: {0}")]
    Auth(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("face does not match enrolled templates (distance {distance:.3}, threshold {threshold})")]
    Match {
        distance: f64,
        score: f64,
        threshold: f64,
    },

    #[error("outside office geofence: {distance_m:.0} m from office, radius {radius_m:.0} m")]
    Geofence { distance_m: f64, radius_m: f64 },

    #[error("cannot {attempted}: today's status is {current}")]
    State {
        current: AttendanceStatus,
        attempted: &'static str,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AttendanceError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::Validation(_) | AttendanceError::BadRequest(_) => "validation_error",
            AttendanceError::Auth(_) | AttendanceError::Forbidden(_) => "auth_error",
            AttendanceError::Match { .. } => "match_error",
            AttendanceError::Geofence { .. } => "geofence_error",
            AttendanceError::State { .. } => "state_error",
            AttendanceError::NotFound(_) => "not_found",
            AttendanceError::Timeout(_) => "timeout",
            AttendanceError::Store(_) | AttendanceError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AttendanceError::Validation(_) | AttendanceError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AttendanceError::Auth(_) => StatusCode::UNAUTHORIZED,
            AttendanceError::Forbidden(_) => StatusCode::FORBIDDEN,
            AttendanceError::Match { .. } | AttendanceError::Geofence { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AttendanceError::State { .. } => StatusCode::CONFLICT,
            AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AttendanceError::Store(_) | AttendanceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AttendanceError {
    fn from(rejection: JsonRejection) -> Self {
        AttendanceError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AttendanceError {
    fn from(rejection: QueryRejection) -> Self {
        AttendanceError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });

        match &self {
            AttendanceError::Match {
                distance,
                score,
                threshold,
            } => {
                body["distance"] = json!(distance);
                body["score"] = json!(score);
                body["threshold"] = json!(threshold);
            }
            AttendanceError::Geofence {
                distance_m,
                radius_m,
            } => {
                body["distance_m"] = json!(distance_m);
                body["radius_m"] = json!(radius_m);
            }
            AttendanceError::State { current, .. } => {
                body["status"] = json!(current);
            }
            AttendanceError::Store(_) | AttendanceError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                body["message"] = json!("internal server error");
            }
            _ => {}
        }

        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_statuses() {
        let cases: Vec<(AttendanceError, &str, StatusCode)> = vec![
            (
                ValidationError::NoTemplates.into(),
                "validation_error",
                StatusCode::BAD_REQUEST,
            ),
            (AttendanceError::Auth("x"), "auth_error", StatusCode::UNAUTHORIZED),
            (AttendanceError::Forbidden("x"), "auth_error", StatusCode::FORBIDDEN),
            (
                AttendanceError::Match {
                    distance: 0.9,
                    score: 0.0,
                    threshold: 0.6,
                },
                "match_error",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AttendanceError::Geofence {
                    distance_m: 200.0,
                    radius_m: 100.0,
                },
                "geofence_error",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AttendanceError::State {
                    current: AttendanceStatus::CheckedIn,
                    attempted: "check in",
                },
                "state_error",
                StatusCode::CONFLICT,
            ),
            (AttendanceError::NotFound("office location"), "not_found", StatusCode::NOT_FOUND),
            (
                AttendanceError::Timeout(Duration::from_millis(5)),
                "timeout",
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_geofence_message_carries_distance() {
        let err = AttendanceError::Geofence {
            distance_m: 201.4,
            radius_m: 100.0,
        };
        assert_eq!(
            err.to_string(),
            "outside office geofence: 201 m from office, radius 100 m"
        );
    }
}
