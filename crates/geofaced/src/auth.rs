//! Identity layer: access tokens and the request-scoped caller identity.
//!
//! Tokens are HS256 JWTs whose subject is the user id. The role is always
//! re-read from the store when a request is authenticated; the claim copy
//! is informational only.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use geoface_core::{Role, User};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AttendanceError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issuer with a random secret. Tokens die with the process.
    pub fn ephemeral(ttl: Duration) -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self::new(&secret, ttl)
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, AttendanceError> {
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AttendanceError::Internal(format!("token signing failed: {e}")))
    }

    /// Validate signature and expiry, returning the subject user id.
    pub fn verify(&self, token: &str) -> Result<Uuid, AttendanceError> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AttendanceError::Auth("invalid or expired token"))?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| AttendanceError::Auth("invalid token subject"))
    }
}

/// The authenticated caller, passed explicitly into every engine operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AttendanceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AttendanceError::Forbidden("admin role required"))
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            role: user.role,
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AttendanceError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AttendanceError::Auth("missing bearer token"))?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AttendanceError::Auth("missing bearer token"))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AttendanceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user_id = state.tokens.verify(token)?;
        let user = state
            .engine
            .store()
            .user_by_id(user_id)
            .await?
            .ok_or(AttendanceError::Auth("unknown user"))?;
        Ok(Identity::from(&user))
    }
}
