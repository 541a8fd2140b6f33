//! Daemon configuration.
//!
//! Values come from an optional TOML file named by `GEOFACE_CONFIG`, then
//! `GEOFACE_*` environment variables override individual keys. Everything
//! has a default so the daemon starts with zero configuration.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use geoface_core::enrollment::{DEFAULT_DESCRIPTOR_LEN, MIN_ENROLL_SAMPLES};
use geoface_core::EnrollmentPolicy;
use serde::Deserialize;

/// What a check-in does when no office location has been configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsetOfficePolicy {
    /// Skip the geofence (logged as a warning).
    #[default]
    Allow,
    /// Refuse the check-in with a not-found error.
    Reject,
}

impl std::str::FromStr for UnsetOfficePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(UnsetOfficePolicy::Allow),
            "reject" => Ok(UnsetOfficePolicy::Reject),
            other => Err(format!("expected \"allow\" or \"reject\", got {other:?}")),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address (default: 0.0.0.0:8001).
    pub http_addr: SocketAddr,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// HS256 signing secret for access tokens. Random per process when unset.
    pub jwt_secret: Option<String>,
    /// Access token lifetime in minutes.
    pub token_ttl_minutes: i64,
    /// Canonical descriptor length shared by enrollment and verification.
    pub descriptor_len: usize,
    /// Minimum samples per enrollment submission (never below 3).
    pub min_enroll_samples: usize,
    /// Euclidean distance threshold for a positive face match.
    pub match_threshold: f64,
    pub unset_office_policy: UnsetOfficePolicy,
    /// Deadline for a single API operation, in milliseconds.
    pub request_timeout_ms: u64,
    /// Whether anonymous registration may request the admin role.
    pub open_admin_signup: bool,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8001).into(),
            db_path: geoface_store::default_db_path(),
            jwt_secret: None,
            token_ttl_minutes: 1440,
            descriptor_len: DEFAULT_DESCRIPTOR_LEN,
            min_enroll_samples: MIN_ENROLL_SAMPLES,
            match_threshold: 0.6,
            unset_office_policy: UnsetOfficePolicy::Allow,
            request_timeout_ms: 5000,
            open_admin_signup: false,
            cors_origins: vec!["*".to_string()],
        }
    }
}

// Never print the signing secret.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("http_addr", &self.http_addr)
            .field("db_path", &self.db_path)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("descriptor_len", &self.descriptor_len)
            .field("min_enroll_samples", &self.min_enroll_samples)
            .field("match_threshold", &self.match_threshold)
            .field("unset_office_policy", &self.unset_office_policy)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("open_admin_signup", &self.open_admin_signup)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Config {
    /// Load the TOML file named by `GEOFACE_CONFIG` (if any), then apply
    /// `GEOFACE_*` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("GEOFACE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.sanitize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Override fields from `GEOFACE_*` variables looked up through `get`.
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = parsed(&get, "GEOFACE_HTTP_ADDR") {
            self.http_addr = v;
        }
        if let Some(v) = get("GEOFACE_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("GEOFACE_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.jwt_secret = Some(v);
        }
        if let Some(v) = parsed(&get, "GEOFACE_TOKEN_TTL_MINUTES") {
            self.token_ttl_minutes = v;
        }
        if let Some(v) = parsed(&get, "GEOFACE_DESCRIPTOR_LEN") {
            self.descriptor_len = v;
        }
        if let Some(v) = parsed(&get, "GEOFACE_MIN_ENROLL_SAMPLES") {
            self.min_enroll_samples = v;
        }
        if let Some(v) = parsed(&get, "GEOFACE_MATCH_THRESHOLD") {
            self.match_threshold = v;
        }
        if let Some(v) = parsed(&get, "GEOFACE_UNSET_OFFICE_POLICY") {
            self.unset_office_policy = v;
        }
        if let Some(v) = parsed(&get, "GEOFACE_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = v;
        }
        if let Some(v) = get("GEOFACE_OPEN_ADMIN_SIGNUP") {
            self.open_admin_signup = v != "0" && v != "false";
        }
        if let Some(v) = get("GEOFACE_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Replace values that would disable matching or deadlines with their
    /// defaults, logging each replacement.
    pub fn sanitize(&mut self) {
        let defaults = Config::default();
        if self.descriptor_len == 0 {
            tracing::warn!(default = defaults.descriptor_len, "descriptor_len must be positive, using default");
            self.descriptor_len = defaults.descriptor_len;
        }
        if !self.match_threshold.is_finite() || self.match_threshold <= 0.0 {
            tracing::warn!(
                value = self.match_threshold,
                default = defaults.match_threshold,
                "match_threshold must be a positive number, using default"
            );
            self.match_threshold = defaults.match_threshold;
        }
        if self.request_timeout_ms == 0 {
            tracing::warn!(default = defaults.request_timeout_ms, "request_timeout_ms must be positive, using default");
            self.request_timeout_ms = defaults.request_timeout_ms;
        }
        if self.token_ttl_minutes <= 0 {
            tracing::warn!(
                value = self.token_ttl_minutes,
                default = defaults.token_ttl_minutes,
                "token_ttl_minutes must be positive, using default"
            );
            self.token_ttl_minutes = defaults.token_ttl_minutes;
        }
    }

    pub fn enrollment_policy(&self) -> EnrollmentPolicy {
        EnrollmentPolicy::new(self.descriptor_len, self.min_enroll_samples)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let raw = get(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "invalid config override, using previous value");
            None
        }
    }
}
