//! Attendance engine: enrollment, the office location registry, and the
//! per-user/per-day check-in state machine.
//!
//! Every operation takes the caller's [`Identity`] explicitly and runs under
//! the configured deadline. Matching and geofencing are pure CPU work; the
//! only suspension points are store calls, and each state transition is a
//! single conditional write, so a timeout can never leave a half-applied
//! record behind.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use geoface_core::attendance::attendance_date;
use geoface_core::credentials;
use geoface_core::user::normalize_email;
use geoface_core::{
    AttendanceRecord, AttendanceStatus, EnrollmentPolicy, EuclideanMatcher, GeoPoint, Matcher,
    OfficeLocation, RecordFilter, Role, TodayStatus, User, ValidationError,
};
use geoface_store::{CheckIn, CheckOut, NewUser, Store, Transition, UserProfile};

use crate::auth::Identity;
use crate::config::{Config, UnsetOfficePolicy};
use crate::error::AttendanceError;

/// Most records returned by a user's own history.
pub const HISTORY_LIMIT: u32 = 100;
/// Most records returned by the administrative listing.
pub const ALL_RECORDS_LIMIT: u32 = 1000;

/// Account registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// Office location write input.
#[derive(Debug, Clone)]
pub struct OfficeUpdate {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

pub struct Engine {
    store: Store,
    policy: EnrollmentPolicy,
    match_threshold: f64,
    unset_office: UnsetOfficePolicy,
    open_admin_signup: bool,
    timeout: Duration,
}

impl Engine {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            policy: config.enrollment_policy(),
            match_threshold: config.match_threshold,
            unset_office: config.unset_office_policy,
            open_admin_signup: config.open_admin_signup,
            timeout: config.request_timeout(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run `op` under the configured deadline.
    pub(crate) async fn bounded<T, F>(&self, op: F) -> Result<T, AttendanceError>
    where
        F: Future<Output = Result<T, AttendanceError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "operation deadline exceeded");
                Err(AttendanceError::Timeout(self.timeout))
            }
        }
    }

    // --- Accounts ---

    /// Create an account. The admin role needs an admin caller unless open
    /// admin signup is configured.
    pub async fn register(
        &self,
        actor: Option<&Identity>,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<User, AttendanceError> {
        self.bounded(async {
            if registration.role == Role::Admin
                && !self.open_admin_signup
                && !actor.map(Identity::is_admin).unwrap_or(false)
            {
                return Err(AttendanceError::Forbidden(
                    "only an admin can create admin accounts",
                ));
            }

            let email = normalize_email(&registration.email)?;
            let name = registration.name.trim().to_string();
            if name.is_empty() {
                return Err(ValidationError::EmptyField("name").into());
            }
            if registration.password.is_empty() {
                return Err(ValidationError::EmptyField("password").into());
            }

            let password = registration.password;
            let password_hash = tokio::task::spawn_blocking(move || {
                credentials::hash_password(&password)
            })
            .await
            .map_err(|e| AttendanceError::Internal(e.to_string()))?
            .map_err(|e| AttendanceError::Internal(e.to_string()))?;

            let new = NewUser {
                email: email.clone(),
                name,
                role: registration.role,
                password_hash,
            };
            self.store
                .create_user(new, now)
                .await?
                .ok_or_else(|| AttendanceError::from(ValidationError::EmailTaken(email)))
        })
        .await
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AttendanceError> {
        self.bounded(async {
            let email = normalize_email(email)
                .map_err(|_| AttendanceError::Auth("invalid email or password"))?;
            let Some((user, hash)) = self.store.user_with_password(&email).await? else {
                tracing::info!("login rejected: unknown email");
                return Err(AttendanceError::Auth("invalid email or password"));
            };

            let password = password.to_string();
            let ok = tokio::task::spawn_blocking(move || credentials::verify_password(&password, &hash))
                .await
                .map_err(|e| AttendanceError::Internal(e.to_string()))?;
            if !ok {
                tracing::info!(user_id = %user.id, "login rejected: bad password");
                return Err(AttendanceError::Auth("invalid email or password"));
            }
            tracing::info!(user_id = %user.id, "login succeeded");
            Ok(user)
        })
        .await
    }

    pub async fn profile(&self, actor: &Identity) -> Result<UserProfile, AttendanceError> {
        self.bounded(async {
            self.store
                .user_profile(actor.user_id)
                .await?
                .ok_or(AttendanceError::NotFound("user"))
        })
        .await
    }

    pub async fn list_users(&self, actor: &Identity) -> Result<Vec<UserProfile>, AttendanceError> {
        actor.require_admin()?;
        self.bounded(async { Ok(self.store.list_users().await?) }).await
    }

    // --- Enrollment ---

    /// Replace the caller's face templates with a new batch. All or nothing.
    pub async fn enroll(
        &self,
        actor: &Identity,
        descriptors: Vec<Vec<f64>>,
        now: DateTime<Utc>,
    ) -> Result<usize, AttendanceError> {
        let batch = self.policy.validate_batch(descriptors).map_err(|e| {
            tracing::info!(user_id = %actor.user_id, error = %e, "enrollment rejected");
            e
        })?;
        self.bounded(async {
            let stored = self.store.replace_templates(actor.user_id, batch, now).await?;
            tracing::info!(user_id = %actor.user_id, templates = stored, "face enrolled");
            Ok(stored)
        })
        .await
    }

    // --- Office location registry ---

    pub async fn office_location(&self) -> Result<OfficeLocation, AttendanceError> {
        self.bounded(async {
            self.store
                .office_location()
                .await?
                .ok_or(AttendanceError::NotFound("office location"))
        })
        .await
    }

    pub async fn set_office_location(
        &self,
        actor: &Identity,
        update: OfficeUpdate,
        now: DateTime<Utc>,
    ) -> Result<OfficeLocation, AttendanceError> {
        actor.require_admin()?;
        let office = OfficeLocation {
            name: update.name.trim().to_string(),
            latitude: update.latitude,
            longitude: update.longitude,
            radius: update.radius,
            updated_by: Some(actor.user_id),
            updated_at: now,
        };
        office.validate()?;

        self.bounded(async {
            self.store.set_office_location(&office).await?;
            tracing::info!(
                admin = %actor.user_id,
                name = %office.name,
                latitude = office.latitude,
                longitude = office.longitude,
                radius_m = office.radius,
                "office location updated"
            );
            Ok(office)
        })
        .await
    }

    // --- Attendance state machine ---

    /// Verify face and location, then book today's check-in exactly once.
    pub async fn check_in(
        &self,
        actor: &Identity,
        probe: Vec<f64>,
        point: GeoPoint,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let probe = self.policy.validate_probe(probe)?;
        point.validate()?;
        let user_id = actor.user_id;
        let date = attendance_date(now);

        self.bounded(async {
            if let Some(existing) = self.store.attendance_for(user_id, date).await? {
                return Err(rejected_check_in(user_id, existing.status));
            }

            let templates = self.store.templates_for(user_id).await?;
            if templates.is_empty() {
                tracing::info!(user_id = %user_id, "check-in rejected: no templates enrolled");
                return Err(ValidationError::NoTemplates.into());
            }

            let result = EuclideanMatcher.compare(&probe, &templates, self.match_threshold);
            if !result.matched {
                tracing::info!(
                    user_id = %user_id,
                    distance = result.distance,
                    threshold = self.match_threshold,
                    "check-in rejected: face mismatch"
                );
                return Err(AttendanceError::Match {
                    distance: result.distance,
                    score: result.score,
                    threshold: self.match_threshold,
                });
            }

            match self.store.office_location().await? {
                Some(office) => {
                    let fence = office.contains(point);
                    if !fence.ok {
                        tracing::info!(
                            user_id = %user_id,
                            distance_m = fence.distance_m,
                            radius_m = office.radius,
                            "check-in rejected: outside geofence"
                        );
                        return Err(AttendanceError::Geofence {
                            distance_m: fence.distance_m,
                            radius_m: office.radius,
                        });
                    }
                }
                None => match self.unset_office {
                    UnsetOfficePolicy::Allow => {
                        tracing::warn!(user_id = %user_id, "no office location configured; geofence skipped");
                    }
                    UnsetOfficePolicy::Reject => {
                        return Err(AttendanceError::NotFound("office location"));
                    }
                },
            }

            let booked = self
                .store
                .record_check_in(CheckIn {
                    user_id,
                    date,
                    time: now,
                    location: point,
                    face_match_score: result.score,
                })
                .await?;

            match booked {
                Transition::Applied(record) => {
                    tracing::info!(
                        user_id = %user_id,
                        name = %actor.name,
                        %date,
                        score = result.score,
                        distance = result.distance,
                        "checked in"
                    );
                    Ok(record)
                }
                // Lost a race with a concurrent check-in for the same day.
                Transition::Rejected(current) => Err(rejected_check_in(user_id, current)),
            }
        })
        .await
    }

    /// Close today's record. Location is recorded but does not gate the transition.
    pub async fn check_out(
        &self,
        actor: &Identity,
        point: GeoPoint,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        point.validate()?;
        let user_id = actor.user_id;
        let date = attendance_date(now);

        self.bounded(async {
            let outcome = self
                .store
                .record_check_out(CheckOut {
                    user_id,
                    date,
                    time: now,
                    location: point,
                })
                .await?;

            match outcome {
                Transition::Applied(record) => {
                    tracing::info!(user_id = %user_id, %date, "checked out");
                    Ok(record)
                }
                Transition::Rejected(current) => {
                    tracing::info!(user_id = %user_id, %date, status = %current, "check-out rejected");
                    Err(AttendanceError::State {
                        current,
                        attempted: "check out",
                    })
                }
            }
        })
        .await
    }

    pub async fn today_status(
        &self,
        actor: &Identity,
        now: DateTime<Utc>,
    ) -> Result<TodayStatus, AttendanceError> {
        self.bounded(async {
            let record = self
                .store
                .attendance_for(actor.user_id, attendance_date(now))
                .await?;
            Ok(TodayStatus::from_record(record))
        })
        .await
    }

    pub async fn history(&self, actor: &Identity) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.bounded(async { Ok(self.store.history(actor.user_id, HISTORY_LIMIT).await?) })
            .await
    }

    pub async fn all_records(
        &self,
        actor: &Identity,
        filter: RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        actor.require_admin()?;
        self.bounded(async { Ok(self.store.all_records(filter, ALL_RECORDS_LIMIT).await?) })
            .await
    }
}

fn rejected_check_in(user_id: uuid::Uuid, current: AttendanceStatus) -> AttendanceError {
    tracing::info!(user_id = %user_id, status = %current, "check-in rejected");
    AttendanceError::State {
        current,
        attempted: "check in",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use geoface_core::geofence::EARTH_RADIUS_M;
    use std::sync::Arc;

    const DIM: usize = 4;
    const OFFICE: GeoPoint = GeoPoint {
        latitude: -6.200000,
        longitude: 106.816666,
    };

    fn config() -> Config {
        Config {
            descriptor_len: DIM,
            match_threshold: 0.6,
            ..Config::default()
        }
    }

    async fn engine_with(config: Config) -> Engine {
        Engine::new(Store::open_in_memory().await.unwrap(), &config)
    }

    async fn engine() -> Engine {
        engine_with(config()).await
    }

    async fn add_user(engine: &Engine, email: &str, name: &str, role: Role) -> Identity {
        let user = engine
            .store()
            .create_user(
                NewUser {
                    email: email.into(),
                    name: name.into(),
                    role,
                    password_hash: "unused".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        Identity::from(&user)
    }

    fn enrollment() -> Vec<Vec<f64>> {
        vec![
            vec![0.0; DIM],
            vec![1.0, 1.0, 1.0, 1.0],
            vec![-1.0, 0.5, 0.0, 0.2],
        ]
    }

    /// 0.3 away from the first enrolled template.
    fn probe() -> Vec<f64> {
        vec![0.3, 0.0, 0.0, 0.0]
    }

    fn north_of(p: GeoPoint, meters: f64) -> GeoPoint {
        GeoPoint::new(p.latitude + (meters / EARTH_RADIUS_M).to_degrees(), p.longitude)
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    async fn set_office(engine: &Engine, admin: &Identity) {
        engine
            .set_office_location(
                admin,
                OfficeUpdate {
                    name: "HQ".into(),
                    latitude: OFFICE.latitude,
                    longitude: OFFICE.longitude,
                    radius: 100.0,
                },
                morning(),
            )
            .await
            .unwrap();
    }

    /// Engine with an office, an admin, and an enrolled employee.
    async fn ready() -> (Engine, Identity, Identity) {
        let engine = engine().await;
        let admin = add_user(&engine, "admin@example.com", "Admin", Role::Admin).await;
        let emp = add_user(&engine, "ana@example.com", "Ana", Role::Employee).await;
        set_office(&engine, &admin).await;
        engine.enroll(&emp, enrollment(), morning()).await.unwrap();
        (engine, admin, emp)
    }

    #[tokio::test]
    async fn test_check_in_at_office_scores_fifty() {
        let (engine, _, emp) = ready().await;

        let record = engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::CheckedIn);
        assert_eq!(record.check_in_time, Some(morning()));
        assert_eq!(record.check_in_location, Some(OFFICE));
        let score = record.face_match_score.unwrap();
        assert!((score - 50.0).abs() < 1e-6, "score {score}");

        let today = engine.today_status(&emp, morning()).await.unwrap();
        assert_eq!(today.status, AttendanceStatus::CheckedIn);
    }

    #[tokio::test]
    async fn test_check_in_outside_geofence_reports_distance() {
        let (engine, _, emp) = ready().await;
        let far = north_of(OFFICE, 200.0);

        let err = engine.check_in(&emp, probe(), far, morning()).await.unwrap_err();
        match err {
            AttendanceError::Geofence {
                distance_m,
                radius_m,
            } => {
                assert!((distance_m - 200.0).abs() < 0.5, "distance {distance_m}");
                assert_eq!(radius_m, 100.0);
            }
            other => panic!("expected geofence error, got {other:?}"),
        }
        assert!(engine
            .store()
            .attendance_for(emp.user_id, attendance_date(morning()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_check_in_without_templates_is_validation_error() {
        let engine = engine().await;
        let emp = add_user(&engine, "new@example.com", "New", Role::Employee).await;

        let err = engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap_err();
        assert!(
            matches!(err, AttendanceError::Validation(ValidationError::NoTemplates)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_check_in_face_mismatch() {
        let (engine, _, emp) = ready().await;
        let stranger = vec![5.0, -5.0, 5.0, -5.0];

        let err = engine.check_in(&emp, stranger, OFFICE, morning()).await.unwrap_err();
        match err {
            AttendanceError::Match {
                distance,
                score,
                threshold,
            } => {
                assert!(distance > threshold);
                assert_eq!(score, 0.0);
            }
            other => panic!("expected match error, got {other:?}"),
        }
        let today = engine.today_status(&emp, morning()).await.unwrap();
        assert_eq!(today.status, AttendanceStatus::NotCheckedIn);
    }

    #[tokio::test]
    async fn test_check_in_rejects_bad_probe_shape() {
        let (engine, _, emp) = ready().await;
        let err = engine
            .check_in(&emp, vec![0.0; DIM + 1], OFFICE, morning())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::Validation(ValidationError::DescriptorLength { .. })
        ));
    }

    #[tokio::test]
    async fn test_double_check_in_is_state_error() {
        let (engine, _, emp) = ready().await;
        engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap();

        let err = engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::State {
                current: AttendanceStatus::CheckedIn,
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_ins_succeed_once() {
        let (engine, _, emp) = ready().await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = engine.clone();
            let emp = emp.clone();
            handles.push(tokio::spawn(async move {
                engine.check_in(&emp, probe(), OFFICE, morning()).await
            }));
        }

        let mut ok = 0;
        let mut state_errors = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AttendanceError::State { .. }) => state_errors += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!((ok, state_errors), (1, 1));

        let records = engine.history(&emp).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_outs_succeed_once() {
        let (engine, _, emp) = ready().await;
        engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..6 {
            let engine = engine.clone();
            let emp = emp.clone();
            let at = morning() + chrono::Duration::hours(8) + chrono::Duration::minutes(i);
            handles.push(tokio::spawn(async move {
                engine.check_out(&emp, OFFICE, at).await
            }));
        }

        let mut winners = Vec::new();
        let mut state_errors = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(record) => winners.push(record),
                Err(AttendanceError::State {
                    current: AttendanceStatus::CheckedOut,
                    ..
                }) => state_errors += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!((winners.len(), state_errors), (1, 5));

        let today = engine.today_status(&emp, morning()).await.unwrap();
        let stored = today.attendance.unwrap();
        assert_eq!(stored.status, AttendanceStatus::CheckedOut);
        assert_eq!(stored.check_out_time, winners[0].check_out_time);
    }

    #[tokio::test]
    async fn test_check_out_transitions() {
        let (engine, _, emp) = ready().await;
        let evening = morning() + chrono::Duration::hours(9);
        let elsewhere = north_of(OFFICE, 5_000.0);

        let err = engine.check_out(&emp, OFFICE, evening).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::State {
                current: AttendanceStatus::NotCheckedIn,
                ..
            }
        ));

        engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap();
        // Check-out is not geofenced.
        let record = engine.check_out(&emp, elsewhere, evening).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::CheckedOut);
        assert_eq!(record.check_out_location, Some(elsewhere));
        assert_eq!(record.check_out_time, Some(evening));

        let err = engine.check_out(&emp, OFFICE, evening).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::State {
                current: AttendanceStatus::CheckedOut,
                ..
            }
        ));
        let err = engine.check_in(&emp, probe(), OFFICE, evening).await.unwrap_err();
        assert!(matches!(err, AttendanceError::State { .. }));
    }

    #[tokio::test]
    async fn test_next_day_starts_fresh() {
        let (engine, _, emp) = ready().await;
        engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap();
        engine.check_out(&emp, OFFICE, morning()).await.unwrap();

        let tomorrow = morning() + chrono::Duration::days(1);
        let today = engine.today_status(&emp, tomorrow).await.unwrap();
        assert_eq!(today.status, AttendanceStatus::NotCheckedIn);
        assert!(today.attendance.is_none());
        engine.check_in(&emp, probe(), OFFICE, tomorrow).await.unwrap();
    }

    #[tokio::test]
    async fn test_unset_office_policy() {
        let allow = engine().await;
        let emp = add_user(&allow, "a@example.com", "A", Role::Employee).await;
        allow.enroll(&emp, enrollment(), morning()).await.unwrap();
        let far = north_of(OFFICE, 10_000.0);
        assert!(allow.check_in(&emp, probe(), far, morning()).await.is_ok());

        let reject = engine_with(Config {
            unset_office_policy: UnsetOfficePolicy::Reject,
            ..config()
        })
        .await;
        let emp = add_user(&reject, "a@example.com", "A", Role::Employee).await;
        reject.enroll(&emp, enrollment(), morning()).await.unwrap();
        let err = reject.check_in(&emp, probe(), OFFICE, morning()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NotFound("office location")));
    }

    #[tokio::test]
    async fn test_enroll_too_few_keeps_previous_templates() {
        let (engine, _, emp) = ready().await;
        let before = engine.store().templates_for(emp.user_id).await.unwrap();

        let err = engine
            .enroll(&emp, vec![vec![9.0; DIM], vec![9.0; DIM]], morning())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::Validation(ValidationError::TooFewSamples { got: 2, min: 3 })
        ));

        let after = engine.store().templates_for(emp.user_id).await.unwrap();
        assert_eq!(before.len(), after.len());
        assert_eq!(
            before.iter().map(|t| t.id).collect::<Vec<_>>(),
            after.iter().map(|t| t.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_reenroll_replaces_set() {
        let (engine, _, emp) = ready().await;
        let batch = vec![vec![3.0; DIM], vec![3.1; DIM], vec![3.2; DIM], vec![3.3; DIM]];
        assert_eq!(engine.enroll(&emp, batch, morning()).await.unwrap(), 4);

        // The old template at the origin is gone, so the old probe no longer matches.
        let err = engine.check_in(&emp, probe(), OFFICE, morning()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Match { .. }));
    }

    #[tokio::test]
    async fn test_self_match_scores_hundred() {
        let (engine, _, emp) = ready().await;
        let record = engine
            .check_in(&emp, vec![1.0, 1.0, 1.0, 1.0], OFFICE, morning())
            .await
            .unwrap();
        assert_eq!(record.face_match_score, Some(100.0));
    }

    #[tokio::test]
    async fn test_office_registry() {
        let engine = engine().await;
        let admin = add_user(&engine, "admin@example.com", "Admin", Role::Admin).await;
        let emp = add_user(&engine, "e@example.com", "E", Role::Employee).await;

        assert!(matches!(
            engine.office_location().await,
            Err(AttendanceError::NotFound(_))
        ));

        let update = OfficeUpdate {
            name: "HQ".into(),
            latitude: OFFICE.latitude,
            longitude: OFFICE.longitude,
            radius: 100.0,
        };
        let err = engine
            .set_office_location(&emp, update.clone(), morning())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Forbidden(_)));

        let bad = OfficeUpdate {
            radius: 0.0,
            ..update.clone()
        };
        assert!(matches!(
            engine.set_office_location(&admin, bad, morning()).await,
            Err(AttendanceError::Validation(ValidationError::Radius(_)))
        ));
        let bad = OfficeUpdate {
            latitude: 123.0,
            ..update.clone()
        };
        assert!(matches!(
            engine.set_office_location(&admin, bad, morning()).await,
            Err(AttendanceError::Validation(ValidationError::Latitude(_)))
        ));

        engine.set_office_location(&admin, update, morning()).await.unwrap();
        let office = engine.office_location().await.unwrap();
        assert_eq!(office.name, "HQ");
        assert_eq!(office.updated_by, Some(admin.user_id));
    }

    #[tokio::test]
    async fn test_all_records_by_date_across_users() {
        let (engine, admin, ana) = ready().await;
        let budi = add_user(&engine, "budi@example.com", "Budi", Role::Employee).await;
        engine.enroll(&budi, enrollment(), morning()).await.unwrap();

        let next_day = morning() + chrono::Duration::days(1);
        for who in [&ana, &budi] {
            engine.check_in(who, probe(), OFFICE, morning()).await.unwrap();
        }
        engine.check_in(&ana, probe(), OFFICE, next_day).await.unwrap();

        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = engine
            .all_records(
                &admin,
                RecordFilter {
                    user_name: None,
                    date: Some(jan1),
                },
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.date == jan1));

        let err = engine
            .all_records(&ana, RecordFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Forbidden(_)));
        assert!(matches!(
            engine.list_users(&ana).await,
            Err(AttendanceError::Forbidden(_))
        ));
        assert_eq!(engine.list_users(&admin).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let engine = engine().await;
        let user = engine
            .register(
                None,
                Registration {
                    email: " Ana@Example.com ".into(),
                    password: "pw".into(),
                    name: "Ana".into(),
                    role: Role::Employee,
                },
                morning(),
            )
            .await
            .unwrap();
        assert_eq!(user.email, "ana@example.com");

        let logged_in = engine.login("ana@example.com", "pw").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(matches!(
            engine.login("ana@example.com", "nope").await,
            Err(AttendanceError::Auth(_))
        ));
        assert!(matches!(
            engine.login("ghost@example.com", "pw").await,
            Err(AttendanceError::Auth(_))
        ));

        let dup = engine
            .register(
                None,
                Registration {
                    email: "ana@example.com".into(),
                    password: "pw2".into(),
                    name: "Other".into(),
                    role: Role::Employee,
                },
                morning(),
            )
            .await;
        assert!(matches!(
            dup,
            Err(AttendanceError::Validation(ValidationError::EmailTaken(_)))
        ));
    }

    #[tokio::test]
    async fn test_admin_registration_gated() {
        let engine = engine().await;
        let admin_req = || Registration {
            email: "boss@example.com".into(),
            password: "pw".into(),
            name: "Boss".into(),
            role: Role::Admin,
        };

        let err = engine.register(None, admin_req(), morning()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Forbidden(_)));

        let admin = add_user(&engine, "root@example.com", "Root", Role::Admin).await;
        let created = engine
            .register(Some(&admin), admin_req(), morning())
            .await
            .unwrap();
        assert_eq!(created.role, Role::Admin);

        let open = engine_with(Config {
            open_admin_signup: true,
            ..config()
        })
        .await;
        assert!(open.register(None, admin_req(), morning()).await.is_ok());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let engine = engine_with(Config {
            request_timeout_ms: 10,
            ..config()
        })
        .await;
        let err = engine
            .bounded(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Timeout(_)));
    }
}
