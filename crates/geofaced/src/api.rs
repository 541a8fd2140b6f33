use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use geoface_core::attendance::parse_date;
use geoface_core::{AttendanceRecord, GeoPoint, OfficeLocation, RecordFilter, Role, TodayStatus, User};
use geoface_store::UserProfile;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{Identity, TokenIssuer};
use crate::config::Config;
use crate::engine::{Engine, OfficeUpdate, Registration};
use crate::error::AttendanceError;

/// Default geofence radius when a write omits it.
const DEFAULT_RADIUS_M: f64 = 100.0;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub tokens: Arc<TokenIssuer>,
    pub config: Arc<Config>,
}

/// JSON body extractor that rejects with the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AttendanceError))]
struct ApiJson<T>(T);

/// Query string extractor that rejects with the API error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AttendanceError))]
struct ApiQuery<T>(T);

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(routes())
        .nest("/api", routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/register-face", post(register_face))
        .route("/users/me", get(me))
        .route("/users/all", get(all_users))
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/check-out", post(check_out))
        .route("/attendance/today-status", get(today_status))
        .route("/attendance/my-history", get(my_history))
        .route("/attendance/all", get(all_records))
        .route("/office/location", get(get_office).post(set_office))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(list))
}

// --- Request / response bodies ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    token_type: &'static str,
    user: UserProfile,
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: String,
    #[serde(default)]
    role: Role,
}

#[derive(Deserialize)]
struct RegisterFaceRequest {
    descriptors: Vec<Vec<f64>>,
}

#[derive(Serialize)]
struct RegisterFaceResponse {
    message: &'static str,
    descriptors_count: usize,
}

#[derive(Deserialize)]
struct CheckInRequest {
    latitude: f64,
    longitude: f64,
    face_descriptor: Vec<f64>,
}

#[derive(Deserialize)]
struct CheckOutRequest {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
struct AttendanceResponse {
    message: String,
    attendance: AttendanceRecord,
}

#[derive(Deserialize)]
struct AllRecordsQuery {
    user_name: Option<String>,
    date: Option<String>,
}

impl AllRecordsQuery {
    /// Empty parameters mean "no filter".
    fn into_filter(self) -> Result<RecordFilter, AttendanceError> {
        let user_name = self
            .user_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_date(raw)?),
        };
        Ok(RecordFilter { user_name, date })
    }
}

#[derive(Deserialize)]
struct OfficeRequest {
    name: String,
    latitude: f64,
    longitude: f64,
    radius: Option<f64>,
}

// --- Handlers ---

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AttendanceError> {
    let user = state.engine.login(&req.email, &req.password).await?;
    let access_token = state.tokens.issue(&user, Utc::now())?;
    let profile = state.engine.profile(&Identity::from(&user)).await?;
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        user: profile,
    }))
}

async fn register(
    State(state): State<AppState>,
    actor: Option<Identity>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AttendanceError> {
    let registration = Registration {
        email: req.email,
        password: req.password,
        name: req.name,
        role: req.role,
    };
    let user = state
        .engine
        .register(actor.as_ref(), registration, Utc::now())
        .await?;
    info!(user_id = %user.id, role = %user.role, "account registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn register_face(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<RegisterFaceRequest>,
) -> Result<Json<RegisterFaceResponse>, AttendanceError> {
    let descriptors_count = state
        .engine
        .enroll(&identity, req.descriptors, Utc::now())
        .await?;
    Ok(Json(RegisterFaceResponse {
        message: "face registered",
        descriptors_count,
    }))
}

async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UserProfile>, AttendanceError> {
    Ok(Json(state.engine.profile(&identity).await?))
}

async fn all_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<UserProfile>>, AttendanceError> {
    Ok(Json(state.engine.list_users(&identity).await?))
}

async fn check_in(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<CheckInRequest>,
) -> Result<Json<AttendanceResponse>, AttendanceError> {
    let point = GeoPoint::new(req.latitude, req.longitude);
    let attendance = state
        .engine
        .check_in(&identity, req.face_descriptor, point, Utc::now())
        .await?;
    let score = attendance.face_match_score.unwrap_or_default();
    Ok(Json(AttendanceResponse {
        message: format!("checked in (face match {score:.2}%)"),
        attendance,
    }))
}

async fn check_out(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<CheckOutRequest>,
) -> Result<Json<AttendanceResponse>, AttendanceError> {
    let point = GeoPoint::new(req.latitude, req.longitude);
    let attendance = state.engine.check_out(&identity, point, Utc::now()).await?;
    Ok(Json(AttendanceResponse {
        message: "checked out".to_string(),
        attendance,
    }))
}

async fn today_status(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<TodayStatus>, AttendanceError> {
    Ok(Json(state.engine.today_status(&identity, Utc::now()).await?))
}

async fn my_history(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<AttendanceRecord>>, AttendanceError> {
    Ok(Json(state.engine.history(&identity).await?))
}

async fn all_records(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<AllRecordsQuery>,
) -> Result<Json<Vec<AttendanceRecord>>, AttendanceError> {
    let filter = query.into_filter()?;
    Ok(Json(state.engine.all_records(&identity, filter).await?))
}

async fn get_office(
    State(state): State<AppState>,
) -> Result<Json<OfficeLocation>, AttendanceError> {
    Ok(Json(state.engine.office_location().await?))
}

async fn set_office(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<OfficeRequest>,
) -> Result<Json<OfficeLocation>, AttendanceError> {
    let update = OfficeUpdate {
        name: req.name,
        latitude: req.latitude,
        longitude: req.longitude,
        radius: req.radius.unwrap_or(DEFAULT_RADIUS_M),
    };
    Ok(Json(
        state
            .engine
            .set_office_location(&identity, update, Utc::now())
            .await?,
    ))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
