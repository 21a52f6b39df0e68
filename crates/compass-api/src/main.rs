//! compass-api - HTTP API server for Cause Compass

mod middleware;
mod services;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Extension, FromRequest, Path, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{delete, get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use compass_core::{
    OrganizationCatalog, OrganizationSearchFilters, PreferenceRepository, Preferences,
    PreferencesPatch,
};
use compass_db::Database;

use middleware::session::{clear_session_cookies, has_preferences_cookie, SessionContext};
use services::compass::DEFAULT_DECK_LIMIT;
use services::CompassService;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    compass: CompassService,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

// =============================================================================
// CORS
// =============================================================================

/// Parse allowed CORS origins from the ALLOWED_ORIGINS environment variable.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    if origins_str.trim().is_empty() {
        return vec![HeaderValue::from_static("http://localhost:3000")];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// Read an environment variable, falling back to `default` when it is unset.
/// A value that is present but unparseable is a configuration error, not a
/// silent fallback.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> compass_core::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            compass_core::Error::Config(format!("{} must be a number, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "compass_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "compass_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("compass-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/compass".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env_parse("PORT", 3000)?;

    // Rate limiting configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60 = 1 minute)
    let rate_limit_requests: u64 = env_parse("RATE_LIMIT_REQUESTS", 100)?;
    let rate_limit_period_secs: u64 = env_parse("RATE_LIMIT_PERIOD_SECS", 60)?;
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .ok_or_else(|| anyhow::anyhow!("Rate limit period must be non-zero"))?
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32)
                    .ok_or_else(|| anyhow::anyhow!("Rate limit must be non-zero"))?,
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    let compass = CompassService::new(&db);
    let state = AppState {
        db,
        compass,
        rate_limiter,
    };

    let app = app_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full application router with middleware layers.
fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Session
        .route("/api/v1/session", get(session_info))
        .route("/api/v1/session/reset", post(reset_session))
        // Preferences
        .route(
            "/api/v1/preferences",
            get(get_preferences)
                .put(put_preferences)
                .patch(patch_preferences)
                .delete(delete_preferences),
        )
        .route("/api/v1/onboarding", post(submit_onboarding))
        // Deck and liked causes
        .route("/api/v1/discover", get(discover))
        .route("/api/v1/my-causes", get(my_causes))
        // Likes
        .route("/api/v1/likes", get(list_likes).post(add_like).delete(clear_likes))
        .route("/api/v1/likes/:org_id", delete(remove_like))
        // Organization catalog
        .route("/api/v1/organizations", get(search_organizations))
        .route("/api/v1/organizations/count", get(count_organizations))
        .route("/api/v1/organizations/ein/:ein", get(get_organization_by_ein))
        .route("/api/v1/organizations/:id", get(get_organization))
        // Middleware
        .layer(axum::middleware::from_fn(middleware::ensure_session))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MB, JSON documents only
        .with_state(state)
}

// =============================================================================
// RATE LIMITING
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => "up",
        Err(_) => "down",
    };
    Json(serde_json::json!({
        "status": if database == "up" { "healthy" } else { "degraded" },
        "database": database,
    }))
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

#[derive(Debug, Serialize)]
struct SessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "hasPreferences")]
    has_preferences: bool,
}

/// Return the (possibly just-minted) session identity.
async fn session_info(Extension(session): Extension<SessionContext>) -> impl IntoResponse {
    Json(SessionResponse {
        session_id: session.session_id,
        has_preferences: session.has_preferences,
    })
}

/// Start over: delete preferences, clear likes, expire both cookies.
/// The next request mints a fresh identifier.
async fn reset_session(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, ApiError> {
    state.compass.reset(&session.session_id).await?;

    let [session_cookie, marker_cookie] = clear_session_cookies();
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, marker_cookie),
        ]),
        Json(serde_json::json!({ "reset": true })),
    ))
}

// =============================================================================
// PREFERENCE HANDLERS
// =============================================================================

async fn get_preferences(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Preferences>, ApiError> {
    let prefs = state.db.preferences.get(&session.session_id).await?;
    Ok(Json(prefs))
}

async fn put_preferences(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    ApiJson(prefs): ApiJson<Preferences>,
) -> Result<Json<Preferences>, ApiError> {
    let stored = state
        .db
        .preferences
        .upsert(&session.session_id, prefs)
        .await?;
    Ok(Json(stored))
}

async fn patch_preferences(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    ApiJson(patch): ApiJson<PreferencesPatch>,
) -> Result<Json<Preferences>, ApiError> {
    let merged = state
        .db
        .preferences
        .update_partial(&session.session_id, patch)
        .await?;
    Ok(Json(merged))
}

async fn delete_preferences(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<StatusCode, ApiError> {
    state.db.preferences.delete(&session.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Onboarding completion: full-document upsert, then set the
/// `hasPreferences` routing marker cookie.
async fn submit_onboarding(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    ApiJson(prefs): ApiJson<Preferences>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = state
        .db
        .preferences
        .upsert(&session.session_id, prefs)
        .await?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, has_preferences_cookie())]),
        Json(stored),
    ))
}

// =============================================================================
// DECK AND LIKES HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct DeckParams {
    limit: Option<i64>,
}

/// The swipe deck: recommendable organizations, name-ordered.
async fn discover(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Query(params): Query<DeckParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_DECK_LIMIT).clamp(1, 500);
    let deck = state
        .compass
        .discover_deck(&session.session_id, limit)
        .await?;
    Ok(Json(deck))
}

/// The session's liked organizations, resolved in insertion order.
async fn my_causes(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, ApiError> {
    let causes = state.compass.my_causes(&session.session_id).await?;
    Ok(Json(causes))
}

#[derive(Debug, Deserialize)]
struct LikeRequest {
    organization_id: Uuid,
}

#[derive(Debug, Serialize)]
struct LikedIdsResponse {
    liked: Vec<Uuid>,
}

async fn list_likes(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<LikedIdsResponse>, ApiError> {
    let liked = state.compass.liked_ids(&session.session_id).await?;
    Ok(Json(LikedIdsResponse { liked }))
}

async fn add_like(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    ApiJson(body): ApiJson<LikeRequest>,
) -> Result<Json<LikedIdsResponse>, ApiError> {
    let liked = state
        .compass
        .like(&session.session_id, body.organization_id)
        .await?;
    Ok(Json(LikedIdsResponse { liked }))
}

async fn remove_like(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(org_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.compass.unlike(&session.session_id, org_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_likes(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<StatusCode, ApiError> {
    state.compass.clear_likes(&session.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ORGANIZATION CATALOG HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct OrganizationSearchParams {
    name: Option<String>,
    ein: Option<String>,
    state: Option<String>,
    city: Option<String>,
    ntee_prefix: Option<String>,
    asset_amt_min: Option<i64>,
    asset_amt_max: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl OrganizationSearchParams {
    fn into_parts(self) -> (OrganizationSearchFilters, i64, i64) {
        let filters = OrganizationSearchFilters {
            name: self.name,
            ein: self.ein,
            state: self.state,
            city: self.city,
            ntee_prefix: self.ntee_prefix,
            asset_amt_min: self.asset_amt_min,
            asset_amt_max: self.asset_amt_max,
        };
        let limit = self.limit.unwrap_or(25).clamp(1, 100);
        let offset = self.offset.unwrap_or(0).max(0);
        (filters, limit, offset)
    }
}

async fn search_organizations(
    State(state): State<AppState>,
    Query(params): Query<OrganizationSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (filters, limit, offset) = params.into_parts();
    let results = state.db.catalog.search(&filters, limit, offset).await?;
    Ok(Json(results))
}

async fn get_organization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.catalog.get_by_id(id).await? {
        Some(org) => Ok(Json(org)),
        None => Err(ApiError::NotFound(format!("organization {} not found", id))),
    }
}

async fn get_organization_by_ein(
    State(state): State<AppState>,
    Path(ein): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.catalog.get_by_ein(&ein).await? {
        Some(org) => Ok(Json(org)),
        None => Err(ApiError::NotFound(format!(
            "organization with EIN {} not found",
            ein
        ))),
    }
}

async fn count_organizations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.db.catalog.count().await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(compass_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Store connectivity failures map to 503 so clients can retry.
    Unavailable(String),
}

impl From<compass_core::Error> for ApiError {
    fn from(err: compass_core::Error) -> Self {
        match &err {
            compass_core::Error::Validation(msg) => ApiError::BadRequest(msg.clone()),
            compass_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            compass_core::Error::OrganizationNotFound(id) => {
                ApiError::NotFound(format!("organization {} not found", id))
            }
            compass_core::Error::Conflict(msg) => ApiError::Conflict(msg.clone()),
            compass_core::Error::Database(_) if err.is_retryable() => {
                ApiError::Unavailable("store temporarily unavailable".to_string())
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// JSON body extractor whose rejections use the same `{"error": ...}` body as
/// every other failure, instead of axum's default plain-text 422.
struct ApiJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}
