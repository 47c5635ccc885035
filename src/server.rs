//! HTTP surface.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{Error, MonitorConfig, Pollutant, SharedClock, TimeRange, TIMESTAMP_FORMAT};
use dashboard::{DashboardAggregator, DashboardPayload, DashboardRequest, DataCache, ForecastResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<DashboardAggregator>,
    pub cache: Arc<DataCache>,
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(config: &MonitorConfig, clock: SharedClock) -> Self {
        let cache = Arc::new(DataCache::new(clock.clone()));
        let aggregator = Arc::new(DashboardAggregator::new(config, cache.clone(), clock.clone()));
        Self {
            aggregator,
            cache,
            clock,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cities", get(cities))
        .route("/api/dashboard", get(dashboard))
        .route("/api/forecast", get(forecast))
        .route("/api/log", post(client_log))
        .fallback(not_found)
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────

/// Error response body: `{"error": {code, message, details}}`.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!("Rejected request: {}", self.0);
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_payload() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run aggregator work off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}

// ── Query parsing ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    city: Option<String>,
    #[serde(rename = "timeRange")]
    time_range: Option<String>,
    pollutant: Option<String>,
}

impl DashboardQuery {
    fn city(&self) -> Option<String> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    fn time_range(&self) -> common::Result<TimeRange> {
        match self.time_range.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Ok(TimeRange::default()),
        }
    }

    fn pollutant(&self) -> common::Result<Pollutant> {
        match self.pollutant.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Ok(Pollutant::default()),
        }
    }

    fn into_request(self) -> common::Result<DashboardRequest> {
        Ok(DashboardRequest {
            city: self.city(),
            time_range: self.time_range()?,
            pollutant: self.pollutant()?,
        })
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    cache_size: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: state.clock.now().format(TIMESTAMP_FORMAT).to_string(),
        version: env!("CARGO_PKG_VERSION"),
        cache_size: state.cache.dataset_count(),
    })
}

async fn cities(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "cities": state.aggregator.cities() }))
}

async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<DashboardPayload> {
    let request = query.into_request()?;
    info!(
        "Dashboard request: city={} range={} pollutant={}",
        request
            .city
            .as_deref()
            .unwrap_or(state.aggregator.default_city()),
        request.time_range,
        request.pollutant
    );
    let aggregator = state.aggregator.clone();
    let payload = run_blocking(move || aggregator.dashboard(&request)).await?;
    Ok(Json(payload))
}

async fn forecast(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<ForecastResult> {
    let request = query.into_request()?;
    let aggregator = state.aggregator.clone();
    let result = run_blocking(move || {
        aggregator.forecast_for(request.city.as_deref(), request.pollutant, request.time_range)
    })
    .await?;
    Ok(Json(result.as_ref().clone()))
}

fn is_empty_log(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Client-side log sink. Entries are re-emitted under the `client_log`
/// tracing target.
async fn client_log(body: Bytes) -> (StatusCode, Json<Value>) {
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        Ok(Value::Null)
    } else {
        serde_json::from_slice::<Value>(&body)
    };

    match parsed {
        Ok(value) if !is_empty_log(&value) => {
            info!(target: "client_log", "{}", value);
            (
                StatusCode::OK,
                Json(json!({ "status": "success", "message": "Log received" })),
            )
        }
        Ok(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "No log data provided" })),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": format!("Invalid log payload: {e}") })),
        ),
    }
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested resource was not found",
            "code": 404
        })),
    )
}
