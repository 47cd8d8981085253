use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::health::HealthSnapshot;
use crate::api::latency::TickPercentiles;
use crate::codec::{CapabilityGate, CipherPayload};
use crate::error::AppError;
use crate::scheduler::HunterScheduler;
use crate::types::{Hunter, HunterDefinition, HunterUpdate};

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<HunterScheduler>,
    pub gate: Arc<CapabilityGate>,
    /// Used by the thumbnail proxy.
    pub http: reqwest::Client,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/ticks", get(get_tick_stats))
        .route("/users/:owner/hunters", get(list_hunters).post(hire_hunter))
        .route(
            "/users/:owner/hunters/:id",
            put(transfer_hunter).delete(dismiss_hunter),
        )
        .route("/ignore", get(ignore_item))
        .route("/unignore", get(unignore_item))
        .route("/thumbnail", get(thumbnail))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HunterResponse {
    #[serde(flatten)]
    pub hunter: Hunter,
    pub search_condition_json: serde_json::Value,
}

impl From<Hunter> for HunterResponse {
    fn from(hunter: Hunter) -> Self {
        let search_condition_json =
            serde_json::from_str(&hunter.search_condition).unwrap_or(serde_json::Value::Null);
        Self { hunter, search_condition_json }
    }
}

#[derive(Serialize)]
pub struct DismissResponse {
    pub id: String,
    pub dismissed: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.scheduler.health().await)
}

async fn get_tick_stats(State(state): State<ApiState>) -> Json<TickPercentiles> {
    Json(state.scheduler.tick_stats().percentiles())
}

async fn list_hunters(
    State(state): State<ApiState>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<HunterResponse>>, AppError> {
    let hunters = state.scheduler.list(&owner).await?;
    Ok(Json(hunters.into_iter().map(HunterResponse::from).collect()))
}

async fn hire_hunter(
    State(state): State<ApiState>,
    Path(owner): Path<String>,
    Json(definition): Json<HunterDefinition>,
) -> Result<(StatusCode, Json<HunterResponse>), AppError> {
    let hunter = state.scheduler.hire(&owner, definition).await?;
    Ok((StatusCode::CREATED, Json(hunter.into())))
}

async fn transfer_hunter(
    State(state): State<ApiState>,
    Path((owner, id)): Path<(String, String)>,
    Json(update): Json<HunterUpdate>,
) -> Result<Json<HunterResponse>, AppError> {
    state.scheduler.authorize(&owner, &id).await?;
    let hunter = state.scheduler.transfer(&id, update).await?;
    Ok(Json(hunter.into()))
}

async fn dismiss_hunter(
    State(state): State<ApiState>,
    Path((owner, id)): Path<(String, String)>,
) -> Result<Json<DismissResponse>, AppError> {
    state.scheduler.authorize(&owner, &id).await?;
    let dismissed = state.scheduler.dismiss(&id).await?;
    Ok(Json(DismissResponse { id, dismissed }))
}

async fn ignore_item(
    State(state): State<ApiState>,
    Query(q): Query<TokenQuery>,
) -> Result<Html<String>, AppError> {
    let payload = CipherPayload::from_token(&q.token)?;
    let (_, item_id) = state.gate.ignore(&payload).await?;
    Ok(Html(format!(
        "<p>Item {} will no longer appear in your notifications.</p>",
        crate::notify::render::escape(&item_id)
    )))
}

async fn unignore_item(
    State(state): State<ApiState>,
    Query(q): Query<TokenQuery>,
) -> Result<Html<String>, AppError> {
    let payload = CipherPayload::from_token(&q.token)?;
    let (_, item_id) = state.gate.unignore(&payload).await?;
    Ok(Html(format!(
        "<p>Item {} will appear in your notifications again.</p>",
        crate::notify::render::escape(&item_id)
    )))
}

async fn thumbnail(
    State(state): State<ApiState>,
    Query(q): Query<TokenQuery>,
) -> Result<Response, AppError> {
    let payload = CipherPayload::from_token(&q.token)?;
    let url = state.gate.thumbnail_url(&payload)?;

    let upstream = state.http.get(url.clone()).send().await?;
    if !upstream.status().is_success() {
        warn!(url = %url, status = %upstream.status(), "Thumbnail upstream error");
        return Err(AppError::Fetch(format!("thumbnail upstream returned {}", upstream.status())));
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = upstream.bytes().await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}
