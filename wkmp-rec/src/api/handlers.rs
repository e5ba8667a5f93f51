//! HTTP request handlers

use super::{ApiError, ApiResult, AppState};
use crate::service::SupervisorStatus;
use crate::types::{Rating, RecommendationRequest, RecommendationResult, Song, User, UserId};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub model: SupervisorStatus,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub count: Option<usize>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state
        .supervisor
        .status()
        .await
        .unwrap_or_else(|_| SupervisorStatus::unavailable());

    let status = if model.state == "unavailable" {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        module: "wkmp-rec",
        version: env!("CARGO_PKG_VERSION"),
        model,
    })
}

/// POST /api/v1/users
pub async fn add_user(
    State(state): State<AppState>,
    payload: Result<Json<User>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(user) = payload?;
    debug!("Adding user {}", user.id);
    state.supervisor.add_user(user).await?;
    Ok(created())
}

/// POST /api/v1/songs
pub async fn add_song(
    State(state): State<AppState>,
    payload: Result<Json<Song>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(song) = payload?;
    debug!("Adding song {}", song.id);
    state.supervisor.add_song(song).await?;
    Ok(created())
}

/// POST /api/v1/ratings
pub async fn add_rating(
    State(state): State<AppState>,
    payload: Result<Json<Rating>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(rating) = payload?;
    if !rating.value.is_finite() {
        return Err(ApiError::BadRequest(
            "rating value must be a finite number".to_string(),
        ));
    }

    state.supervisor.add_rating(rating).await?;
    Ok(created())
}

/// POST /api/v1/retrain
pub async fn retrain(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<Value>)> {
    state.supervisor.retrain()?;
    info!("Retrain requested over HTTP");
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

/// GET /api/v1/recommendations/:user_id?count=N
pub async fn recommendations(
    State(state): State<AppState>,
    user_id: Result<Path<UserId>, PathRejection>,
    query: Result<Query<RecommendationQuery>, QueryRejection>,
) -> ApiResult<Json<RecommendationResult>> {
    let Path(user_id) = user_id?;
    let Query(query) = query?;
    let request =
        RecommendationRequest::new(user_id, query.count.unwrap_or(state.default_count))?;
    let result = state.dispatcher.recommend(request).await?;
    Ok(Json(result))
}

fn created() -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "status": "ok" })))
}
