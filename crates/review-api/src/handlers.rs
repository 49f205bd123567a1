//! # HTTP Handlers
//!
//! Review reads and writes. Writes invalidate cached reads for the
//! affected content once the store has accepted them.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use review_domain::{DeleteReview, MediaType, NewReview, Review};
use review_persistence::CacheHealth;

use crate::context::ApiContext;
use crate::error::ApiResult;
use crate::middleware::CacheStatsSnapshot;

/// Body of write responses.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub cache: CacheHealthBody,
}

#[derive(Debug, Serialize)]
pub struct CacheHealthBody {
    #[serde(flatten)]
    pub connection: CacheHealth,
    #[serde(flatten)]
    pub stats: CacheStatsSnapshot,
}

/// Liveness check
pub async fn test_endpoint() -> &'static str {
    "Review service is running"
}

/// Service and cache health. A cache outage reports `degraded`, never an error.
pub async fn health(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let connection = ctx.health.status();

    Json(HealthResponse {
        status: if connection.live { "ok" } else { "degraded" },
        service: "review-service",
        version: crate::VERSION,
        cache: CacheHealthBody {
            connection,
            stats: ctx.cache.stats().snapshot(),
        },
    })
}

#[instrument(skip(ctx))]
pub async fn get_content_reviews(
    State(ctx): State<ApiContext>,
    Path((media_type, content_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<Review>>> {
    let media_type: MediaType = media_type.parse()?;
    let reviews = ctx
        .reviews
        .find_by_content_and_type(media_type, &content_id)
        .await?;

    Ok(Json(reviews))
}

#[instrument(skip_all)]
pub async fn add_review(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(new_review) = payload?;
    new_review.validate()?;

    let review = new_review.into_review(Utc::now());
    ctx.reviews.insert(&review).await?;
    info!(
        review_id = %review.id,
        content_id = %review.content_id,
        media_type = %review.media_type,
        "Review added"
    );

    ctx.invalidation
        .invalidate_after_write(&review.content_id, Some(&review.user_id))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Review added",
        }),
    ))
}

#[instrument(skip_all)]
pub async fn delete_review(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DeleteReview>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    let removed = ctx
        .reviews
        .delete_one(&request.content_id, &request.user_id)
        .await?;
    info!(content_id = %request.content_id, removed, "Review delete processed");

    ctx.invalidation
        .invalidate_after_write(&request.content_id, Some(&request.user_id))
        .await;

    Ok(Json(MessageResponse {
        message: "Review deleted",
    }))
}
