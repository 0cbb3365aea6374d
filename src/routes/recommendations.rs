use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{RecommendationQuery, RecommendationResponse},
    routes::AppState,
};

/// Handler for prompt-driven recommendations
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        min_rating = ?request.min_rating,
        genre = ?request.genre,
        "Processing recommendation request"
    );

    let recommendations = state.recommender.recommend(&request).await?;

    tracing::info!(
        request_id = %request_id,
        count = recommendations.len(),
        "Recommendations ready"
    );

    Ok(Json(RecommendationResponse { recommendations }))
}
