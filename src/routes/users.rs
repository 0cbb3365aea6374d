use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{
        CreateProfileRequest, LikelihoodRequest, LikelihoodResult, ProfileResponse,
        SurveyResponse, SurveySubmission,
    },
    routes::AppState,
};

/// Registers a profile that has not taken the survey yet
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<ProfileResponse>)> {
    tracing::info!(request_id = %request_id, "Creating profile");

    let profile = state.recommender.create_profile(&request.username).await?;
    Ok((StatusCode::CREATED, Json(ProfileResponse::from(&profile))))
}

/// Computes the user's taste vector from a completed survey
pub async fn submit_survey(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SurveySubmission>,
) -> AppResult<Json<SurveyResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        selected = request.movie_ids.len(),
        "Processing survey submission"
    );

    state
        .recommender
        .submit_survey(user_id, &request.movie_ids)
        .await?;

    Ok(Json(SurveyResponse {
        message: "Survey completed successfully".to_string(),
        embedding_computed: true,
    }))
}

/// Would this user like the named movie?
pub async fn check_likelihood(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<LikelihoodRequest>,
) -> AppResult<Json<LikelihoodResult>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        movie_title = %request.movie_title,
        "Processing likelihood check"
    );

    let result = state
        .recommender
        .check_likelihood(user_id, &request.movie_title)
        .await?;

    Ok(Json(result))
}
