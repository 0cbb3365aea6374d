use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{error::AppResult, models::SurveyMovie, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct SurveyQuery {
    /// Comma-separated ids already shown to the user
    #[serde(default)]
    exclude: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SurveyMoviesResponse {
    pub movies: Vec<SurveyMovie>,
}

/// Handler for the next round of survey candidates
pub async fn candidates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SurveyQuery>,
) -> AppResult<Json<SurveyMoviesResponse>> {
    let exclude: Vec<String> = params
        .exclude
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let movies = state.recommender.survey_candidates(&exclude).await?;
    Ok(Json(SurveyMoviesResponse { movies }))
}
