use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        LikelihoodResult, RecommendationQuery, RecommendationResult, SurveyMovie, UserProfile,
    },
    services::{
        explanation::{ExplanationGenerator, ExplanationTarget},
        filters, profile, providers::TextEncoder, query, vectors,
    },
    store::CatalogStore,
};

#[derive(Debug, Clone)]
pub struct RecommendationSettings {
    pub embedding_dim: usize,
    pub survey_size: usize,
    pub survey_round_size: usize,
    pub recommendation_limit: usize,
    pub movie_weight: f32,
}

impl From<&Config> for RecommendationSettings {
    fn from(config: &Config) -> Self {
        Self {
            embedding_dim: config.embedding_dim,
            survey_size: config.survey_size,
            survey_round_size: config.survey_round_size,
            recommendation_limit: config.recommendation_limit,
            movie_weight: config.movie_weight,
        }
    }
}

/// Recommendation orchestrator
///
/// Owns the shared clients and wires the matching pipeline together:
/// survey selections become taste vectors, taste vectors are scored against
/// single movies, and prompts are turned into ranked, explained recommendations.
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn CatalogStore>,
    encoder: Arc<dyn TextEncoder>,
    explainer: ExplanationGenerator,
    settings: RecommendationSettings,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        encoder: Arc<dyn TextEncoder>,
        explainer: ExplanationGenerator,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            store,
            encoder,
            explainer,
            settings,
        }
    }

    /// Registers a profile with the no-survey sentinel vector
    pub async fn create_profile(&self, username: &str) -> AppResult<UserProfile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidInput("Username is required".to_string()));
        }

        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(AppError::InvalidInput("Username already exists".to_string()));
        }

        let profile = UserProfile::new(username.to_string(), self.settings.embedding_dim);
        self.store.upsert_user(&profile).await?;

        tracing::info!(user_id = %profile.user_id, "Profile created");
        Ok(profile)
    }

    /// Movies to offer in the next survey round, skipping ones already shown
    pub async fn survey_candidates(&self, exclude_ids: &[String]) -> AppResult<Vec<SurveyMovie>> {
        let round = self.settings.survey_round_size;
        let movies = self
            .store
            .scroll_movies(round.saturating_add(exclude_ids.len()))
            .await?;

        Ok(movies
            .iter()
            .filter(|m| !exclude_ids.contains(&m.movie_id))
            .take(round)
            .map(SurveyMovie::from)
            .collect())
    }

    /// Validates a completed survey and rebuilds the user's taste vector
    pub async fn submit_survey(&self, user_id: Uuid, movie_ids: &[String]) -> AppResult<()> {
        let selection = profile::validate_selection(movie_ids, self.settings.survey_size)?;

        profile::build_profile(
            self.store.as_ref(),
            self.settings.embedding_dim,
            user_id,
            &selection,
        )
        .await
    }

    /// How likely the user is to enjoy the movie best matching `movie_title`
    pub async fn check_likelihood(
        &self,
        user_id: Uuid,
        movie_title: &str,
    ) -> AppResult<LikelihoodResult> {
        let movie_title = movie_title.trim();
        if movie_title.is_empty() {
            return Err(AppError::InvalidInput("Movie title is required".to_string()));
        }

        // Start: the caller must have completed the survey
        let taste_vector = match self.store.get_user(user_id).await? {
            Some(profile) if profile.has_taste_vector() => profile.taste_vector,
            _ => {
                tracing::info!(user_id = %user_id, "Likelihood check without a taste vector");
                return Err(AppError::NoProfile);
            }
        };

        // Resolved: title search carries no vectors, so re-fetch by id
        let matched = self
            .store
            .find_by_title_substring(movie_title)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Movie '{}' not found in database", movie_title))
            })?;

        let movie = self
            .store
            .get_movie(&matched.movie_id)
            .await?
            .filter(|m| m.vector.is_some())
            .ok_or_else(|| {
                AppError::NotFound(format!("Movie '{}' data is incomplete", matched.title))
            })?;

        let movie_vector = movie.vector.as_deref().unwrap_or_default();
        let likelihood = vectors::score(&taste_vector, movie_vector);

        tracing::info!(
            user_id = %user_id,
            movie_id = %movie.movie_id,
            likelihood,
            "Likelihood computed"
        );

        Ok(LikelihoodResult {
            movie_id: movie.movie_id.clone(),
            movie_title: movie.title.clone(),
            likelihood,
            movie_info: movie.info(),
        })
    }

    /// Ranked, explained recommendations for a free-text prompt
    ///
    /// Results keep the catalog's descending-similarity order.
    pub async fn recommend(
        &self,
        request: &RecommendationQuery,
    ) -> AppResult<Vec<RecommendationResult>> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::InvalidInput("Prompt is required".to_string()));
        }
        let filter = filters::build_filter(request)?;

        let composed = query::compose_query(
            self.store.as_ref(),
            self.encoder.as_ref(),
            prompt,
            self.settings.movie_weight,
        )
        .await?;

        let hits = self
            .store
            .search(&composed.vector, filter, self.settings.recommendation_limit)
            .await?;

        tracing::info!(
            hits = hits.len(),
            mentioned_movie = ?composed.mentioned_movie_id,
            "Catalog search completed"
        );

        let targets: Vec<ExplanationTarget> = hits
            .iter()
            .map(|hit| ExplanationTarget {
                movie_id: hit.movie.movie_id.clone(),
                movie_title: hit.movie.title.clone(),
            })
            .collect();
        let explanations = self.explainer.explain_all(&targets, prompt).await;

        Ok(hits
            .into_iter()
            .zip(explanations)
            .map(|(hit, explanation)| RecommendationResult {
                movie_id: hit.movie.movie_id.clone(),
                movie_title: hit.movie.title.clone(),
                similarity_score: vectors::similarity_to_score(hit.score as f64),
                explanation,
                movie_info: hit.movie.info(),
            })
            .collect())
    }
}
