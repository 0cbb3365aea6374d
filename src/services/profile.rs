use std::collections::BTreeSet;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Embedding,
    services::vectors,
    store::CatalogStore,
};

/// Checks a survey selection and returns its ids sorted
///
/// A selection must hold exactly `survey_size` distinct, non-blank ids.
pub fn validate_selection(movie_ids: &[String], survey_size: usize) -> AppResult<Vec<String>> {
    let distinct: BTreeSet<&str> = movie_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();

    if movie_ids.len() != survey_size || distinct.len() != survey_size {
        return Err(AppError::InvalidInput(format!(
            "Please select exactly {} different movies",
            survey_size
        )));
    }

    Ok(distinct.into_iter().map(str::to_string).collect())
}

/// Derives a taste vector from the selected movies
///
/// Unknown ids and movies without a usable vector are skipped. The mean of the
/// resolved vectors is normalized to unit length; when nothing resolves the
/// all-zero sentinel is returned. Vectors are averaged in id order so the result
/// does not depend on the order of `movie_ids`.
pub async fn compute_taste_vector(
    store: &dyn CatalogStore,
    dimension: usize,
    movie_ids: &[String],
) -> AppResult<Embedding> {
    let ids: BTreeSet<&str> = movie_ids.iter().map(String::as_str).collect();
    let mut resolved: Vec<Embedding> = Vec::with_capacity(ids.len());

    for movie_id in ids {
        match store.get_vector(movie_id).await? {
            Some(v) if v.len() == dimension && vectors::is_finite(&v) => resolved.push(v),
            Some(v) => {
                tracing::warn!(
                    movie_id = %movie_id,
                    dimension = v.len(),
                    "Skipping movie with unusable vector"
                );
            }
            None => tracing::debug!(movie_id = %movie_id, "Survey movie has no stored vector"),
        }
    }

    let Some(mut taste) = vectors::mean(resolved.iter().map(Vec::as_slice)) else {
        return Ok(vec![0.0; dimension]);
    };
    vectors::normalize(&mut taste);

    tracing::info!(resolved = resolved.len(), "Taste vector computed");

    Ok(taste)
}

/// Recomputes and persists a user's taste vector, overwriting any prior one
pub async fn build_profile(
    store: &dyn CatalogStore,
    dimension: usize,
    user_id: Uuid,
    movie_ids: &[String],
) -> AppResult<()> {
    let mut profile = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    profile.taste_vector = compute_taste_vector(store, dimension, movie_ids).await?;
    store.upsert_user(&profile).await?;

    tracing::info!(
        user_id = %user_id,
        has_taste_vector = profile.has_taste_vector(),
        "Profile updated"
    );

    Ok(())
}
