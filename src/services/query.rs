use std::ops::Range;

use crate::{
    error::{AppError, AppResult},
    models::{Embedding, MovieRecord},
    services::{providers::TextEncoder, vectors},
    store::CatalogStore,
};

/// The vector a recommendation search runs with
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub vector: Embedding,
    /// Catalog movie detected in the prompt, if any
    pub mentioned_movie_id: Option<String>,
}

/// Byte range of the first case-insensitive occurrence of `needle`
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<Range<usize>> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    'start: for (start, _) in haystack.char_indices() {
        let mut expected = needle.iter().peekable();
        for (offset, c) in haystack[start..].char_indices() {
            for lower in c.to_lowercase() {
                match expected.next() {
                    Some(e) if *e == lower => {}
                    _ => continue 'start,
                }
            }
            if expected.peek().is_none() {
                return Some(start..start + offset + c.len_utf8());
            }
        }
    }

    None
}

/// Finds the catalog movie whose title appears in the prompt
///
/// When several titles appear the longest wins, then the lowest movie id, so
/// "The Dark Knight Rises" is preferred over "The Dark Knight".
pub fn detect_mentioned_movie(
    movies: Vec<MovieRecord>,
    prompt: &str,
) -> Option<(MovieRecord, Range<usize>)> {
    movies
        .into_iter()
        .filter(|movie| !movie.title.trim().is_empty())
        .filter_map(|movie| {
            let span = find_case_insensitive(prompt, movie.title.trim())?;
            Some((movie, span))
        })
        .max_by(|(a, _), (b, _)| {
            let a_len = a.title.trim().chars().count();
            let b_len = b.title.trim().chars().count();
            a_len
                .cmp(&b_len)
                .then_with(|| b.movie_id.cmp(&a.movie_id))
        })
}

/// Prompt text left over once the mentioned title is cut out
fn remaining_text(prompt: &str, span: Range<usize>) -> String {
    let mut rest = String::with_capacity(prompt.len());
    rest.push_str(&prompt[..span.start]);
    rest.push_str(&prompt[span.end..]);
    rest.trim().to_string()
}

/// Query Composer: builds the search vector for a free-text prompt
///
/// A prompt that names a catalog movie is anchored on that movie's stored
/// vector. Any other text in the prompt is encoded and blended in with
/// `movie_weight` going to the movie. A prompt naming no movie is encoded as is.
pub async fn compose_query(
    store: &dyn CatalogStore,
    encoder: &dyn TextEncoder,
    prompt: &str,
    movie_weight: f32,
) -> AppResult<ComposedQuery> {
    let movies = store.scroll_movies(usize::MAX).await?;

    if let Some((movie, span)) = detect_mentioned_movie(movies, prompt) {
        match store.get_vector(&movie.movie_id).await? {
            Some(movie_vector) => {
                let rest = remaining_text(prompt, span);
                tracing::info!(
                    movie_id = %movie.movie_id,
                    title = %movie.title,
                    blended = !rest.is_empty(),
                    "Prompt mentions a catalog movie"
                );

                let vector = if rest.is_empty() {
                    movie_vector
                } else {
                    let text_vector = encoder.encode(&rest).await?;
                    if text_vector.len() != movie_vector.len() {
                        return Err(AppError::Internal(format!(
                            "Prompt embedding has dimension {} but movie vectors have {}",
                            text_vector.len(),
                            movie_vector.len()
                        )));
                    }
                    vectors::weighted_blend(&movie_vector, &text_vector, movie_weight)
                };

                return Ok(ComposedQuery {
                    vector,
                    mentioned_movie_id: Some(movie.movie_id),
                });
            }
            None => {
                tracing::warn!(
                    movie_id = %movie.movie_id,
                    "Mentioned movie has no stored vector, encoding the whole prompt"
                );
            }
        }
    }

    Ok(ComposedQuery {
        vector: encoder.encode(prompt).await?,
        mentioned_movie_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockTextEncoder;
    use crate::store::InMemoryCatalog;
    use mockall::predicate::eq;

    fn movie(id: &str, title: &str, vector: Option<Vec<f32>>) -> MovieRecord {
        MovieRecord {
            movie_id: id.to_string(),
            title: title.to_string(),
            genre: vec![],
            rating: None,
            release_date: None,
            runtime_min: None,
            vector,
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            movie("tt1375666", "Inception", Some(vec![0.6, 0.8, 0.0])),
            movie("tt0468569", "The Dark Knight", Some(vec![1.0, 0.0, 0.0])),
            movie("tt1345836", "The Dark Knight Rises", Some(vec![0.0, 1.0, 0.0])),
            movie("tt0000000", "Lost Film", None),
        ])
    }

    #[test]
    fn test_find_case_insensitive() {
        assert_eq!(find_case_insensitive("I loved INCEPTION!", "inception"), Some(8..17));
        assert_eq!(find_case_insensitive("nothing here", "inception"), None);
        assert_eq!(find_case_insensitive("anything", ""), None);
    }

    #[test]
    fn test_find_case_insensitive_multibyte() {
        let haystack = "Like AMÉLIE but darker";
        let span = find_case_insensitive(haystack, "amélie").unwrap();
        assert_eq!(&haystack[span], "AMÉLIE");
    }

    #[test]
    fn test_longest_title_wins() {
        let movies = vec![
            movie("1", "The Dark Knight", None),
            movie("2", "The Dark Knight Rises", None),
        ];
        let (found, _) =
            detect_mentioned_movie(movies, "something like the dark knight rises").unwrap();
        assert_eq!(found.movie_id, "2");
    }

    #[test]
    fn test_equal_length_titles_tie_break_on_id() {
        let movies = vec![movie("b", "Heat", None), movie("a", "heat", None)];
        let (found, _) = detect_mentioned_movie(movies, "heat").unwrap();
        assert_eq!(found.movie_id, "a");
    }

    #[test]
    fn test_remaining_text_cuts_first_occurrence() {
        let prompt = "Inception but funnier, not inception";
        let span = find_case_insensitive(prompt, "inception").unwrap();
        assert_eq!(remaining_text(prompt, span), "but funnier, not inception");
    }

    #[tokio::test]
    async fn test_title_only_prompt_uses_stored_vector_unmodified() {
        let store = catalog();
        let mut encoder = MockTextEncoder::new();
        encoder.expect_encode().never();

        let query = compose_query(&store, &encoder, "  inception ", 0.7)
            .await
            .unwrap();

        assert_eq!(query.vector, vec![0.6, 0.8, 0.0]);
        assert_eq!(query.mentioned_movie_id.as_deref(), Some("tt1375666"));
    }

    #[tokio::test]
    async fn test_title_with_extra_text_is_blended() {
        let store = catalog();
        let mut encoder = MockTextEncoder::new();
        encoder
            .expect_encode()
            .with(eq("but set underwater"))
            .times(1)
            .returning(|_| Ok(vec![0.0, 0.0, 1.0]));

        let query = compose_query(&store, &encoder, "The Dark Knight but set underwater", 0.7)
            .await
            .unwrap();

        assert_eq!(query.mentioned_movie_id.as_deref(), Some("tt0468569"));
        let norm = (0.7f32 * 0.7 + 0.3 * 0.3).sqrt();
        assert!((query.vector[0] - 0.7 / norm).abs() < 1e-6);
        assert!(query.vector[1].abs() < 1e-6);
        assert!((query.vector[2] - 0.3 / norm).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_no_mention_encodes_whole_prompt() {
        let store = catalog();
        let mut encoder = MockTextEncoder::new();
        encoder
            .expect_encode()
            .with(eq("a cosy autumn mystery"))
            .times(1)
            .returning(|_| Ok(vec![2.0, 0.0, 0.0]));

        let query = compose_query(&store, &encoder, "a cosy autumn mystery", 0.7)
            .await
            .unwrap();

        // no normalization in this branch
        assert_eq!(query.vector, vec![2.0, 0.0, 0.0]);
        assert!(query.mentioned_movie_id.is_none());
    }

    #[tokio::test]
    async fn test_mention_without_vector_falls_back_to_text() {
        let store = catalog();
        let mut encoder = MockTextEncoder::new();
        encoder
            .expect_encode()
            .with(eq("lost film"))
            .times(1)
            .returning(|_| Ok(vec![0.0, 0.0, 1.0]));

        let query = compose_query(&store, &encoder, "lost film", 0.7).await.unwrap();
        assert!(query.mentioned_movie_id.is_none());
    }

    #[tokio::test]
    async fn test_encoder_failure_propagates() {
        let store = catalog();
        let mut encoder = MockTextEncoder::new();
        encoder
            .expect_encode()
            .returning(|_| Err(AppError::Encoder("unreachable".to_string())));

        let result = compose_query(&store, &encoder, "anything at all", 0.7).await;
        assert!(matches!(result, Err(AppError::Encoder(_))));
    }
}
