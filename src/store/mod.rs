/// Catalog store abstraction
///
/// The vector database holds two collections: movies (embedding + metadata
/// payload) and users (taste vector + profile payload). Everything the
/// recommendation pipeline needs from it goes through [`CatalogStore`].
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Embedding, MovieRecord, ScoredMovie, UserProfile},
    services::filters::MovieFilter,
};

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryCatalog;
pub use qdrant::QdrantStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Point lookup of a movie by its external identifier, vector included
    async fn get_movie(&self, movie_id: &str) -> AppResult<Option<MovieRecord>>;

    /// Movie payloads in storage order, without vectors
    async fn scroll_movies(&self, limit: usize) -> AppResult<Vec<MovieRecord>>;

    /// Nearest-neighbour search, hits ranked by descending similarity
    async fn search(
        &self,
        query: &[f32],
        filter: Option<MovieFilter>,
        limit: usize,
    ) -> AppResult<Vec<ScoredMovie>>;

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<UserProfile>>;

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserProfile>>;

    /// Inserts or overwrites a user profile, taste vector included
    async fn upsert_user(&self, profile: &UserProfile) -> AppResult<()>;

    /// The stored embedding of a movie, if both the movie and its vector exist
    async fn get_vector(&self, movie_id: &str) -> AppResult<Option<Embedding>> {
        Ok(self.get_movie(movie_id).await?.and_then(|m| m.vector))
    }

    /// Case-insensitive partial title match over the whole catalog
    async fn find_by_title_substring(&self, text: &str) -> AppResult<Option<MovieRecord>> {
        let movies = self.scroll_movies(usize::MAX).await?;
        Ok(best_title_match(movies, text))
    }
}

/// Picks one movie whose title contains `text`, ignoring case
///
/// An exact title match wins; otherwise the shortest containing title, then the
/// lowest movie id.
pub fn best_title_match(movies: Vec<MovieRecord>, text: &str) -> Option<MovieRecord> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    movies
        .into_iter()
        .filter_map(|movie| {
            let title = movie.title.to_lowercase();
            title.contains(&needle).then(|| {
                let exact = title == needle;
                ((!exact, title.chars().count()), movie)
            })
        })
        .min_by(|(a_key, a), (b_key, b)| {
            a_key
                .cmp(b_key)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        })
        .map(|(_, movie)| movie)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: &str, title: &str) -> MovieRecord {
        MovieRecord {
            movie_id: id.to_string(),
            title: title.to_string(),
            genre: vec![],
            rating: None,
            release_date: None,
            runtime_min: None,
            vector: None,
        }
    }

    #[test]
    fn test_exact_title_beats_partial() {
        let movies = vec![
            movie("1", "Alien Resurrection"),
            movie("2", "Aliens"),
            movie("3", "Alien"),
        ];
        let found = best_title_match(movies, "ALIEN").unwrap();
        assert_eq!(found.movie_id, "3");
    }

    #[test]
    fn test_shortest_partial_then_lowest_id() {
        let movies = vec![
            movie("9", "The Godfather Part II"),
            movie("5", "Godfather X"),
            movie("4", "Godfather Y"),
        ];
        let found = best_title_match(movies, "godfather").unwrap();
        assert_eq!(found.movie_id, "4");
    }

    #[test]
    fn test_no_match() {
        let movies = vec![movie("1", "Heat")];
        assert!(best_title_match(movies, "Ronin").is_none());
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let movies = vec![movie("1", "Heat")];
        assert!(best_title_match(movies, "  ").is_none());
    }
}
