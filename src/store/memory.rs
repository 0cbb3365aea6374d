use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{MovieRecord, ScoredMovie, UserProfile},
    services::{filters::MovieFilter, vectors},
    store::CatalogStore,
};

/// Catalog held in process memory
///
/// Movies keep insertion order, which stands in for the vector database's
/// storage order. Search is an exact cosine scan.
#[derive(Default)]
pub struct InMemoryCatalog {
    movies: RwLock<Vec<MovieRecord>>,
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryCatalog {
    pub fn new(movies: Vec<MovieRecord>) -> Self {
        Self {
            movies: RwLock::new(movies),
            users: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert_movie(&self, movie: MovieRecord) {
        let mut movies = self.movies.write().await;
        match movies.iter_mut().find(|m| m.movie_id == movie.movie_id) {
            Some(existing) => *existing = movie,
            None => movies.push(movie),
        }
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_movie(&self, movie_id: &str) -> AppResult<Option<MovieRecord>> {
        let movies = self.movies.read().await;
        Ok(movies.iter().find(|m| m.movie_id == movie_id).cloned())
    }

    async fn scroll_movies(&self, limit: usize) -> AppResult<Vec<MovieRecord>> {
        let movies = self.movies.read().await;
        Ok(movies
            .iter()
            .take(limit)
            .map(|m| MovieRecord {
                vector: None,
                ..m.clone()
            })
            .collect())
    }

    async fn search(
        &self,
        query: &[f32],
        filter: Option<MovieFilter>,
        limit: usize,
    ) -> AppResult<Vec<ScoredMovie>> {
        let movies = self.movies.read().await;

        let mut hits: Vec<ScoredMovie> = movies
            .iter()
            .filter(|m| filter.as_ref().map_or(true, |f| f.matches(m)))
            .filter_map(|m| {
                let vector = m.vector.as_ref()?;
                Some(ScoredMovie {
                    score: vectors::cosine_similarity(query, vector) as f32,
                    movie: MovieRecord {
                        vector: None,
                        ..m.clone()
                    },
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.movie.movie_id.cmp(&b.movie.movie_id))
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> AppResult<()> {
        self.users
            .write()
            .await
            .insert(profile.user_id, profile.clone());
        Ok(())
    }
}
