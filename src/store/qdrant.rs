/// Qdrant catalog store, spoken to over the REST API
///
/// Movies live in the collection written by the offline ingestion job: integer
/// point ids with the external `movie_id` in the payload. Users are keyed by
/// their UUID directly.
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Embedding, MovieRecord, ScoredMovie, UserProfile},
    services::filters::{FilterCondition, MovieFilter},
    store::CatalogStore,
};

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScrollPage {
    points: Vec<Point>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Point {
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    vector: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    username: String,
}

#[derive(Clone)]
pub struct QdrantStore {
    http_client: HttpClient,
    api_url: String,
    api_key: Option<String>,
    movies_collection: String,
    users_collection: String,
    page_size: usize,
}

impl QdrantStore {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        movies_collection: String,
        users_collection: String,
        page_size: usize,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            movies_collection,
            users_collection,
            page_size: page_size.max(1),
        }
    }

    /// Creates the users collection if it does not exist yet
    ///
    /// The movies collection is owned by the ingestion job and never created here.
    pub async fn ensure_users_collection(&self, dimension: usize) -> AppResult<()> {
        let url = format!("{}/collections/{}/exists", self.api_url, self.users_collection);
        let exists: ExistsResult = self.send(self.http_client.get(&url)).await?;

        if exists.exists {
            return Ok(());
        }

        let url = format!("{}/collections/{}", self.api_url, self.users_collection);
        let _: Value = self
            .send(self.http_client.put(&url).json(&json!({
                "vectors": { "size": dimension, "distance": "Cosine" }
            })))
            .await?;

        tracing::info!(
            collection = %self.users_collection,
            dimension,
            "Created users collection"
        );

        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let request = match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!(
                "Qdrant returned status {}: {}",
                status, body
            )));
        }

        let envelope: QdrantResponse<T> = response.json().await?;
        Ok(envelope.result)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<Value>,
        limit: usize,
        with_vector: bool,
    ) -> AppResult<Vec<Point>> {
        let url = format!("{}/collections/{}/points/scroll", self.api_url, collection);
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;

        while points.len() < limit {
            let page_limit = (limit - points.len()).min(self.page_size);
            let mut body = json!({
                "limit": page_limit,
                "with_payload": true,
                "with_vector": with_vector,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let page: ScrollPage = self.send(self.http_client.post(&url).json(&body)).await?;
            points.extend(page.points);

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }
}

#[async_trait::async_trait]
impl CatalogStore for QdrantStore {
    async fn get_movie(&self, movie_id: &str) -> AppResult<Option<MovieRecord>> {
        let filter = match_value("movie_id", movie_id);
        let points = self
            .scroll(&self.movies_collection, Some(filter), 1, true)
            .await?;

        points
            .into_iter()
            .next()
            .map(|point| movie_from_point(point.payload, point.vector))
            .transpose()
    }

    async fn scroll_movies(&self, limit: usize) -> AppResult<Vec<MovieRecord>> {
        let points = self
            .scroll(&self.movies_collection, None, limit, false)
            .await?;

        Ok(points
            .into_iter()
            .filter_map(|point| well_formed_movie(point.payload))
            .collect())
    }

    async fn search(
        &self,
        query: &[f32],
        filter: Option<MovieFilter>,
        limit: usize,
    ) -> AppResult<Vec<ScoredMovie>> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.api_url, self.movies_collection
        );
        let mut body = json!({
            "vector": query,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = &filter {
            body["filter"] = filter_to_qdrant(filter);
        }

        let hits: Vec<ScoredPoint> = self.send(self.http_client.post(&url).json(&body)).await?;

        tracing::debug!(
            hits = hits.len(),
            filtered = filter.is_some(),
            "Catalog search completed"
        );

        Ok(scored_movies(hits))
    }

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        let url = format!(
            "{}/collections/{}/points",
            self.api_url, self.users_collection
        );
        let points: Vec<Point> = self
            .send(self.http_client.post(&url).json(&json!({
                "ids": [user_id],
                "with_payload": true,
                "with_vector": true,
            })))
            .await?;

        points
            .into_iter()
            .next()
            .map(|point| user_from_point(user_id, point))
            .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        let filter = match_value("username", username);
        let points = self
            .scroll(&self.users_collection, Some(filter), 1, true)
            .await?;

        let Some(point) = points.into_iter().next() else {
            return Ok(None);
        };

        let user_id = point
            .payload
            .as_ref()
            .and_then(|p| p.get("user_id"))
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| AppError::VectorStore("User payload missing user_id".to_string()))?;

        user_from_point(user_id, point).map(Some)
    }

    async fn upsert_user(&self, profile: &UserProfile) -> AppResult<()> {
        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.api_url, self.users_collection
        );
        let _: Value = self
            .send(self.http_client.put(&url).json(&json!({
                "points": [{
                    "id": profile.user_id,
                    "vector": profile.taste_vector,
                    "payload": {
                        "user_id": profile.user_id,
                        "username": profile.username,
                    }
                }]
            })))
            .await?;

        tracing::debug!(user_id = %profile.user_id, "User profile upserted");
        Ok(())
    }
}

fn match_value(key: &str, value: &str) -> Value {
    json!({ "must": [{ "key": key, "match": { "value": value } }] })
}

/// Translates a filter into Qdrant's `must` clause syntax
fn filter_to_qdrant(filter: &MovieFilter) -> Value {
    let must: Vec<Value> = filter
        .must
        .iter()
        .map(|condition| match condition {
            FilterCondition::MinRating(min) => json!({ "key": "rating", "range": { "gte": min } }),
            FilterCondition::ReleasedFrom(year) => {
                json!({ "key": "release_date", "range": { "gte": year } })
            }
            FilterCondition::Genre(genre) => {
                json!({ "key": "genre", "match": { "text": genre.to_lowercase() } })
            }
        })
        .collect();

    json!({ "must": must })
}

/// Accepts both an unnamed vector and a single-entry named vector map
fn vector_from_value(value: Option<Value>) -> Option<Embedding> {
    let value = match value? {
        Value::Object(map) => map.into_iter().next()?.1,
        other => other,
    };
    serde_json::from_value(value).ok()
}

fn movie_from_point(payload: Option<Value>, vector: Option<Value>) -> AppResult<MovieRecord> {
    let payload =
        payload.ok_or_else(|| AppError::VectorStore("Movie point has no payload".to_string()))?;

    let mut movie: MovieRecord = serde_json::from_value(payload)
        .map_err(|e| AppError::VectorStore(format!("Malformed movie payload: {}", e)))?;
    movie.vector = vector_from_value(vector);
    Ok(movie)
}

/// Payload-only movie, or `None` with a warning if the payload is unusable
fn well_formed_movie(payload: Option<Value>) -> Option<MovieRecord> {
    match movie_from_point(payload, None) {
        Ok(movie) => Some(movie),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping movie with malformed payload");
            None
        }
    }
}

/// Search hits in rank order, minus any with a malformed payload
fn scored_movies(hits: Vec<ScoredPoint>) -> Vec<ScoredMovie> {
    hits.into_iter()
        .filter_map(|hit| {
            let movie = well_formed_movie(hit.payload)?;
            Some(ScoredMovie {
                score: hit.score,
                movie,
            })
        })
        .collect()
}

fn user_from_point(user_id: Uuid, point: Point) -> AppResult<UserProfile> {
    let payload = point
        .payload
        .ok_or_else(|| AppError::VectorStore("User point has no payload".to_string()))?;
    let user: UserPayload = serde_json::from_value(payload)
        .map_err(|e| AppError::VectorStore(format!("Malformed user payload: {}", e)))?;

    Ok(UserProfile {
        user_id,
        username: user.username,
        taste_vector: vector_from_value(point.vector).unwrap_or_default(),
    })
}
