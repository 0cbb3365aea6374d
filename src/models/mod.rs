use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Dense embedding shared by movies, user profiles and encoded prompts
pub type Embedding = Vec<f32>;

// ============================================================================
// Catalog Types
// ============================================================================

/// A movie as stored in the catalog collection
///
/// The payload fields come from the offline ingestion job, which is loose about
/// types (years as strings, genres as comma lists), so deserialization is lenient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieRecord {
    pub movie_id: String,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_genres")]
    pub genre: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub rating: Option<f64>,
    /// Release year
    #[serde(default, deserialize_with = "lenient_year")]
    pub release_date: Option<i32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub runtime_min: Option<f64>,
    /// Only populated when the store was asked to return vectors
    #[serde(skip)]
    pub vector: Option<Embedding>,
}

impl MovieRecord {
    pub fn info(&self) -> MovieInfo {
        MovieInfo {
            genre: self.genre.clone(),
            rating: self.rating,
            release_date: self.release_date,
            runtime_min: self.runtime_min,
        }
    }

    /// Case-insensitive substring match on any genre entry
    pub fn has_genre(&self, genre: &str) -> bool {
        let needle = genre.to_lowercase();
        self.genre.iter().any(|g| g.to_lowercase().contains(&needle))
    }
}

/// Metadata snapshot returned alongside scores
///
/// Missing values are rendered as `"N/A"`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieInfo {
    #[serde(serialize_with = "genres_or_na")]
    pub genre: Vec<String>,
    #[serde(serialize_with = "or_na")]
    pub rating: Option<f64>,
    #[serde(serialize_with = "or_na")]
    pub release_date: Option<i32>,
    #[serde(serialize_with = "or_na")]
    pub runtime_min: Option<f64>,
}

/// A movie offered during the preference survey
#[derive(Debug, Clone, Serialize)]
pub struct SurveyMovie {
    pub movie_id: String,
    pub title: String,
    #[serde(flatten)]
    pub info: MovieInfo,
}

impl From<&MovieRecord> for SurveyMovie {
    fn from(movie: &MovieRecord) -> Self {
        Self {
            movie_id: movie.movie_id.clone(),
            title: movie.title.clone(),
            info: movie.info(),
        }
    }
}

/// A nearest-neighbour hit from the catalog, score as reported by the store
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMovie {
    pub score: f32,
    pub movie: MovieRecord,
}

// ============================================================================
// User Types
// ============================================================================

/// A registered user and their taste vector
///
/// The vector is the all-zero sentinel until a survey has been completed.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub taste_vector: Embedding,
}

impl UserProfile {
    pub fn new(username: String, dimension: usize) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username,
            taste_vector: vec![0.0; dimension],
        }
    }

    /// Whether the survey has been completed
    pub fn has_taste_vector(&self) -> bool {
        !crate::services::vectors::is_zero(&self.taste_vector)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub username: String,
}

impl From<&UserProfile> for ProfileResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SurveySubmission {
    pub movie_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SurveyResponse {
    pub message: String,
    pub embedding_computed: bool,
}

// ============================================================================
// Recommendation Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LikelihoodRequest {
    pub movie_title: String,
}

/// Result of checking how likely a user is to enjoy a given movie
#[derive(Debug, Clone, Serialize)]
pub struct LikelihoodResult {
    pub movie_id: String,
    pub movie_title: String,
    /// Score in [0, 100]
    pub likelihood: f64,
    pub movie_info: MovieInfo,
}

/// Lower bound on release date, either a bare year or a calendar date
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReleaseDateBound {
    Year(i32),
    Text(String),
}

/// Free-text prompt plus optional metadata constraints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationQuery {
    #[serde(default)]
    pub prompt: String,
    /// Kept as sent; a number or numeric string, checked when the filter is built
    #[serde(default)]
    pub min_rating: Option<Value>,
    #[serde(default)]
    pub min_release_date: Option<ReleaseDateBound>,
    #[serde(default)]
    pub genre: Option<String>,
}

impl RecommendationQuery {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResult {
    pub movie_id: String,
    pub movie_title: String,
    /// Score in [0, 100]
    pub similarity_score: f64,
    pub explanation: String,
    pub movie_info: MovieInfo,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendationResult>,
}

// ============================================================================
// Serde helpers
// ============================================================================

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let year = match value {
        Some(Value::String(s)) => s.trim().get(..4).and_then(|y| y.parse::<i32>().ok()),
        Some(other) => number_from_value(&other).map(|n| n as i32),
        None => None,
    };
    Ok(year)
}

fn lenient_genres<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let genres = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(genres)
}

fn or_na<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str("N/A"),
    }
}

fn genres_or_na<S>(genres: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if genres.is_empty() {
        serializer.serialize_str("N/A")
    } else {
        genres.serialize(serializer)
    }
}
