use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Qdrant REST endpoint
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Optional Qdrant API key, sent as the `api-key` header
    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_movies_collection")]
    pub movies_collection: String,

    #[serde(default = "default_users_collection")]
    pub users_collection: String,

    /// Base URL of the sentence-embedding server (exposes `POST /embed`)
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,

    /// Embedding dimension shared by movies, users and encoded prompts
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Gemini API key. Empty disables generated explanations.
    #[serde(default)]
    pub gemini_api_key: String,

    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Offline-built corpus holding synopsis and review text per movie
    #[serde(default = "default_movies_json_path")]
    pub movies_json_path: String,

    /// Number of movies a completed survey must contain
    #[serde(default = "default_survey_size")]
    pub survey_size: usize,

    /// Number of candidate movies offered per survey round
    #[serde(default = "default_survey_round_size")]
    pub survey_round_size: usize,

    /// Number of recommendations returned per prompt
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,

    /// Weight of a mentioned movie's vector when blended with prompt text
    #[serde(default = "default_movie_weight")]
    pub movie_weight: f32,

    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: usize,

    #[serde(default = "default_max_synopsis_chars")]
    pub max_synopsis_chars: usize,

    #[serde(default = "default_explanation_timeout_ms")]
    pub explanation_timeout_ms: u64,

    #[serde(default = "default_explanation_deadline_ms")]
    pub explanation_deadline_ms: u64,

    #[serde(default = "default_explanation_max_retries")]
    pub explanation_max_retries: u32,

    #[serde(default = "default_explanation_retry_backoff_ms")]
    pub explanation_retry_backoff_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_movies_collection() -> String {
    "movies".to_string()
}

fn default_users_collection() -> String {
    "users".to_string()
}

fn default_embedding_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_embedding_dim() -> usize {
    768 // all-mpnet-base-v2
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_movies_json_path() -> String {
    "data/movies_for_embedding.json".to_string()
}

fn default_survey_size() -> usize {
    10
}

fn default_survey_round_size() -> usize {
    3
}

fn default_recommendation_limit() -> usize {
    3
}

fn default_movie_weight() -> f32 {
    0.7
}

fn default_scroll_page_size() -> usize {
    256
}

fn default_max_synopsis_chars() -> usize {
    4000
}

fn default_explanation_timeout_ms() -> u64 {
    8_000
}

fn default_explanation_deadline_ms() -> u64 {
    15_000
}

fn default_explanation_max_retries() -> u32 {
    2
}

fn default_explanation_retry_backoff_ms() -> u64 {
    250
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.embedding_dim == 0 {
            anyhow::bail!("EMBEDDING_DIM must be positive");
        }
        if self.survey_size == 0 {
            anyhow::bail!("SURVEY_SIZE must be positive");
        }
        if !(0.0..=1.0).contains(&self.movie_weight) {
            anyhow::bail!("MOVIE_WEIGHT must be within [0, 1], got {}", self.movie_weight);
        }
        Ok(())
    }

    pub fn explanation_timeout(&self) -> Duration {
        Duration::from_millis(self.explanation_timeout_ms)
    }

    pub fn explanation_deadline(&self) -> Duration {
        Duration::from_millis(self.explanation_deadline_ms)
    }

    pub fn explanation_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.explanation_retry_backoff_ms)
    }
}
