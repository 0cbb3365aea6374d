/// Remote model providers
///
/// The recommendation pipeline depends on two hosted models: a sentence
/// embedding model that turns prompts into vectors, and a generative language
/// model that writes explanations. Each sits behind a trait so the pipeline can
/// be exercised without network access.
use crate::{error::AppResult, models::Embedding};

pub mod embedding;
pub mod gemini;

pub use embedding::HttpTextEncoder;
pub use gemini::GeminiClient;

/// Turns free text into a fixed-dimension embedding
///
/// Implementations must be deterministic for identical input.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextEncoder: Send + Sync {
    async fn encode(&self, text: &str) -> AppResult<Embedding>;
}

/// Generates text from a single instruction prompt
///
/// Failures may be transient (timeouts, quota) or permanent (bad key).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Stand-in used when no language model is configured
///
/// Every call fails, so explanations always take the fallback path.
pub struct DisabledLanguageModel;

#[async_trait::async_trait]
impl LanguageModel for DisabledLanguageModel {
    async fn generate(&self, _prompt: &str) -> AppResult<String> {
        Err(crate::error::AppError::LanguageModel(
            "Language model is not configured".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
