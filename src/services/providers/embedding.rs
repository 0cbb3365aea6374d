/// Sentence-embedding server client
///
/// Talks to a text-embeddings-inference style server hosting the same model the
/// catalog was embedded with (all-mpnet-base-v2 in the reference deployment).
/// `POST /embed {"inputs": "..."}` answers with one vector per input.
use reqwest::Client as HttpClient;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::Embedding,
    services::{providers::TextEncoder, vectors},
};

#[derive(Clone)]
pub struct HttpTextEncoder {
    http_client: HttpClient,
    api_url: String,
    dimension: usize,
}

impl HttpTextEncoder {
    pub fn new(api_url: String, dimension: usize) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            dimension,
        }
    }

    fn check_embedding(&self, embedding: Embedding) -> AppResult<Embedding> {
        if embedding.len() != self.dimension {
            return Err(AppError::Encoder(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        if !vectors::is_finite(&embedding) {
            return Err(AppError::Encoder(
                "Embedding contains non-finite values".to_string(),
            ));
        }
        Ok(embedding)
    }
}

#[async_trait::async_trait]
impl TextEncoder for HttpTextEncoder {
    async fn encode(&self, text: &str) -> AppResult<Embedding> {
        let url = format!("{}/embed", self.api_url);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| AppError::Encoder(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Encoder(format!(
                "Embedding server returned status {}: {}",
                status, body
            )));
        }

        let embeddings: Vec<Embedding> = response
            .json()
            .await
            .map_err(|e| AppError::Encoder(format!("Malformed embedding response: {}", e)))?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Encoder("Embedding server returned no vectors".to_string()))?;

        tracing::debug!(chars = text.len(), "Prompt encoded");

        self.check_embedding(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_embedding_accepts_matching_dimension() {
        let encoder = HttpTextEncoder::new("http://test.local/".to_string(), 3);
        assert_eq!(encoder.api_url, "http://test.local");
        assert!(encoder.check_embedding(vec![0.1, 0.2, 0.3]).is_ok());
    }

    #[test]
    fn test_check_embedding_rejects_wrong_dimension() {
        let encoder = HttpTextEncoder::new("http://test.local".to_string(), 3);
        let result = encoder.check_embedding(vec![0.1, 0.2]);
        assert!(matches!(result, Err(AppError::Encoder(_))));
    }

    #[test]
    fn test_check_embedding_rejects_nan() {
        let encoder = HttpTextEncoder::new("http://test.local".to_string(), 2);
        let result = encoder.check_embedding(vec![0.1, f32::NAN]);
        assert!(matches!(result, Err(AppError::Encoder(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_encoder_error() {
        let encoder = HttpTextEncoder::new("http://127.0.0.1:9".to_string(), 3);
        let result = encoder.encode("anything").await;
        assert!(matches!(result, Err(AppError::Encoder(_))));
    }
}
