use serde::Deserialize;
use std::{collections::HashMap, path::Path};

use crate::error::{AppError, AppResult};

/// One entry of the offline-built embedding corpus
#[derive(Debug, Deserialize)]
struct CorpusEntry {
    movie_id: String,
    #[serde(default)]
    text_for_embedding: String,
}

/// Static movie id → synopsis/review text table
///
/// Built once from the corpus the ingestion job embedded; used only to give the
/// language model something to explain from.
#[derive(Debug, Default, Clone)]
pub struct SynopsisTable {
    entries: HashMap<String, String>,
}

impl SynopsisTable {
    pub fn from_json(json: &str) -> AppResult<Self> {
        let corpus: Vec<CorpusEntry> = serde_json::from_str(json)
            .map_err(|e| AppError::Internal(format!("Malformed synopsis corpus: {}", e)))?;

        Ok(corpus
            .into_iter()
            .map(|entry| (entry.movie_id, entry.text_for_embedding))
            .collect())
    }

    /// Loads the corpus file, falling back to an empty table if it is missing
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "Synopsis corpus not found, explanations will use the fallback text"
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read synopsis corpus {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let table = Self::from_json(&json)?;
        tracing::info!(entries = table.len(), "Loaded synopsis corpus");
        Ok(table)
    }

    /// Synopsis text for a movie; blank entries count as missing
    pub fn get_synopsis(&self, movie_id: &str) -> Option<&str> {
        self.entries
            .get(movie_id)
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for SynopsisTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let table = SynopsisTable::from_json(
            r#"[
                {"movie_id": "tt1375666", "text_for_embedding": "Tagline: Your mind is the scene of the crime.", "metadata": {"title": "Inception"}},
                {"movie_id": "tt0000002", "text_for_embedding": "   "},
                {"movie_id": "tt0000003"}
            ]"#,
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.get_synopsis("tt1375666"),
            Some("Tagline: Your mind is the scene of the crime.")
        );
        assert_eq!(table.get_synopsis("tt0000002"), None);
        assert_eq!(table.get_synopsis("tt0000003"), None);
        assert_eq!(table.get_synopsis("missing"), None);
    }

    #[test]
    fn test_malformed_corpus() {
        assert!(SynopsisTable::from_json("{not json").is_err());
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let table = SynopsisTable::load("/definitely/not/here.json").unwrap();
        assert!(table.is_empty());
    }
}
