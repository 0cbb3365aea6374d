use std::{sync::Arc, time::Duration};

use tokio::{task::JoinSet, time::Instant};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::{providers::LanguageModel, synopsis::SynopsisTable},
};

/// Returned when the corpus has nothing to explain from
pub const NO_SYNOPSIS_EXPLANATION: &str =
    "This movie was recommended based on similarity to your preferences.";

/// Returned when the language model could not produce an explanation
pub fn fallback_explanation(movie_title: &str) -> String {
    format!(
        "{} was recommended based on its similarity to your preferences and the themes in your request.",
        movie_title
    )
}

#[derive(Debug, Clone)]
pub struct ExplanationSettings {
    /// Limit on a single language model call
    pub timeout: Duration,
    /// Limit on a whole batch of explanations
    pub deadline: Duration,
    pub max_retries: u32,
    /// First retry delay, doubled on each further attempt
    pub retry_backoff: Duration,
    pub max_synopsis_chars: usize,
}

impl From<&Config> for ExplanationSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.explanation_timeout(),
            deadline: config.explanation_deadline(),
            max_retries: config.explanation_max_retries,
            retry_backoff: config.explanation_retry_backoff(),
            max_synopsis_chars: config.max_synopsis_chars,
        }
    }
}

/// A movie to explain, in rank order
#[derive(Debug, Clone)]
pub struct ExplanationTarget {
    pub movie_id: String,
    pub movie_title: String,
}

/// Writes short natural-language justifications for recommended movies
///
/// Best effort: every path yields some text, so a failing language model never
/// fails the surrounding request.
#[derive(Clone)]
pub struct ExplanationGenerator {
    model: Arc<dyn LanguageModel>,
    synopses: Arc<SynopsisTable>,
    settings: ExplanationSettings,
}

impl ExplanationGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        synopses: Arc<SynopsisTable>,
        settings: ExplanationSettings,
    ) -> Self {
        Self {
            model,
            synopses,
            settings,
        }
    }

    /// Explains a single recommendation
    pub async fn explain(&self, movie_title: &str, movie_id: &str, user_prompt: &str) -> String {
        let Some(synopsis) = self.synopses.get_synopsis(movie_id) else {
            tracing::debug!(movie_id = %movie_id, "No synopsis, using generic explanation");
            return NO_SYNOPSIS_EXPLANATION.to_string();
        };

        let instruction = build_instruction(
            user_prompt,
            movie_title,
            synopsis,
            self.settings.max_synopsis_chars,
        );

        match self.generate_with_retry(&instruction).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    movie_id = %movie_id,
                    provider = self.model.name(),
                    error = %e,
                    "Explanation generation failed, using fallback"
                );
                fallback_explanation(movie_title)
            }
        }
    }

    /// Explains a ranked batch concurrently
    ///
    /// Output order matches `targets`. Items still running when the batch
    /// deadline passes get the fallback text. Dropping the returned future
    /// aborts every outstanding call.
    pub async fn explain_all(
        &self,
        targets: &[ExplanationTarget],
        user_prompt: &str,
    ) -> Vec<String> {
        let deadline = Instant::now() + self.settings.deadline;
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().cloned().enumerate() {
            let generator = self.clone();
            let user_prompt = user_prompt.to_string();
            tasks.spawn(async move {
                let explanation = tokio::time::timeout_at(
                    deadline,
                    generator.explain(&target.movie_title, &target.movie_id, &user_prompt),
                )
                .await
                .unwrap_or_else(|_| {
                    tracing::warn!(
                        movie_id = %target.movie_id,
                        "Explanation batch deadline exceeded"
                    );
                    fallback_explanation(&target.movie_title)
                });

                (index, explanation)
            });
        }

        let mut explanations: Vec<Option<String>> = vec![None; targets.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, text)) => explanations[index] = Some(text),
                Err(e) => tracing::error!(error = %e, "Explanation task join error"),
            }
        }

        targets
            .iter()
            .zip(explanations)
            .map(|(target, text)| text.unwrap_or_else(|| fallback_explanation(&target.movie_title)))
            .collect()
    }

    async fn generate_with_retry(&self, instruction: &str) -> AppResult<String> {
        let mut backoff = self.settings.retry_backoff;
        let mut attempt = 0;

        loop {
            let call = self.model.generate(instruction);
            let result = tokio::time::timeout(self.settings.timeout, call)
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::LanguageModel(format!(
                        "Timed out after {}ms",
                        self.settings.timeout.as_millis()
                    )))
                });

            match result {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "Retrying explanation");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// The instruction sent to the language model
///
/// The synopsis is cut to `max_synopsis_chars` characters, preferring a word boundary.
pub fn build_instruction(
    user_prompt: &str,
    movie_title: &str,
    synopsis: &str,
    max_synopsis_chars: usize,
) -> String {
    let synopsis = truncate_chars(synopsis.trim(), max_synopsis_chars);

    format!(
        "You are a movie recommendation assistant. Based on the following information, \
explain in 2-3 sentences why this movie was recommended to the user.

User's Request: {user_prompt}

Recommended Movie: {movie_title}

Movie Information:
{synopsis}

Provide a concise, engaging explanation that highlights how this movie matches the user's \
request. Focus on key themes, style, and atmosphere."
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        None => text,
        Some((cut, _)) => {
            let head = &text[..cut];
            match head.rfind(char::is_whitespace) {
                Some(space) if space > 0 => head[..space].trim_end(),
                _ => head,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockLanguageModel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowModel {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl LanguageModel for SlowModel {
        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            tokio::time::sleep(self.delay).await;
            Ok("too late".to_string())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn settings() -> ExplanationSettings {
        ExplanationSettings {
            timeout: Duration::from_millis(500),
            deadline: Duration::from_secs(2),
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            max_synopsis_chars: 4000,
        }
    }

    fn synopses() -> Arc<SynopsisTable> {
        Arc::new(SynopsisTable::from_iter([
            ("tt1".to_string(), "A dream heist.".to_string()),
            ("tt2".to_string(), "A bank heist.".to_string()),
        ]))
    }

    fn generator(
        model: impl LanguageModel + 'static,
        settings: ExplanationSettings,
    ) -> ExplanationGenerator {
        ExplanationGenerator::new(Arc::new(model), synopses(), settings)
    }

    #[tokio::test]
    async fn test_missing_synopsis_skips_model() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().never();
        model.expect_name().return_const("mock");

        let explanation = generator(model, settings())
            .explain("Unknown", "tt404", "anything")
            .await;
        assert_eq!(explanation, NO_SYNOPSIS_EXPLANATION);
    }

    #[tokio::test]
    async fn test_model_text_is_returned() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .withf(|prompt: &str| prompt.contains("A dream heist.") && prompt.contains("Inception"))
            .times(1)
            .returning(|_| Ok("Because dreams.".to_string()));
        model.expect_name().return_const("mock");

        let explanation = generator(model, settings())
            .explain("Inception", "tt1", "mind-bending")
            .await;
        assert_eq!(explanation, "Because dreams.");
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_after_retries() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(3)
            .returning(|_| Err(AppError::LanguageModel("quota exceeded".to_string())));
        model.expect_name().return_const("mock");

        let explanation = generator(model, settings())
            .explain("Inception", "tt1", "mind-bending")
            .await;
        assert_eq!(
            explanation,
            "Inception was recommended based on its similarity to your preferences and the themes in your request."
        );
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let mut model = MockLanguageModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(AppError::LanguageModel("503".to_string())));
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Second time lucky.".to_string()));
        model.expect_name().return_const("mock");

        let explanation = generator(model, settings())
            .explain("Inception", "tt1", "mind-bending")
            .await;
        assert_eq!(explanation, "Second time lucky.");
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let settings = ExplanationSettings {
            timeout: Duration::from_millis(20),
            max_retries: 0,
            ..settings()
        };
        let explanation = generator(SlowModel { delay: Duration::from_secs(5) }, settings)
            .explain("Heat", "tt2", "crime")
            .await;
        assert_eq!(explanation, fallback_explanation("Heat"));
    }

    #[tokio::test]
    async fn test_explain_all_preserves_order() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().returning(|prompt| {
            if prompt.contains("Recommended Movie: Inception") {
                Ok("first".to_string())
            } else {
                Ok("second".to_string())
            }
        });
        model.expect_name().return_const("mock");

        let targets = vec![
            ExplanationTarget {
                movie_id: "tt1".to_string(),
                movie_title: "Inception".to_string(),
            },
            ExplanationTarget {
                movie_id: "tt2".to_string(),
                movie_title: "Heat".to_string(),
            },
            ExplanationTarget {
                movie_id: "tt3".to_string(),
                movie_title: "Ronin".to_string(),
            },
        ];

        let explanations = generator(model, settings())
            .explain_all(&targets, "heists")
            .await;
        assert_eq!(
            explanations,
            vec!["first".to_string(), "second".to_string(), NO_SYNOPSIS_EXPLANATION.to_string()]
        );
    }

    #[tokio::test]
    async fn test_explain_all_deadline_falls_back() {
        let settings = ExplanationSettings {
            timeout: Duration::from_secs(10),
            deadline: Duration::from_millis(30),
            max_retries: 0,
            ..settings()
        };
        let targets = vec![ExplanationTarget {
            movie_id: "tt2".to_string(),
            movie_title: "Heat".to_string(),
        }];

        let explanations = generator(SlowModel { delay: Duration::from_secs(5) }, settings)
            .explain_all(&targets, "crime")
            .await;
        assert_eq!(explanations, vec![fallback_explanation("Heat")]);
    }

    struct CountingModel {
        delay: Duration,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl LanguageModel for CountingModel {
        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok("done".to_string())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_dropping_batch_cancels_calls() {
        let finished = Arc::new(AtomicUsize::new(0));
        let model = CountingModel {
            delay: Duration::from_millis(50),
            finished: finished.clone(),
        };
        let targets = vec![
            ExplanationTarget {
                movie_id: "tt1".to_string(),
                movie_title: "Inception".to_string(),
            },
            ExplanationTarget {
                movie_id: "tt2".to_string(),
                movie_title: "Heat".to_string(),
            },
        ];

        let explainer = generator(model, settings());
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            explainer.explain_all(&targets, "heists"),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_instruction_contents() {
        let instruction = build_instruction("something eerie", "The Others", "A haunted house.", 4000);
        assert!(instruction.contains("User's Request: something eerie"));
        assert!(instruction.contains("Recommended Movie: The Others"));
        assert!(instruction.contains("A haunted house."));
        assert!(instruction.contains("2-3 sentences"));
    }

    #[test]
    fn test_truncate_prefers_word_boundary() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("one two three", 9), "one two");
        assert_eq!(truncate_chars("abcdefgh", 4), "abcd");
    }
}
