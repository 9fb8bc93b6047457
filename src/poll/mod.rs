pub mod generator;

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::models::{Persona, PollQuestion, PollResponse};
use crate::prompt;

pub use generator::{GeneratorConfig, OpenAiCompatGenerator, ScriptedGenerator, TextGenerator};

/// Advisory only; aggregation never reads it.
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Successful responses plus the count of per-persona failures absorbed
/// along the way. Failures reduce the response set, never abort the poll.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub responses: Vec<PollResponse>,
    pub failures: usize,
}

/// Fans one prompt/response round trip per persona out to the generator in
/// sequential batches of `max_concurrent`, which bounds peak in-flight
/// requests exactly. A batch fully resolves (success or failure) before the
/// next one starts; that is the only ordering guarantee.
pub struct PollOrchestrator {
    generator: Arc<dyn TextGenerator>,
    max_concurrent: usize,
}

impl PollOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_concurrent: usize) -> Self {
        Self {
            generator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Poll every persona on one question. Cancellation is honored between
    /// batches: everything collected up to the last completed batch is
    /// still returned.
    pub async fn poll_all(
        &self,
        personas: &[Persona],
        question: &PollQuestion,
        context: &str,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        info!(
            "Polling {} personas on question {} (max {} in flight)",
            personas.len(),
            question.id,
            self.max_concurrent
        );

        let mut outcome = PollOutcome::default();

        for (batch_no, batch) in personas.chunks(self.max_concurrent).enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Poll of question {} cancelled after {} batch(es); returning partial results",
                    question.id, batch_no
                );
                break;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for persona in batch {
                let generator = Arc::clone(&self.generator);
                let prompt = prompt::render_poll(persona, question, context);
                let persona_id = persona.id.clone();
                let question_id = question.id.clone();

                handles.push(tokio::spawn(async move {
                    let text = generator.generate(&prompt).await?;
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        return Err(crate::error::GenerationError::Empty);
                    }
                    Ok(PollResponse {
                        persona_id,
                        question_id,
                        response: text,
                        confidence: Some(DEFAULT_CONFIDENCE),
                        timestamp: Utc::now(),
                    })
                }));
            }

            // This loop is the sole writer of the accumulating response list
            for handle in handles {
                match handle.await {
                    Ok(Ok(response)) => outcome.responses.push(response),
                    Ok(Err(e)) => {
                        outcome.failures += 1;
                        warn!("Generation failed for question {}: {}", question.id, e);
                    }
                    Err(e) => {
                        outcome.failures += 1;
                        warn!("Poll task panicked for question {}: {}", question.id, e);
                    }
                }
            }

            info!(
                "Completed batch {} for question {}; {} responses so far",
                batch_no + 1,
                question.id,
                outcome.responses.len()
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::{EducationLevel, Ideology, PoliticalParty, Race};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_personas(n: usize) -> Vec<Persona> {
        (0..n)
            .map(|i| Persona {
                id: format!("persona-{}", i),
                age: 40,
                gender: "Woman".to_string(),
                race: Race::White,
                education: EducationLevel::College,
                income_bracket: "$50-75K".to_string(),
                employment_status: "Employed full time".to_string(),
                marital_status: "Married".to_string(),
                precinct_id: "P1".to_string(),
                county: "San Francisco".to_string(),
                neighborhood: None,
                party_id: PoliticalParty::Independent,
                ideology: Ideology::Moderate,
                vote_history: HashMap::new(),
                top_issues: vec!["Economy".to_string()],
                issue_positions: HashMap::new(),
                news_sources: vec!["NPR".to_string()],
                source_respondent_id: None,
                created_at: Utc::now(),
            })
            .collect()
    }

    /// Tracks the high-water mark of concurrent in-flight calls.
    struct CountingGenerator {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("Yes".to_string())
        }
    }

    /// Fails every odd-numbered call; call numbering is global, so the
    /// failure count is deterministic even though task order is not.
    struct FlakyGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for FlakyGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                Err(GenerationError::Backend("simulated outage".to_string()))
            } else {
                Ok("Yes".to_string())
            }
        }
    }

    #[tokio::test]
    async fn poll_all_returns_one_response_per_persona() {
        let generator = Arc::new(CountingGenerator::new());
        let orchestrator = PollOrchestrator::new(Arc::clone(&generator) as Arc<dyn TextGenerator>, 4);
        let personas = test_personas(10);
        let question = PollQuestion::open("q1", "How are things?");

        let outcome = orchestrator
            .poll_all(&personas, &question, "", &CancellationToken::new())
            .await;

        assert_eq!(outcome.responses.len(), 10);
        assert_eq!(outcome.failures, 0);
        assert!(outcome.responses.iter().all(|r| r.question_id == "q1"));
    }

    #[tokio::test]
    async fn poll_all_never_exceeds_max_concurrent() {
        let generator = Arc::new(CountingGenerator::new());
        let orchestrator = PollOrchestrator::new(Arc::clone(&generator) as Arc<dyn TextGenerator>, 3);
        let personas = test_personas(11);
        let question = PollQuestion::open("q1", "How are things?");

        let outcome = orchestrator
            .poll_all(&personas, &question, "", &CancellationToken::new())
            .await;

        assert_eq!(outcome.responses.len(), 11);
        assert!(
            generator.peak.load(Ordering::SeqCst) <= 3,
            "peak concurrency {} exceeded limit",
            generator.peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn failures_reduce_the_response_set_without_aborting() {
        let generator = Arc::new(FlakyGenerator { calls: AtomicUsize::new(0) });
        let orchestrator = PollOrchestrator::new(generator, 4);
        let personas = test_personas(8);
        let question = PollQuestion::open("q1", "How are things?");

        let outcome = orchestrator
            .poll_all(&personas, &question, "", &CancellationToken::new())
            .await;

        // Odd-numbered calls fail: exactly half of 8
        assert_eq!(outcome.responses.len(), 4);
        assert_eq!(outcome.failures, 4);
    }

    #[tokio::test]
    async fn whitespace_only_output_counts_as_a_failure() {
        let generator = Arc::new(ScriptedGenerator::constant("   "));
        let orchestrator = PollOrchestrator::new(generator, 2);
        let personas = test_personas(3);
        let question = PollQuestion::open("q1", "How are things?");

        let outcome = orchestrator
            .poll_all(&personas, &question, "", &CancellationToken::new())
            .await;

        assert!(outcome.responses.is_empty());
        assert_eq!(outcome.failures, 3);
    }

    /// Answers normally but fires its cancellation token on the nth call.
    struct CancellingGenerator {
        cancel: CancellationToken,
        cancel_on_call: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CancellingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.cancel_on_call {
                self.cancel.cancel();
            }
            Ok("Yes".to_string())
        }
    }

    #[tokio::test]
    async fn already_cancelled_token_starts_no_batches() {
        let cancel = CancellationToken::new();
        let generator = Arc::new(ScriptedGenerator::constant("Yes"));
        let orchestrator = PollOrchestrator::new(generator, 5);
        let personas = test_personas(10);
        let question = PollQuestion::open("q1", "How are things?");

        cancel.cancel();
        let outcome = orchestrator.poll_all(&personas, &question, "", &cancel).await;
        assert!(outcome.responses.is_empty());
        assert_eq!(outcome.failures, 0);
    }

    #[tokio::test]
    async fn cancellation_mid_batch_keeps_the_completed_batch() {
        let cancel = CancellationToken::new();
        let generator = Arc::new(CancellingGenerator {
            cancel: cancel.clone(),
            cancel_on_call: 3,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = PollOrchestrator::new(generator, 5);
        let personas = test_personas(10);
        let question = PollQuestion::open("q1", "How are things?");

        let outcome = orchestrator.poll_all(&personas, &question, "", &cancel).await;

        // The first batch of 5 fully resolves; the second never starts
        assert_eq!(outcome.responses.len(), 5);
        assert_eq!(outcome.failures, 0);
    }

    #[tokio::test]
    async fn responses_carry_the_advisory_confidence() {
        let generator = Arc::new(ScriptedGenerator::constant("Yes"));
        let orchestrator = PollOrchestrator::new(generator, 2);
        let personas = test_personas(1);
        let question = PollQuestion::open("q1", "How are things?");

        let outcome = orchestrator
            .poll_all(&personas, &question, "", &CancellationToken::new())
            .await;
        assert_eq!(outcome.responses[0].confidence, Some(DEFAULT_CONFIDENCE));
    }
}
