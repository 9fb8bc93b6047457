pub mod store;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::error::SimError;
use crate::models::{AggregatedResult, PollQuestion};
use crate::poll::{PollOrchestrator, TextGenerator};

pub use store::{ContextProvider, MemoryPersonaStore, MemoryResultStore, PersonaStore, ResultStore};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Peak in-flight generator calls per poll.
    pub max_concurrent: usize,
    /// How many times to repeat the whole precinct/question loop.
    pub num_iterations: usize,
    /// Localities handed to the context provider, once per run.
    pub localities: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            num_iterations: 1,
            localities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: String,
    /// Raw successful response count for this question.
    pub responses: usize,
    pub failures: usize,
    pub result: AggregatedResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecinctResult {
    pub precinct_id: String,
    pub num_agents: usize,
    pub questions: HashMap<String, QuestionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: usize,
    pub precincts: HashMap<String, PrecinctResult>,
}

/// Full output of one simulation run. Iterations are retained as a list,
/// one entry per repeat of the precinct/question loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub iterations: Vec<IterationResult>,
}

/// Composes the orchestrator and aggregator across precincts, questions and
/// iterations. All collaborators are injected; the runner owns nothing
/// global.
pub struct SimulationRunner {
    generator: Arc<dyn TextGenerator>,
    personas: Arc<dyn PersonaStore>,
    results: Arc<dyn ResultStore>,
    context: Arc<dyn ContextProvider>,
    config: SimulationConfig,
}

impl SimulationRunner {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        personas: Arc<dyn PersonaStore>,
        results: Arc<dyn ResultStore>,
        context: Arc<dyn ContextProvider>,
        config: SimulationConfig,
    ) -> Self {
        Self { generator, personas, results, context, config }
    }

    /// Run the full simulation. Partial generation loss still produces a
    /// report; the run only errors when a precinct has no personas at all
    /// or a store call fails.
    pub async fn run(
        &self,
        precinct_ids: &[String],
        questions: &[PollQuestion],
        cancel: &CancellationToken,
    ) -> Result<SimulationReport, SimError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            "Starting simulation {} over {} precinct(s), {} question(s), {} iteration(s)",
            run_id,
            precinct_ids.len(),
            questions.len(),
            self.config.num_iterations
        );

        // One context fetch per run, reused for every persona/question pair
        let context = self.context.get_context(&self.config.localities).await;
        let orchestrator =
            PollOrchestrator::new(Arc::clone(&self.generator), self.config.max_concurrent);

        let iterations_wanted = self.config.num_iterations.max(1);
        let mut iterations = Vec::with_capacity(iterations_wanted);

        'run: for iteration in 0..iterations_wanted {
            let mut precincts = HashMap::new();

            for precinct_id in precinct_ids {
                if cancel.is_cancelled() {
                    warn!("Simulation {} cancelled; keeping completed work", run_id);
                    if !precincts.is_empty() {
                        iterations.push(IterationResult { iteration, precincts });
                    }
                    break 'run;
                }

                let personas = self.personas.load_by_precinct(precinct_id).await?;
                if personas.is_empty() {
                    return Err(SimError::NoPersonas(precinct_id.clone()));
                }
                info!("Loaded {} personas for {}", personas.len(), precinct_id);

                let mut question_results = HashMap::new();
                for question in questions {
                    let outcome = orchestrator
                        .poll_all(&personas, question, &context, cancel)
                        .await;
                    if outcome.failures > 0 {
                        warn!(
                            "Question {} in {} lost {} response(s) to generation failures",
                            question.id, precinct_id, outcome.failures
                        );
                    }
                    question_results.insert(
                        question.id.clone(),
                        QuestionResult {
                            question: question.question.clone(),
                            responses: outcome.responses.len(),
                            failures: outcome.failures,
                            result: aggregate(&outcome.responses, question),
                        },
                    );
                }

                precincts.insert(
                    precinct_id.clone(),
                    PrecinctResult {
                        precinct_id: precinct_id.clone(),
                        num_agents: personas.len(),
                        questions: question_results,
                    },
                );
            }

            iterations.push(IterationResult { iteration, precincts });
        }

        let report = SimulationReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            iterations,
        };

        self.results.save(&report).await?;
        info!("Simulation {} complete", run_id);
        Ok(report)
    }
}
