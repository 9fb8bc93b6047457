use log::{error, info, warn};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use voxpop::models::{load_precinct_profiles, PollQuestion};
use voxpop::poll::{GeneratorConfig, OpenAiCompatGenerator, ScriptedGenerator, TextGenerator};
use voxpop::sim::store::NoContext;
use voxpop::sim::{MemoryPersonaStore, MemoryResultStore, PersonaStore, SimulationConfig, SimulationRunner};
use voxpop::survey::SurveyCorpus;
use voxpop::synth::PersonaSynthesizer;

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_questions() -> Vec<PollQuestion> {
    vec![
        PollQuestion::choice(
            "vote_intent",
            "Who do you plan to vote for in the upcoming election?",
            vec![
                "Democratic candidate".to_string(),
                "Republican candidate".to_string(),
                "Independent/Third party candidate".to_string(),
                "Undecided / Will not vote".to_string(),
            ],
        ),
        PollQuestion::choice(
            "top_issue",
            "What is the most important issue facing your community?",
            vec![
                "Economy and jobs".to_string(),
                "Healthcare".to_string(),
                "Immigration".to_string(),
                "Education".to_string(),
                "Crime and public safety".to_string(),
                "Climate change and environment".to_string(),
                "Other".to_string(),
            ],
        ),
        PollQuestion::scale(
            "direction",
            "On a scale of 1 to 7, how satisfied are you with the direction of your community?",
            1.0,
            7.0,
        ),
    ]
}

fn build_generator() -> Arc<dyn TextGenerator> {
    match env::var("LLM_BASE_URL") {
        Ok(base_url) => {
            let config = GeneratorConfig {
                base_url,
                model: env::var("LLM_MODEL").ok(),
                ..Default::default()
            };
            match OpenAiCompatGenerator::new(config) {
                Ok(generator) => return Arc::new(generator),
                Err(e) => warn!("Failed to build LLM client ({}); falling back to dry run", e),
            }
        }
        Err(_) => warn!("LLM_BASE_URL not set; running dry with scripted responses"),
    }
    Arc::new(ScriptedGenerator::new(vec![
        "Democratic candidate".to_string(),
        "Republican candidate".to_string(),
        "Undecided / Will not vote".to_string(),
        "4".to_string(),
    ]))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let survey_dir = env::var("SURVEY_DIR").unwrap_or_else(|_| "data/surveys".to_string());
    let precinct_config =
        env::var("PRECINCT_CONFIG").unwrap_or_else(|_| "data/config/precincts.json".to_string());
    let voters_per_precinct = env_usize("VOTERS_PER_PRECINCT", 50);

    let corpus = Arc::new(SurveyCorpus::load_dir(Path::new(&survey_dir)));
    info!("Survey corpus: {} respondents", corpus.len());

    let profiles = match load_precinct_profiles(Path::new(&precinct_config)) {
        Ok(profiles) => profiles,
        Err(e) => {
            error!("Failed to load precinct config {}: {}", precinct_config, e);
            std::process::exit(1);
        }
    };
    info!("Loaded {} precinct profile(s)", profiles.len());

    // Synthesize voters into the in-process store
    let persona_store = Arc::new(MemoryPersonaStore::new());
    let mut synthesizer = PersonaSynthesizer::new(Arc::clone(&corpus));
    for profile in &profiles {
        let personas = synthesizer.synthesize_many(profile, voters_per_precinct);
        if let Err(e) = persona_store.save_batch(&personas).await {
            error!("Failed to store personas for {}: {}", profile.id, e);
            std::process::exit(1);
        }
    }

    let mut localities: Vec<String> = profiles.iter().map(|p| p.county.clone()).collect();
    localities.sort();
    localities.dedup();

    let config = SimulationConfig {
        max_concurrent: env_usize("MAX_CONCURRENT", 20),
        num_iterations: env_usize("NUM_ITERATIONS", 1),
        localities,
    };

    let runner = SimulationRunner::new(
        build_generator(),
        persona_store,
        Arc::new(MemoryResultStore::new()),
        Arc::new(NoContext),
        config,
    );

    let precinct_ids: Vec<String> = profiles.iter().map(|p| p.id.clone()).collect();
    let report = match runner
        .run(&precinct_ids, &default_questions(), &CancellationToken::new())
        .await
    {
        Ok(report) => report,
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to render report: {}", e),
    }
}
