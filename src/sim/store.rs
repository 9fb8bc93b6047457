use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::Persona;

use super::SimulationReport;

/// Best-effort free-text context for a set of localities. Never fails the
/// caller; an empty string is a valid answer.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn get_context(&self, localities: &[String]) -> String;
}

/// Provider that always returns no context.
pub struct NoContext;

#[async_trait]
impl ContextProvider for NoContext {
    async fn get_context(&self, _localities: &[String]) -> String {
        String::new()
    }
}

/// Fixed context text, useful for tests and offline runs.
pub struct StaticContext {
    text: String,
}

impl StaticContext {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

#[async_trait]
impl ContextProvider for StaticContext {
    async fn get_context(&self, _localities: &[String]) -> String {
        self.text.clone()
    }
}

#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn load_by_precinct(&self, precinct_id: &str) -> Result<Vec<Persona>, StoreError>;
    async fn save_batch(&self, personas: &[Persona]) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(&self, report: &SimulationReport) -> Result<(), StoreError>;
    async fn load(&self, run_id: &str) -> Result<Option<SimulationReport>, StoreError>;
}

/// In-process persona storage keyed by precinct id.
#[derive(Default)]
pub struct MemoryPersonaStore {
    by_precinct: RwLock<HashMap<String, Vec<Persona>>>,
}

impl MemoryPersonaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersonaStore for MemoryPersonaStore {
    async fn load_by_precinct(&self, precinct_id: &str) -> Result<Vec<Persona>, StoreError> {
        let map = self.by_precinct.read().await;
        Ok(map.get(precinct_id).cloned().unwrap_or_default())
    }

    async fn save_batch(&self, personas: &[Persona]) -> Result<usize, StoreError> {
        let mut map = self.by_precinct.write().await;
        for persona in personas {
            map.entry(persona.precinct_id.clone())
                .or_default()
                .push(persona.clone());
        }
        Ok(personas.len())
    }
}

/// In-process result storage keyed by run id.
#[derive(Default)]
pub struct MemoryResultStore {
    runs: RwLock<HashMap<String, SimulationReport>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save(&self, report: &SimulationReport) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        runs.insert(report.run_id.clone(), report.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<SimulationReport>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).cloned())
    }
}
