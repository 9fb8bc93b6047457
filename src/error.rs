use thiserror::Error;

/// A single weighted draw could not be made. Callers synthesizing personas
/// degrade this to an "Unknown" category instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    #[error("distribution has zero total weight")]
    ZeroWeight,
    #[error("distribution contains a negative weight for '{0}'")]
    NegativeWeight(String),
}

/// One text-generation round trip failed. Never fatal to a poll; the
/// persona is dropped from the response set and the failure counted.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("empty response")]
    Empty,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Run-level failures. Per-item losses (a dropped survey row, one failed
/// generation) never surface here; these are the cases where no result can
/// be produced at all.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("no personas available for precinct {0}")]
    NoPersonas(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
