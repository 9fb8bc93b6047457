//! Synthetic-electorate polling: synthesize demographically representative
//! voter personas from survey micro-data and precinct-level distributions,
//! poll each persona through a text-generation backend with bounded
//! concurrency, and aggregate the answers into per-precinct statistics.

pub mod aggregate;
pub mod error;
pub mod models;
pub mod poll;
pub mod prompt;
pub mod sim;
pub mod survey;
pub mod synth;
