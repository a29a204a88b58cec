//! Experiment harness: runs seeded Monte-Carlo sessions of the Lucky Card
//! game, fits response models to recorded ratings and writes JSONL, JSON,
//! Markdown and PNG artefacts.

pub mod analytics;
pub mod config;
pub mod experiment;
pub mod inputs;
pub mod logging;
pub mod telemetry;
