use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::model::colour::Colour;
use crate::model::reward::RoundResult;

/// One row of the per-trial session trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub session: usize,
    pub n_red: u32,
    pub n_blue: u32,
    pub outcome: Colour,
    pub expectation: f64,
    pub exp_violation: f64,
    pub suspicion_before: f64,
    pub suspicion_after: f64,
    pub delta: f64,
    pub noise: f64,
    pub choice_probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_card: Option<Colour>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_card: Option<Colour>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_reward: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_reward: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RoundResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_latency_ms: Option<f64>,
}

/// Stream records as JSON lines; returns the number of rows written.
pub fn write_jsonl<W: Write>(writer: &mut W, records: &[TrialRecord]) -> io::Result<usize> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(records.len())
}
