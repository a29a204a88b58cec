use thiserror::Error;

/// Contract violations raised while building trials, players and records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("n_red = {n_red} exceeds the card pool of {n_cards}")]
    InvalidConfiguration { n_red: u32, n_cards: u32 },
    #[error("opponent outcome {0} is not one of -1 (red) or +1 (blue)")]
    InvalidOutcome(i64),
    #[error("{record} record is missing required field '{field}'")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
