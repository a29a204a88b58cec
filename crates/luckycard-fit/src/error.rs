use luckycard_core::ModelError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("no observations to fit")]
    EmptyObservations,
    #[error("expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("grid search needs at least one candidate")]
    EmptyCandidates,
    #[error("model takes {expected} parameters, strategy supplies {found}")]
    ParameterCount { expected: usize, found: usize },
    #[error("invalid search space: {0}")]
    InvalidSearchSpace(String),
    #[error("invalid setting {field}: {message}")]
    InvalidSetting { field: String, message: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}
