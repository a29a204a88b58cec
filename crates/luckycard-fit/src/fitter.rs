use serde::{Deserialize, Serialize};
use tracing::{Level, event};

use crate::bayes::{BayesConfig, BayesianOptimizer, Dimension};
use crate::error::FitError;
use crate::features::FeatureTable;
use crate::grid::grid_search;
use crate::metrics::{FitMetrics, RSquared, residual_sum_of_squares};
use crate::model::PredictionModel;

/// How the parameter vector is searched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitStrategy {
    Grid {
        candidates: Vec<Vec<f64>>,
    },
    Bayesian {
        space: Vec<Dimension>,
        #[serde(default)]
        config: BayesConfig,
    },
}

impl FitStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            FitStrategy::Grid { .. } => "grid",
            FitStrategy::Bayesian { .. } => "bayesian",
        }
    }

    /// Number of free parameters the strategy searches over.
    pub fn num_params(&self) -> Option<usize> {
        match self {
            FitStrategy::Grid { candidates } => candidates.first().map(Vec::len),
            FitStrategy::Bayesian { space, .. } => Some(space.len()),
        }
    }

    /// Checks the strategy is usable with `model`.
    pub fn validate(&self, model: &PredictionModel) -> Result<(), FitError> {
        let expected = model.num_params();
        match self {
            FitStrategy::Grid { candidates } => {
                if candidates.is_empty() {
                    return Err(FitError::EmptyCandidates);
                }
                if let Some(bad) = candidates.iter().find(|c| c.len() != expected) {
                    return Err(FitError::ParameterCount {
                        expected,
                        found: bad.len(),
                    });
                }
            }
            FitStrategy::Bayesian { space, config } => {
                if space.len() != expected {
                    return Err(FitError::ParameterCount {
                        expected,
                        found: space.len(),
                    });
                }
                for dimension in space {
                    dimension.validate()?;
                }
                config.validate()?;
            }
        }
        Ok(())
    }
}

/// Best parameters for one response series plus goodness-of-fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub subject: usize,
    pub strategy: String,
    pub model: String,
    pub params: Vec<f64>,
    pub param_names: Vec<String>,
    pub ss_res: f64,
    pub ss_tot: f64,
    pub r_squared: RSquared,
    pub mse: f64,
    pub aic: f64,
    pub bic: f64,
    pub n: usize,
    pub k: usize,
    pub evaluations: usize,
    pub predicted: Vec<f64>,
}

pub fn fit_response(
    subject: usize,
    model: &PredictionModel,
    strategy: &FitStrategy,
    table: &FeatureTable,
    observed: &[f64],
) -> Result<FitResult, FitError> {
    if observed.is_empty() {
        return Err(FitError::EmptyObservations);
    }
    if observed.len() != table.len() {
        return Err(FitError::LengthMismatch {
            expected: table.len(),
            found: observed.len(),
        });
    }
    strategy.validate(model)?;

    let (params, evaluations) = match strategy {
        FitStrategy::Grid { candidates } => {
            let outcome = grid_search(model, table, observed, candidates)?;
            (outcome.params, outcome.evaluations)
        }
        FitStrategy::Bayesian { space, config } => {
            let optimizer = BayesianOptimizer::new(space.clone(), *config)?;
            let outcome = optimizer.minimize(|params| {
                let predicted = model.predict(params, table)?;
                Ok(residual_sum_of_squares(observed, &predicted))
            })?;
            (outcome.x, outcome.evaluations)
        }
    };

    let predicted = model.predict(&params, table)?;
    let metrics = FitMetrics::compute(observed, &predicted, params.len())?;
    let result = FitResult {
        subject,
        strategy: strategy.label().to_string(),
        model: model.label(),
        param_names: model
            .param_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
        params,
        ss_res: metrics.ss_res,
        ss_tot: metrics.ss_tot,
        r_squared: metrics.r_squared,
        mse: metrics.mse,
        aic: metrics.aic,
        bic: metrics.bic,
        n: metrics.n,
        k: metrics.k,
        evaluations,
        predicted,
    };

    event!(
        target: "luckycard::fit",
        Level::INFO,
        subject,
        strategy = result.strategy.as_str(),
        model = result.model.as_str(),
        r_squared = %result.r_squared,
        mse = result.mse,
        aic = result.aic,
        bic = result.bic,
        evaluations,
    );
    Ok(result)
}

/// Fits every response series against the same trial table; subjects are numbered from zero.
pub fn fit_subjects(
    model: &PredictionModel,
    strategy: &FitStrategy,
    table: &FeatureTable,
    responses: &[Vec<f64>],
) -> Result<Vec<FitResult>, FitError> {
    responses
        .iter()
        .enumerate()
        .map(|(subject, observed)| fit_response(subject, model, strategy, table, observed))
        .collect()
}
