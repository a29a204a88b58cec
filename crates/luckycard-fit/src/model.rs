use luckycard_core::game::{UpdateRule, simulate_trajectory};
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::features::{Feature, FeatureTable, Normalization};

/// Maps a parameter vector onto one predicted value per trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionModel {
    /// `prior + alpha * x`; parameters `[alpha, prior]`, the grid tuple order.
    Single { regressor: Feature },
    /// `prior + alpha_1 * x_1 + alpha_2 * x_2`; parameters `[prior, alpha_1, alpha_2]`.
    Weighted { first: Feature, second: Feature },
    /// Normalised noise-free suspicion path; parameters `[alpha, bias]`.
    Simulated {
        #[serde(default)]
        rule: UpdateRule,
        #[serde(default = "Normalization::legacy")]
        normalization: Normalization,
    },
}

impl PredictionModel {
    pub fn num_params(&self) -> usize {
        self.param_names().len()
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            PredictionModel::Single { .. } => &["alpha", "prior"],
            PredictionModel::Weighted { .. } => &["prior", "alpha_1", "alpha_2"],
            PredictionModel::Simulated { .. } => &["alpha", "bias"],
        }
    }

    pub fn label(&self) -> String {
        match self {
            PredictionModel::Single { regressor } => format!("single({regressor})"),
            PredictionModel::Weighted { first, second } => format!("weighted({first}, {second})"),
            PredictionModel::Simulated { rule, .. } => format!("simulated({rule:?})"),
        }
    }

    pub fn predict(&self, params: &[f64], table: &FeatureTable) -> Result<Vec<f64>, FitError> {
        if params.len() != self.num_params() {
            return Err(FitError::ParameterCount {
                expected: self.num_params(),
                found: params.len(),
            });
        }

        let predicted = match *self {
            PredictionModel::Single { regressor } => table
                .column(regressor)
                .iter()
                .map(|x| params[1] + params[0] * x)
                .collect(),
            PredictionModel::Weighted { first, second } => table
                .column(first)
                .iter()
                .zip(table.column(second))
                .map(|(x1, x2)| params[0] + params[1] * x1 + params[2] * x2)
                .collect(),
            PredictionModel::Simulated {
                rule,
                normalization,
            } => {
                let path = simulate_trajectory(rule, params[0], params[1], 0.0, table.trials())?;
                normalization.apply(&path[1..])
            }
        };
        Ok(predicted)
    }
}
