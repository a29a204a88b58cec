use serde::Serialize;

use crate::error::FitError;
use crate::features::FeatureTable;
use crate::metrics::residual_sum_of_squares;
use crate::model::PredictionModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridOutcome {
    pub best_index: usize,
    pub params: Vec<f64>,
    pub ss_res: f64,
    pub evaluations: usize,
}

/// Exhaustive search: the candidate with the smallest residual sum of squares wins,
/// and the earliest candidate wins ties.
pub fn grid_search(
    model: &PredictionModel,
    table: &FeatureTable,
    observed: &[f64],
    candidates: &[Vec<f64>],
) -> Result<GridOutcome, FitError> {
    if observed.is_empty() {
        return Err(FitError::EmptyObservations);
    }
    if observed.len() != table.len() {
        return Err(FitError::LengthMismatch {
            expected: table.len(),
            found: observed.len(),
        });
    }
    if candidates.is_empty() {
        return Err(FitError::EmptyCandidates);
    }

    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let predicted = model.predict(candidate, table)?;
        let ss_res = residual_sum_of_squares(observed, &predicted);
        if !ss_res.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, current)| ss_res < current) {
            best = Some((index, ss_res));
        }
    }

    let (best_index, ss_res) = best.unwrap_or((0, f64::INFINITY));
    Ok(GridOutcome {
        best_index,
        params: candidates[best_index].clone(),
        ss_res,
        evaluations: candidates.len(),
    })
}
