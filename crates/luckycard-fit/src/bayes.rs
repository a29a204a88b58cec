//! Gaussian-process Bayesian optimisation over a bounded search space.
//!
//! The optimiser spends `n_initial_points` calls on uniform random probes, then
//! proposes each further point by maximising expected improvement over a batch
//! of random candidates. All randomness comes from one `StdRng` seeded from the
//! config, so two runs with the same objective are bit-identical.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::{Level, event};

use crate::error::FitError;
use crate::gp::GaussianProcess;

/// One axis of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dimension {
    Real { low: f64, high: f64 },
    Integer { low: i64, high: i64 },
    Categorical { choices: Vec<f64> },
}

impl Dimension {
    pub fn validate(&self) -> Result<(), FitError> {
        match self {
            Dimension::Real { low, high } => {
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return Err(FitError::InvalidSearchSpace(format!(
                        "real range [{low}, {high}] must be finite with low < high"
                    )));
                }
            }
            Dimension::Integer { low, high } => {
                if low >= high {
                    return Err(FitError::InvalidSearchSpace(format!(
                        "integer range [{low}, {high}] must have low < high"
                    )));
                }
            }
            Dimension::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(FitError::InvalidSearchSpace(
                        "categorical dimension needs at least one choice".to_string(),
                    ));
                }
                if choices.iter().any(|c| !c.is_finite()) {
                    return Err(FitError::InvalidSearchSpace(
                        "categorical choices must be finite".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Maps a point of the unit interval onto this dimension.
    pub fn from_unit(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        match self {
            Dimension::Real { low, high } => low + u * (high - low),
            Dimension::Integer { low, high } => {
                let (low, high) = (*low as f64, *high as f64);
                (low + u * (high - low)).round().clamp(low, high)
            }
            Dimension::Categorical { choices } => {
                let index = ((u * choices.len() as f64) as usize).min(choices.len() - 1);
                choices[index]
            }
        }
    }

    /// Inverse of [`Dimension::from_unit`]; categorical values map to the centre of their bucket.
    pub fn to_unit(&self, x: f64) -> f64 {
        match self {
            Dimension::Real { low, high } => ((x - low) / (high - low)).clamp(0.0, 1.0),
            Dimension::Integer { low, high } => {
                let (low, high) = (*low as f64, *high as f64);
                ((x - low) / (high - low)).clamp(0.0, 1.0)
            }
            Dimension::Categorical { choices } => {
                let index = choices
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                (index as f64 + 0.5) / choices.len() as f64
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BayesConfig {
    pub n_calls: usize,
    pub n_initial_points: usize,
    pub n_candidates: usize,
    pub xi: f64,
    pub seed: u64,
}

impl Default for BayesConfig {
    fn default() -> Self {
        Self {
            n_calls: 100,
            n_initial_points: 10,
            n_candidates: 500,
            xi: 0.01,
            seed: 42,
        }
    }
}

impl BayesConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        let invalid = |field: &str, message: &str| FitError::InvalidSetting {
            field: format!("bayes.{field}"),
            message: message.to_string(),
        };
        if self.n_calls == 0 {
            return Err(invalid("n_calls", "must be at least 1"));
        }
        if self.n_initial_points == 0 {
            return Err(invalid("n_initial_points", "must be at least 1"));
        }
        if self.n_candidates == 0 {
            return Err(invalid("n_candidates", "must be at least 1"));
        }
        if !(self.xi.is_finite() && self.xi >= 0.0) {
            return Err(invalid("xi", "must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Best point seen by the optimiser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BayesOutcome {
    pub x: Vec<f64>,
    pub fun: f64,
    pub evaluations: usize,
}

#[derive(Debug, Clone)]
pub struct BayesianOptimizer {
    space: Vec<Dimension>,
    config: BayesConfig,
}

impl BayesianOptimizer {
    pub fn new(space: Vec<Dimension>, config: BayesConfig) -> Result<Self, FitError> {
        if space.is_empty() {
            return Err(FitError::InvalidSearchSpace(
                "search space has no dimensions".to_string(),
            ));
        }
        for dimension in &space {
            dimension.validate()?;
        }
        config.validate()?;
        Ok(Self { space, config })
    }

    pub fn space(&self) -> &[Dimension] {
        &self.space
    }

    pub fn config(&self) -> &BayesConfig {
        &self.config
    }

    /// Minimises `objective`, spending exactly `n_calls` evaluations.
    ///
    /// Non-finite objective values are kept out of the best-point race and are
    /// clamped above the worst finite value before reaching the surrogate.
    pub fn minimize<F>(&self, mut objective: F) -> Result<BayesOutcome, FitError>
    where
        F: FnMut(&[f64]) -> Result<f64, FitError>,
    {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut units: Vec<Vec<f64>> = Vec::with_capacity(self.config.n_calls);
        let mut values: Vec<f64> = Vec::with_capacity(self.config.n_calls);
        let mut best: Option<(Vec<f64>, f64)> = None;

        for call in 0..self.config.n_calls {
            let proposal = if call < self.config.n_initial_points {
                self.random_unit(&mut rng)
            } else {
                self.propose(&units, &values, best.as_ref().map(|(_, y)| *y), &mut rng)
            };
            let x = self.decode(&proposal);
            let y = objective(&x)?;

            if y.is_finite() && best.as_ref().is_none_or(|(_, current)| y < *current) {
                best = Some((x.clone(), y));
            }
            if tracing::enabled!(target: "luckycard::bayes", Level::DEBUG) {
                event!(
                    target: "luckycard::bayes",
                    Level::DEBUG,
                    call,
                    value = y,
                    best = best.as_ref().map(|(_, v)| *v).unwrap_or(f64::INFINITY),
                    initial = call < self.config.n_initial_points,
                );
            }
            units.push(self.encode(&x));
            values.push(y);
        }

        let (x, fun) = match best {
            Some(found) => found,
            None => (self.decode(&units[0]), values[0]),
        };
        Ok(BayesOutcome {
            x,
            fun,
            evaluations: values.len(),
        })
    }

    fn random_unit(&self, rng: &mut StdRng) -> Vec<f64> {
        (0..self.space.len()).map(|_| rng.gen_range(0.0..1.0)).collect()
    }

    fn decode(&self, unit: &[f64]) -> Vec<f64> {
        self.space
            .iter()
            .zip(unit)
            .map(|(dimension, u)| dimension.from_unit(*u))
            .collect()
    }

    fn encode(&self, x: &[f64]) -> Vec<f64> {
        self.space
            .iter()
            .zip(x)
            .map(|(dimension, v)| dimension.to_unit(*v))
            .collect()
    }

    fn propose(
        &self,
        units: &[Vec<f64>],
        values: &[f64],
        incumbent: Option<f64>,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let candidates: Vec<Vec<f64>> = (0..self.config.n_candidates)
            .map(|_| self.random_unit(rng))
            .collect();
        let Some(incumbent) = incumbent else {
            return candidates[0].clone();
        };
        let targets = clamp_non_finite(values);
        let Some(gp) = GaussianProcess::fit(units, &targets) else {
            return candidates[0].clone();
        };
        let Ok(normal) = Normal::new(0.0, 1.0) else {
            return candidates[0].clone();
        };

        let mut chosen = 0;
        let mut best_ei = f64::NEG_INFINITY;
        for (index, candidate) in candidates.iter().enumerate() {
            let (mean, std) = gp.predict(candidate);
            let ei = expected_improvement(&normal, incumbent, mean, std, self.config.xi);
            if ei > best_ei {
                best_ei = ei;
                chosen = index;
            }
        }
        candidates[chosen].clone()
    }
}

fn expected_improvement(normal: &Normal, incumbent: f64, mean: f64, std: f64, xi: f64) -> f64 {
    let improvement = incumbent - mean - xi;
    if std <= 1e-12 {
        return improvement.max(0.0);
    }
    let z = improvement / std;
    improvement * normal.cdf(z) + std * normal.pdf(z)
}

fn clamp_non_finite(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let worst = finite.clone().fold(f64::NEG_INFINITY, f64::max);
    let best = finite.fold(f64::INFINITY, f64::min);
    let ceiling = if worst.is_finite() {
        worst + (worst - best).abs().max(1.0)
    } else {
        1.0
    };
    values
        .iter()
        .map(|v| if v.is_finite() { *v } else { ceiling })
        .collect()
}
