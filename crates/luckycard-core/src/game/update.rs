use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::trial::Trial;

/// Legacy closed form: `pre + alpha * (outcome - expectation) + baseline`.
pub fn suspicion(pre_suspicion: f64, alpha: f64, baseline: f64, outcome: f64, expectation: f64) -> f64 {
    pre_suspicion + alpha * (outcome - expectation) + baseline
}

/// Delta-rule variants found across revisions of the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// `s + alpha * (outcome - expectation) + bias`
    #[default]
    Signed,
    /// `s + alpha * (1 - share of cards matching the report) + bias`
    Unsigned,
    /// Earliest revision's name for `Signed`: `baseline` plays the role of `bias`
    /// and the violation is rebuilt from the raw outcome and expectation. The two
    /// produce identical trajectories; this variant exists so configs and fits
    /// naming the earlier rule keep working.
    WithBaseline,
}

impl UpdateRule {
    /// Violation term this rule weights by `alpha`.
    pub fn violation(self, trial: &Trial) -> Result<f64, ModelError> {
        match self {
            UpdateRule::Signed => trial.exp_violation(),
            UpdateRule::Unsigned => trial.unsigned_violation(),
            UpdateRule::WithBaseline => Ok(trial.outcome()?.sign() - trial.expectation()?),
        }
    }

    /// `previous + alpha * violation + bias + noise`; variants differ only in `violation`.
    pub fn apply(self, previous: f64, alpha: f64, bias: f64, violation: f64, noise: f64) -> f64 {
        previous + alpha * violation + bias + noise
    }

    pub fn step(
        self,
        previous: f64,
        alpha: f64,
        bias: f64,
        trial: &Trial,
        noise: f64,
    ) -> Result<f64, ModelError> {
        Ok(self.apply(previous, alpha, bias, self.violation(trial)?, noise))
    }
}

/// When and how often uniform noise on `[-scale, scale]` is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseSchedule {
    #[default]
    Off,
    /// One draw at session start, added unchanged on every trial.
    PerRun { scale: f64 },
    /// A fresh draw on every trial.
    PerTrial { scale: f64 },
}

impl NoiseSchedule {
    pub fn scale(self) -> f64 {
        match self {
            NoiseSchedule::Off => 0.0,
            NoiseSchedule::PerRun { scale } | NoiseSchedule::PerTrial { scale } => scale,
        }
    }

    pub fn validate(self) -> Result<(), ModelError> {
        let scale = self.scale();
        if !scale.is_finite() || scale < 0.0 {
            return Err(ModelError::InvalidField {
                field: "session.noise.scale".to_string(),
                message: format!("{scale} must be a finite, non-negative number"),
            });
        }
        Ok(())
    }

    /// Begin a session; per-run noise is drawn here and held.
    pub fn start<R: Rng + ?Sized>(self, rng: &mut R) -> NoiseState {
        let held = match self {
            NoiseSchedule::PerRun { scale } => draw_uniform(scale, rng),
            _ => 0.0,
        };
        NoiseState {
            schedule: self,
            held,
        }
    }
}

fn draw_uniform<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> f64 {
    if scale > 0.0 {
        rng.gen_range(-scale..=scale)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseState {
    schedule: NoiseSchedule,
    held: f64,
}

impl NoiseState {
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        match self.schedule {
            NoiseSchedule::Off => 0.0,
            NoiseSchedule::PerRun { .. } => self.held,
            NoiseSchedule::PerTrial { scale } => draw_uniform(scale, rng),
        }
    }
}

/// Noise-free suspicion path over `trials`, starting at (and including) `s0`.
pub fn simulate_trajectory(
    rule: UpdateRule,
    alpha: f64,
    bias: f64,
    s0: f64,
    trials: &[Trial],
) -> Result<Vec<f64>, ModelError> {
    let mut trajectory = Vec::with_capacity(trials.len() + 1);
    trajectory.push(s0);
    let mut current = s0;
    for trial in trials {
        current = rule.step(current, alpha, bias, trial, 0.0)?;
        trajectory.push(current);
    }
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn trials() -> Vec<Trial> {
        [(2, 1), (4, -1), (0, 1), (5, -1), (3, 1), (1, -1), (2, 1)]
            .into_iter()
            .map(|(n_red, outcome)| Trial::from_raw(5, n_red, outcome).unwrap())
            .collect()
    }

    #[test]
    fn signed_rule_matches_worked_example() {
        let trial = Trial::from_raw(5, 2, 1).unwrap();
        let next = UpdateRule::Signed.step(0.0, 0.5, 0.1, &trial, 0.0).unwrap();
        assert!((next - 0.3).abs() < 1e-12);
    }

    #[test]
    fn iterative_rule_matches_closed_form() {
        let trials = trials();
        for (alpha, bias, s0) in [(0.5, 0.1, 0.0), (1.0, 0.0, 0.3), (0.25, -0.05, 1.0)] {
            let path = simulate_trajectory(UpdateRule::Signed, alpha, bias, s0, &trials).unwrap();
            assert_eq!(path.len(), trials.len() + 1);
            for k in 0..=trials.len() {
                let sum: f64 = trials[..k].iter().map(|t| t.exp_violation().unwrap()).sum();
                let closed = s0 + alpha * sum + k as f64 * bias;
                assert!((path[k] - closed).abs() < 1e-9, "k = {k}");
            }
        }
    }

    #[test]
    fn baseline_rule_agrees_with_legacy_function() {
        for trial in trials() {
            let outcome = trial.outcome().unwrap().sign();
            let expectation = trial.expectation().unwrap();
            let legacy = suspicion(0.2, 0.7, 0.05, outcome, expectation);
            let rule = UpdateRule::WithBaseline.step(0.2, 0.7, 0.05, &trial, 0.0).unwrap();
            assert!((legacy - rule).abs() < 1e-12);
        }
    }

    #[test]
    fn baseline_rule_is_an_alias_of_signed() {
        let signed = simulate_trajectory(UpdateRule::Signed, 0.45, 0.03, 0.1, &trials()).unwrap();
        let baseline =
            simulate_trajectory(UpdateRule::WithBaseline, 0.45, 0.03, 0.1, &trials()).unwrap();
        assert_eq!(signed.len(), baseline.len());
        for (a, b) in signed.iter().zip(&baseline) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn unsigned_rule_never_decreases_without_bias() {
        let path = simulate_trajectory(UpdateRule::Unsigned, 0.8, 0.0, 0.0, &trials()).unwrap();
        assert!(path.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn per_run_noise_is_held_constant() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = NoiseSchedule::PerRun { scale: 0.5 }.start(&mut rng);
        let first = state.next(&mut rng);
        assert!((-0.5..=0.5).contains(&first));
        for _ in 0..10 {
            assert_eq!(state.next(&mut rng), first);
        }
    }

    #[test]
    fn per_trial_noise_varies_and_off_is_zero() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = NoiseSchedule::PerTrial { scale: 1.0 }.start(&mut rng);
        let draws: Vec<f64> = (0..8).map(|_| state.next(&mut rng)).collect();
        assert!(draws.iter().all(|d| (-1.0..=1.0).contains(d)));
        assert!(draws.windows(2).any(|w| w[0] != w[1]));

        let mut off = NoiseSchedule::Off.start(&mut rng);
        assert_eq!(off.next(&mut rng), 0.0);
    }

    #[test]
    fn noise_validation_and_serde() {
        assert!(NoiseSchedule::PerRun { scale: -1.0 }.validate().is_err());
        let parsed: NoiseSchedule =
            serde_json::from_str(r#"{"kind": "per_run", "scale": 0.2}"#).unwrap();
        assert_eq!(parsed, NoiseSchedule::PerRun { scale: 0.2 });
        let off: NoiseSchedule = serde_json::from_str(r#"{"kind": "off"}"#).unwrap();
        assert_eq!(off, NoiseSchedule::Off);
    }

    #[test]
    fn invalid_outcome_stops_the_trajectory() {
        let mut trials = trials();
        trials.push(Trial::from_raw(5, 1, 3).unwrap());
        let err = simulate_trajectory(UpdateRule::Signed, 1.0, 0.0, 0.0, &trials).unwrap_err();
        assert_eq!(err, ModelError::InvalidOutcome(3));
    }
}
