use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Recognised player parameters; anything else in a config block is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerConfig {
    pub alpha: f64,
    #[serde(default, alias = "baseline")]
    pub bias: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default, alias = "pre_suspicion")]
    pub s0: f64,
}

fn default_beta() -> f64 {
    1.0
}

impl PlayerConfig {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            bias: 0.0,
            beta: default_beta(),
            s0: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (field, value) in [
            ("player.alpha", self.alpha),
            ("player.bias", self.bias),
            ("player.beta", self.beta),
            ("player.s0", self.s0),
        ] {
            if !value.is_finite() {
                return Err(ModelError::InvalidField {
                    field: field.to_string(),
                    message: format!("{value} is not a finite number"),
                });
            }
        }
        Ok(())
    }
}

/// Belief-update parameters and the current suspicion state of one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    alpha: f64,
    bias: f64,
    beta: f64,
    s0: f64,
    suspicion: f64,
}

impl Player {
    pub fn new(alpha: f64) -> Self {
        Self::from_config(PlayerConfig::new(alpha))
    }

    pub fn from_config(config: PlayerConfig) -> Self {
        Self {
            alpha: config.alpha,
            bias: config.bias,
            beta: config.beta,
            s0: config.s0,
            suspicion: config.s0,
        }
    }

    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_prior(mut self, s0: f64) -> Self {
        self.s0 = s0;
        self.suspicion = s0;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn s0(&self) -> f64 {
        self.s0
    }

    pub fn suspicion(&self) -> f64 {
        self.suspicion
    }

    pub fn config(&self) -> PlayerConfig {
        PlayerConfig {
            alpha: self.alpha,
            bias: self.bias,
            beta: self.beta,
            s0: self.s0,
        }
    }

    /// Replace the suspicion state outright; no smoothing is applied.
    pub fn update_suspicion(&mut self, value: f64) {
        self.suspicion = value;
    }

    pub fn update_bias(&mut self, value: f64) {
        self.bias = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_untrained_player() {
        let player = Player::new(0.5);
        assert_eq!(player.bias(), 0.0);
        assert_eq!(player.beta(), 1.0);
        assert_eq!(player.s0(), 0.0);
        assert_eq!(player.suspicion(), 0.0);
    }

    #[test]
    fn single_update_from_violation() {
        let mut player = Player::new(0.5).with_bias(0.1);
        let next = player.suspicion() + player.alpha() * 0.4 + player.bias();
        player.update_suspicion(next);
        assert!((player.suspicion() - 0.3).abs() < 1e-12);
        assert_eq!(player.s0(), 0.0);
    }

    #[test]
    fn bias_update_replaces_value() {
        let mut player = Player::new(1.0).with_bias(0.2);
        player.update_bias(-0.3);
        assert_eq!(player.bias(), -0.3);
    }

    #[test]
    fn config_accepts_baseline_alias_and_rejects_unknown_keys() {
        let cfg: PlayerConfig =
            serde_json::from_str(r#"{"alpha": 0.5, "baseline": 0.1, "pre_suspicion": 0.2}"#)
                .unwrap();
        assert_eq!(cfg.bias, 0.1);
        assert_eq!(cfg.s0, 0.2);
        assert_eq!(cfg.beta, 1.0);

        let err = serde_json::from_str::<PlayerConfig>(r#"{"alpha": 0.5, "gamma": 2.0}"#);
        assert!(err.is_err());
    }

    #[test]
    fn validate_rejects_non_finite() {
        let mut cfg = PlayerConfig::new(0.5);
        assert!(cfg.validate().is_ok());
        cfg.beta = f64::NAN;
        assert!(matches!(
            cfg.validate(),
            Err(ModelError::InvalidField { field, .. }) if field == "player.beta"
        ));
    }
}
