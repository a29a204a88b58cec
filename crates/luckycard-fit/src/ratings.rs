use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Discrete honesty-rating scale used by a task version (0–6 or 0–10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: f64,
    pub max: f64,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 0.0, max: 6.0 }
    }
}

impl RatingScale {
    pub fn new(min: f64, max: f64) -> Result<Self, FitError> {
        let scale = Self { min, max };
        scale.validate()?;
        Ok(scale)
    }

    pub fn validate(&self) -> Result<(), FitError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.max > self.min) {
            return Err(FitError::InvalidSetting {
                field: "scale".to_string(),
                message: format!("max ({}) must exceed min ({})", self.max, self.min),
            });
        }
        Ok(())
    }

    pub fn points(&self) -> usize {
        (self.max - self.min).round() as usize + 1
    }

    /// Mirror a rating so that high honesty becomes low suspicion.
    pub fn reverse(&self, rating: f64) -> f64 {
        self.max + self.min - rating
    }

    pub fn normalize(&self, rating: f64) -> f64 {
        (rating - self.min) / (self.max - self.min)
    }

    /// Honesty rating to suspicion on `[0, 1]`.
    pub fn to_suspicion(&self, rating: f64) -> f64 {
        self.normalize(self.reverse(rating))
    }

    pub fn transform(&self, ratings: &[f64], reverse: bool) -> Vec<f64> {
        ratings
            .iter()
            .map(|r| {
                if reverse {
                    self.to_suspicion(*r)
                } else {
                    self.normalize(*r)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::RatingScale;

    #[test]
    fn seven_point_scale_reverses_and_normalizes() {
        let scale = RatingScale::default();
        assert_eq!(scale.points(), 7);
        assert_eq!(scale.reverse(6.0), 0.0);
        assert_eq!(scale.to_suspicion(0.0), 1.0);
        assert!((scale.to_suspicion(4.0) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn eleven_point_scale() {
        let scale = RatingScale::new(0.0, 10.0).unwrap();
        assert_eq!(scale.points(), 11);
        assert_eq!(scale.transform(&[0.0, 5.0, 10.0], false), vec![0.0, 0.5, 1.0]);
        assert_eq!(scale.transform(&[0.0, 5.0, 10.0], true), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn rejects_empty_range() {
        assert!(RatingScale::new(3.0, 3.0).is_err());
    }
}
