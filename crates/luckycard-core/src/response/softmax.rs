use serde::{Deserialize, Serialize};

/// `P(v) = exp(beta * v) / sum(exp(beta * u) for u in comparison)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub beta: f64,
}

impl Default for SoftmaxModel {
    fn default() -> Self {
        Self { beta: 1.0 }
    }
}

impl SoftmaxModel {
    pub fn new(beta: f64) -> Self {
        Self { beta }
    }

    /// Probability of reporting `value` against `comparison`.
    ///
    /// `value` always takes part in the normalisation: a set that lacks it is
    /// read as `comparison ∪ {value}`, so the result never exceeds 1.
    pub fn probability(&self, value: f64, comparison: &[f64]) -> f64 {
        if comparison.is_empty() {
            return 1.0;
        }
        let max_logit = comparison
            .iter()
            .map(|v| self.beta * v)
            .fold(self.beta * value, f64::max);
        let mut denominator: f64 = comparison
            .iter()
            .map(|v| (self.beta * v - max_logit).exp())
            .sum();
        if !comparison.contains(&value) {
            denominator += (self.beta * value - max_logit).exp();
        }
        (self.beta * value - max_logit).exp() / denominator
    }

    /// Probabilities for every member of `comparison`, in order.
    pub fn distribution(&self, comparison: &[f64]) -> Vec<f64> {
        comparison
            .iter()
            .map(|value| self.probability(*value, comparison))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SoftmaxModel;

    #[test]
    fn singleton_set_is_certain() {
        let model = SoftmaxModel::new(3.0);
        assert_eq!(model.probability(0.7, &[0.7]), 1.0);
        assert_eq!(model.probability(0.7, &[]), 1.0);
    }

    #[test]
    fn distribution_sums_to_one() {
        let sets: [&[f64]; 4] = [
            &[0.1, 0.5, 0.9],
            &[-2.0, 0.0, 2.0, 4.0],
            &[1.0, 1.0],
            &[350.0, 420.0, 399.5],
        ];
        for beta in [0.0, 0.5, 1.0, 5.0] {
            let model = SoftmaxModel::new(beta);
            for set in sets {
                let total: f64 = model.distribution(set).iter().sum();
                assert!((total - 1.0).abs() < 1e-9, "beta {beta}, set {set:?}");
            }
        }
    }

    #[test]
    fn higher_suspicion_is_more_likely_with_positive_beta() {
        let model = SoftmaxModel::new(2.0);
        let set = [0.2, 0.8];
        assert!(model.probability(0.8, &set) > model.probability(0.2, &set));
        let expected = (2.0f64 * 0.8).exp() / ((2.0f64 * 0.2).exp() + (2.0f64 * 0.8).exp());
        assert!((model.probability(0.8, &set) - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_beta_is_uniform() {
        let model = SoftmaxModel::new(0.0);
        for p in model.distribution(&[0.1, 5.0, -3.0, 2.0]) {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn value_missing_from_set_joins_the_denominator() {
        let model = SoftmaxModel::new(1.0);
        let p = model.probability(5.0, &[0.0, 1.0]);
        assert!(p < 1.0, "p = {p}");
        let expected = model.probability(5.0, &[0.0, 1.0, 5.0]);
        assert!((p - expected).abs() < 1e-12);
    }
}
