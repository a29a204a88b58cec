use std::collections::BTreeMap;

/// Running suspicion values, indexed by round and by pool configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuspicionHistory {
    trajectory: Vec<f64>,
    by_config: BTreeMap<u32, Vec<f64>>,
}

impl SuspicionHistory {
    pub fn new(s0: f64) -> Self {
        Self {
            trajectory: vec![s0],
            by_config: BTreeMap::new(),
        }
    }

    /// Append a post-update value and return the comparison set for `n_red`, newest last.
    pub fn record(&mut self, n_red: u32, value: f64) -> &[f64] {
        self.trajectory.push(value);
        let values = self.by_config.entry(n_red).or_default();
        values.push(value);
        values
    }

    /// Prior followed by one value per played trial.
    pub fn trajectory(&self) -> &[f64] {
        &self.trajectory
    }

    pub fn comparison_set(&self, n_red: u32) -> &[f64] {
        self.by_config.get(&n_red).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn configurations(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_config.keys().copied()
    }

    pub fn played(&self) -> usize {
        self.trajectory.len().saturating_sub(1)
    }

    pub fn latest(&self) -> Option<f64> {
        self.trajectory.last().copied()
    }

    pub fn deltas(&self) -> Vec<f64> {
        self.trajectory.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SuspicionHistory;

    #[test]
    fn trajectory_includes_prior() {
        let mut history = SuspicionHistory::new(0.5);
        assert_eq!(history.played(), 0);
        history.record(2, 0.7);
        history.record(3, 0.4);
        assert_eq!(history.trajectory(), &[0.5, 0.7, 0.4]);
        assert_eq!(history.played(), 2);
        assert_eq!(history.latest(), Some(0.4));
    }

    #[test]
    fn comparison_sets_are_grouped_by_red_count() {
        let mut history = SuspicionHistory::new(0.0);
        assert_eq!(history.record(2, 0.1), &[0.1]);
        history.record(4, 0.3);
        assert_eq!(history.record(2, 0.6), &[0.1, 0.6]);
        assert_eq!(history.comparison_set(4), &[0.3]);
        assert!(history.comparison_set(0).is_empty());
        assert_eq!(history.configurations().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn deltas_are_successive_differences() {
        let mut history = SuspicionHistory::new(0.0);
        history.record(1, 0.25);
        history.record(1, 0.75);
        let deltas = history.deltas();
        assert_eq!(deltas.len(), 2);
        assert!((deltas[0] - 0.25).abs() < 1e-12);
        assert!((deltas[1] - 0.5).abs() < 1e-12);
    }
}
