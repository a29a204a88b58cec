//! Small Gaussian-process surrogate used by the Bayesian optimiser.
//!
//! Inputs live on the unit cube; targets are standardised before fitting.

const LENGTH_SCALES: [f64; 6] = [0.05, 0.1, 0.2, 0.4, 0.8, 1.6];
const JITTER: f64 = 1e-6;
const SQRT_5: f64 = 2.236_067_977_499_79;

#[derive(Debug, Clone)]
pub(crate) struct GaussianProcess {
    points: Vec<Vec<f64>>,
    chol: Vec<Vec<f64>>,
    weights: Vec<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    /// Fits a surrogate, choosing the length scale with the best marginal likelihood.
    /// Returns `None` when no length scale yields a positive-definite kernel.
    pub(crate) fn fit(points: &[Vec<f64>], values: &[f64]) -> Option<Self> {
        if points.is_empty() || points.len() != values.len() {
            return None;
        }
        let n = values.len() as f64;
        let y_mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        let targets: Vec<f64> = values.iter().map(|v| (v - y_mean) / y_std).collect();

        let mut best: Option<(f64, Self)> = None;
        for length_scale in LENGTH_SCALES {
            let Some(chol) = cholesky(&kernel_matrix(points, length_scale)) else {
                continue;
            };
            let alpha = solve_upper_transposed(&chol, &solve_lower(&chol, &targets));
            let fit_term: f64 = targets.iter().zip(&alpha).map(|(y, a)| y * a).sum();
            let log_det: f64 = (0..chol.len()).map(|i| chol[i][i].ln()).sum();
            let log_likelihood = -0.5 * fit_term - log_det;
            if !log_likelihood.is_finite() {
                continue;
            }
            if best.as_ref().is_none_or(|(score, _)| log_likelihood > *score) {
                best = Some((
                    log_likelihood,
                    Self {
                        points: points.to_vec(),
                        chol,
                        weights: alpha,
                        length_scale,
                        y_mean,
                        y_std,
                    },
                ));
            }
        }
        best.map(|(_, gp)| gp)
    }

    /// Posterior mean and standard deviation at `x`, in the original units.
    pub(crate) fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k: Vec<f64> = self
            .points
            .iter()
            .map(|p| matern52(p, x, self.length_scale))
            .collect();
        let mean: f64 = k.iter().zip(&self.weights).map(|(a, b)| a * b).sum();
        let v = solve_lower(&self.chol, &k);
        let variance = (1.0 - v.iter().map(|x| x * x).sum::<f64>()).max(0.0);
        (
            self.y_mean + mean * self.y_std,
            variance.sqrt() * self.y_std,
        )
    }
}

fn matern52(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let distance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt();
    let r = SQRT_5 * distance / length_scale;
    (1.0 + r + r * r / 3.0) * (-r).exp()
}

fn kernel_matrix(points: &[Vec<f64>], length_scale: f64) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let value = matern52(&points[i], &points[j], length_scale);
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
        matrix[i][i] += JITTER;
    }
    matrix
}

/// Lower-triangular factor `L` with `L * L^T = matrix`.
fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut lower = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let partial: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();
            if i == j {
                let diag = matrix[i][i] - partial;
                if !(diag > 0.0) {
                    return None;
                }
                lower[i][j] = diag.sqrt();
            } else {
                lower[i][j] = (matrix[i][j] - partial) / lower[j][j];
            }
        }
    }
    Some(lower)
}

fn solve_lower(lower: &[Vec<f64>], rhs: &[f64]) -> Vec<f64> {
    let n = rhs.len();
    let mut out = vec![0.0; n];
    for i in 0..n {
        let partial: f64 = (0..i).map(|k| lower[i][k] * out[k]).sum();
        out[i] = (rhs[i] - partial) / lower[i][i];
    }
    out
}

fn solve_upper_transposed(lower: &[Vec<f64>], rhs: &[f64]) -> Vec<f64> {
    let n = rhs.len();
    let mut out = vec![0.0; n];
    for i in (0..n).rev() {
        let partial: f64 = (i + 1..n).map(|k| lower[k][i] * out[k]).sum();
        out[i] = (rhs[i] - partial) / lower[i][i];
    }
    out
}
