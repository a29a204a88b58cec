use std::fs;
use std::path::{Path, PathBuf};

use luckycard_core::game::Game;
use luckycard_fit::FitResult;
use plotters::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

use crate::config::ExperimentConfig;

const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("no runs were recorded")]
    NoRuns,
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

/// Folds finished games into a [`SimulationSummary`].
pub struct SimulationCollector {
    run_id: String,
    settings: String,
    final_suspicion: Vec<f64>,
    rewards: Vec<f64>,
    trials: usize,
    lies: usize,
    lie_decisions: usize,
    probability_sum: f64,
    probability_count: usize,
    trace: Option<SuspicionTrace>,
}

impl SimulationCollector {
    pub fn new(config: &ExperimentConfig) -> Self {
        let session = &config.session;
        Self {
            run_id: config.run_id.clone(),
            settings: format!(
                "rule {:?}, noise {:?}, mode {:?}, reward policy {:?}, {} session(s), shuffle {}",
                session.rule,
                session.noise,
                session.mode,
                session.reward_policy,
                session.n_sessions,
                session.shuffle
            ),
            final_suspicion: Vec::new(),
            rewards: Vec::new(),
            trials: 0,
            lies: 0,
            lie_decisions: 0,
            probability_sum: 0.0,
            probability_count: 0,
            trace: None,
        }
    }

    pub fn record_run(&mut self, game: &Game) {
        self.final_suspicion.push(game.player().suspicion());
        self.rewards.push(f64::from(game.total_reward()));
        self.trials = game.log().len();

        for record in game.log() {
            if let Some(lied) = record.lied {
                self.lie_decisions += 1;
                if lied {
                    self.lies += 1;
                }
            }
            if record.choice_probability.is_finite() {
                self.probability_sum += record.choice_probability;
                self.probability_count += 1;
            }
        }

        if self.trace.is_none() {
            self.trace = Some(SuspicionTrace {
                suspicion: game.history().trajectory().to_vec(),
                violation: game.log().iter().map(|r| r.exp_violation).collect(),
                outcome: game.log().iter().map(|r| r.outcome.sign()).collect(),
            });
        }
    }

    pub fn finalize(self) -> Result<SimulationSummary, AnalyticsError> {
        if self.final_suspicion.is_empty() {
            return Err(AnalyticsError::NoRuns);
        }
        let runs = self.final_suspicion.len();
        let mean_final_suspicion = mean(&self.final_suspicion);
        let ci95 = confidence_interval(&self.final_suspicion);
        let lie_rate = (self.lie_decisions > 0).then(|| self.lies as f64 / self.lie_decisions as f64);
        let mean_choice_probability = if self.probability_count == 0 {
            0.0
        } else {
            self.probability_sum / self.probability_count as f64
        };

        Ok(SimulationSummary {
            run_id: self.run_id,
            settings: self.settings,
            runs,
            trials_per_run: self.trials,
            mean_final_suspicion,
            ci95,
            mean_reward: mean(&self.rewards),
            lie_rate,
            mean_choice_probability,
            final_suspicion: self.final_suspicion,
            trace: self.trace,
        })
    }
}

/// First-run trace kept for plotting.
#[derive(Debug, Clone, Serialize)]
pub struct SuspicionTrace {
    pub suspicion: Vec<f64>,
    pub violation: Vec<f64>,
    pub outcome: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub run_id: String,
    pub settings: String,
    pub runs: usize,
    pub trials_per_run: usize,
    pub mean_final_suspicion: f64,
    pub ci95: (f64, f64),
    pub mean_reward: f64,
    pub lie_rate: Option<f64>,
    pub mean_choice_probability: f64,
    #[serde(skip)]
    pub final_suspicion: Vec<f64>,
    #[serde(skip)]
    pub trace: Option<SuspicionTrace>,
}

impl SimulationSummary {
    pub fn write_markdown(
        &self,
        path: impl AsRef<Path>,
        fits: &[FitResult],
    ) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str(&format!("# Experiment Summary: {}\n\n", self.run_id));
        rows.push_str(&format!("Settings: {}\n\n", self.settings));
        rows.push_str("## Simulation\n\n");
        rows.push_str("| Runs | Trials/run | Mean final suspicion | 95% CI | Mean reward | Lie rate | Mean choice p |\n");
        rows.push_str("|------|------------|----------------------|--------|-------------|----------|---------------|\n");
        rows.push_str(&format!(
            "| {runs} | {trials} | {mean:.4} | [{low:.4}, {high:.4}] | {reward:+.3} | {lie} | {prob:.4} |\n",
            runs = self.runs,
            trials = self.trials_per_run,
            mean = self.mean_final_suspicion,
            low = self.ci95.0,
            high = self.ci95.1,
            reward = self.mean_reward,
            lie = self
                .lie_rate
                .map(|rate| format!("{:.1}%", rate * 100.0))
                .unwrap_or_else(|| "n/a".to_string()),
            prob = self.mean_choice_probability,
        ));

        if !fits.is_empty() {
            rows.push_str("\n## Fits\n\n");
            rows.push_str("| Subject | Model | Strategy | Params | R² | MSE | AIC | BIC | Evaluations |\n");
            rows.push_str("|---------|-------|----------|--------|----|-----|-----|-----|-------------|\n");
            for fit in fits {
                let params = fit
                    .param_names
                    .iter()
                    .zip(&fit.params)
                    .map(|(name, value)| format!("{name}={value:.4}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                rows.push_str(&format!(
                    "| {subject} | {model} | {strategy} | {params} | {r2} | {mse:.5} | {aic:.3} | {bic:.3} | {evals} |\n",
                    subject = fit.subject,
                    model = fit.model,
                    strategy = fit.strategy,
                    r2 = fit.r_squared,
                    mse = fit.mse,
                    aic = fit.aic,
                    bic = fit.bic,
                    evals = fit.evaluations,
                ));
            }
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }

    /// Suspicion, surprise and opponent reports across the first run.
    pub fn render_trace_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let trace = self
            .trace
            .clone()
            .ok_or_else(|| AnalyticsError::Plot("no trace recorded".into()))?;
        let series = vec![
            (
                "suspicion",
                RED,
                trace.suspicion.iter().copied().enumerate().collect::<Vec<_>>(),
            ),
            ("surprise", BLUE, shifted(&trace.violation)),
            ("opponent report", BLACK, shifted(&trace.outcome)),
        ];
        render_lines(
            dir.as_ref(),
            "suspicion_trace.png",
            "Suspicion trace (run 0)",
            series,
        )
    }
}

/// Observed against predicted series for one fitted subject.
pub fn render_fit_plot(
    dir: impl AsRef<Path>,
    fit: &FitResult,
    observed: &[f64],
) -> Result<PathBuf, AnalyticsError> {
    let series = vec![
        ("observed", BLACK, shifted(observed)),
        ("predicted", RED, shifted(&fit.predicted)),
    ];
    render_lines(
        dir.as_ref(),
        &format!("fit_subject_{}.png", fit.subject),
        &format!("Subject {} ({}, R² {})", fit.subject, fit.model, fit.r_squared),
        series,
    )
}

/// Pairs a per-trial series with trial numbers starting at 1.
fn shifted(values: &[f64]) -> Vec<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| (index + 1, *value))
        .collect()
}

fn render_lines(
    dir: &Path,
    file_name: &str,
    caption: &str,
    series: Vec<(&'static str, RGBColor, Vec<(usize, f64)>)>,
) -> Result<PathBuf, AnalyticsError> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
            context: "creating plots directory",
            source: e,
        })?;
    }

    let output_path = dir.join(file_name);
    let caption = caption.to_string();

    let x_max = series
        .iter()
        .flat_map(|(_, _, points)| points.iter().map(|(x, _)| *x))
        .max()
        .unwrap_or(1)
        .max(1);
    let (y_min, y_max) = series
        .iter()
        .flat_map(|(_, _, points)| points.iter().map(|(_, y)| *y))
        .filter(|y| y.is_finite())
        .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let margin = ((y_max - y_min).abs() * 0.1).max(0.2);

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));

    let plot_attempt = std::panic::catch_unwind(move || {
        let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(caption, ("sans-serif", 22))
            .set_label_area_size(LabelAreaPosition::Left, 50)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0..x_max + 1, (y_min - margin)..(y_max + margin))
            .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Trial")
            .draw()
            .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

        for (label, colour, points) in series {
            chart
                .draw_series(LineSeries::new(points, colour.stroke_width(2)))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &colour));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

        drop(chart);

        root.present()
            .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

        drop(root);

        Ok(output_path)
    });

    std::panic::set_hook(prev_hook);

    match plot_attempt {
        Ok(result) => result,
        Err(_) => Err(AnalyticsError::Plot(
            "plotters panicked while rendering (missing font support?)".into(),
        )),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Student-t interval for the mean.
fn confidence_interval(points: &[f64]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean = mean(points);
    if points.len() == 1 {
        return (mean, mean);
    }
    let n = points.len() as f64;
    let variance = points
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let std_error = (variance / n).sqrt();
    let critical = StudentsT::new(0.0, 1.0, n - 1.0)
        .map(|t| t.inverse_cdf(0.5 + CONFIDENCE_LEVEL / 2.0))
        .unwrap_or(1.96);
    let margin = critical * std_error;
    (mean - margin, mean + margin)
}
