use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use luckycard_core::ModelError;
use luckycard_core::game::{Game, TrialRecord};
use luckycard_core::model::player::Player;
use luckycard_core::model::trial::Trial;
use luckycard_fit::{FeatureTable, FitError, FitResult, fit_subjects};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;

use crate::analytics::{AnalyticsError, SimulationCollector, render_fit_plot};
use crate::config::{ExperimentConfig, FitSection, ResolvedOutputs};
use crate::inputs::{InputError, load_responses, load_trial_specs, resolve_trials};
use crate::logging::TELEMETRY_FILE;
use crate::telemetry::{
    TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs,
};

/// Primary entry point for simulation and fitting runs.
pub struct ExperimentRunner {
    config: ExperimentConfig,
    outputs: ResolvedOutputs,
    trials: Vec<Trial>,
    master: StdRng,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub runs: usize,
    pub trials_per_run: usize,
    pub rows_written: usize,
    pub mean_final_suspicion: f64,
    pub ci95: (f64, f64),
    pub subjects_fitted: usize,
    pub jsonl_path: PathBuf,
    pub fits_path: Option<PathBuf>,
    pub summary_path: PathBuf,
    pub plot_paths: Vec<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

impl ExperimentRunner {
    /// Build a runner from a validated configuration, resolving the trial list up front.
    pub fn new(config: ExperimentConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let specs = match (&config.trials.path, &config.trials.specs) {
            (Some(path), _) => load_trial_specs(&resolve_run_path(&config.run_id, path))?,
            (None, Some(specs)) => specs.clone(),
            (None, None) => return Err(RunnerError::NoTrials),
        };

        let mut master = StdRng::seed_from_u64(config.seed);
        let trials = resolve_trials(&specs, config.trials.n_cards, &mut master)?;
        if trials.is_empty() {
            return Err(RunnerError::NoTrials);
        }

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            trials,
            master,
        })
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Play every run, fit any configured responses and write all artefacts.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if !self.outputs.plots_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.outputs.plots_dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut master = self.master.clone();
        let mut collector = SimulationCollector::new(&self.config);
        let mut rows_written = 0usize;

        for run in 0..self.config.session.runs {
            let session_seed = master.next_u64();
            let game = self.play_run(session_seed)?;
            rows_written += write_run_rows(
                &mut writer,
                &self.config.run_id,
                run,
                session_seed,
                game.log(),
            )?;
            collector.record_run(&game);
        }
        writer.flush()?;

        let summary = collector.finalize()?;

        let mut plot_paths = Vec::new();
        let (fits, fits_path) = match self.config.fit.as_ref() {
            Some(fit) => {
                let (fits, observed) = self.fit_responses(fit)?;
                ensure_parent(self.outputs.fits_json.parent())?;
                fs::write(&self.outputs.fits_json, serde_json::to_vec_pretty(&fits)?)?;
                for (result, series) in fits.iter().zip(&observed) {
                    match render_fit_plot(&self.outputs.plots_dir, result, series) {
                        Ok(path) => plot_paths.push(path),
                        Err(err) => eprintln!("WARN: {}", err),
                    }
                }
                (fits, Some(self.outputs.fits_json.clone()))
            }
            None => (Vec::new(), None),
        };

        summary.write_markdown(&self.outputs.summary_md, &fits)?;
        match summary.render_trace_plot(&self.outputs.plots_dir) {
            Ok(path) => plot_paths.insert(0, path),
            Err(err) => eprintln!("WARN: {}", err),
        }

        // Summarised later by `RunSummary::summarise_telemetry`, once the writer is flushed.
        let telemetry_path = self
            .logging_enabled
            .then(|| self.outputs.summary_dir().join(TELEMETRY_FILE));

        Ok(RunSummary {
            runs: summary.runs,
            trials_per_run: summary.trials_per_run,
            rows_written,
            mean_final_suspicion: summary.mean_final_suspicion,
            ci95: summary.ci95,
            subjects_fitted: fits.len(),
            jsonl_path: self.outputs.jsonl.clone(),
            fits_path,
            summary_path: self.outputs.summary_md.clone(),
            plot_paths,
            telemetry_path,
            telemetry_outputs: None,
        })
    }

    fn play_run(&self, seed: u64) -> Result<Game, RunnerError> {
        let player = Player::from_config(self.config.player);
        let mut game = Game::new(self.trials.clone(), player, self.config.session_config(seed))?;
        game.play()?;
        Ok(game)
    }

    /// Fits every subject against the configured trial order; returns the fits
    /// together with the transformed observations they were fitted to.
    fn fit_responses(
        &self,
        fit: &FitSection,
    ) -> Result<(Vec<FitResult>, Vec<Vec<f64>>), RunnerError> {
        let path = resolve_run_path(&self.config.run_id, &fit.responses);
        let observed: Vec<Vec<f64>> = load_responses(&path)?
            .iter()
            .map(|ratings| fit.scale.transform(ratings, fit.reverse))
            .collect();
        let table = FeatureTable::from_trials(&self.trials, &fit.feature_config())?;

        let fits = fit_subjects(&fit.model, &fit.strategy, &table, &observed)?;
        Ok((fits, observed))
    }
}

fn resolve_run_path(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_run_rows(
    writer: &mut BufWriter<File>,
    run_id: &str,
    run: usize,
    session_seed: u64,
    records: &[TrialRecord],
) -> Result<usize, RunnerError> {
    for record in records {
        let row = SimulationRow {
            run_id,
            run,
            session_seed,
            record,
        };
        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
    }
    Ok(records.len())
}

#[derive(Serialize)]
struct SimulationRow<'a> {
    run_id: &'a str,
    run: usize,
    session_seed: u64,
    #[serde(flatten)]
    record: &'a TrialRecord,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no trials to play")]
    NoTrials,
    #[error("{0}")]
    Input(#[from] InputError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("fit failed: {0}")]
    Fit(#[from] FitError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize output: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl RunSummary {
    /// Final summary of the simulation half of the run.
    pub fn describe(&self) -> String {
        format!(
            "{} runs × {} trials, mean final suspicion {:.4} (95% CI [{:.4}, {:.4}])",
            self.runs, self.trials_per_run, self.mean_final_suspicion, self.ci95.0, self.ci95.1
        )
    }

    /// Folds `telemetry.jsonl` into the telemetry summary files and appends the
    /// highlights to the Markdown summary.
    ///
    /// The non-blocking writer only guarantees every event is on disk after its
    /// guard is dropped, so call this after releasing the logging guard.
    pub fn summarise_telemetry(&mut self) -> Result<(), RunnerError> {
        let Some(path) = self.telemetry_path.as_ref() else {
            return Ok(());
        };
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let outputs = write_summary_outputs(path, &dir)?;
        if let Some(outputs) = outputs.as_ref() {
            append_highlights_to_markdown(&self.summary_path, outputs)?;
        }
        self.telemetry_outputs = outputs;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_carry_run_metadata_and_flattened_record() {
        let record = TrialRecord {
            trial: 1,
            session: 1,
            n_red: 2,
            n_blue: 3,
            outcome: luckycard_core::model::colour::Colour::Blue,
            expectation: 0.6,
            exp_violation: 0.4,
            suspicion_before: 0.0,
            suspicion_after: 0.3,
            delta: 0.3,
            noise: 0.0,
            choice_probability: 1.0,
            selected_card: None,
            reported_card: None,
            lied: None,
            player_reward: None,
            opponent_reward: None,
            result: None,
            rating: None,
            response_latency_ms: None,
        };
        let row = SimulationRow {
            run_id: "r1",
            run: 3,
            session_seed: 11,
            record: &record,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["run_id"], "r1");
        assert_eq!(value["run"], 3);
        assert_eq!(value["outcome"], 1);
        assert_eq!(value["exp_violation"], 0.4);
        assert!(value.get("lied").is_none());
    }

    #[test]
    fn run_paths_substitute_run_id() {
        assert_eq!(
            resolve_run_path("pilot", "data/{run_id}/ratings.json"),
            PathBuf::from("data/pilot/ratings.json")
        );
    }
}
