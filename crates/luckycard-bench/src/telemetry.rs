use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub trials: TrialTelemetrySummary,
    pub sessions: SessionTelemetrySummary,
    pub fits: FitTelemetrySummary,
    pub optimiser_calls: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct TrialTelemetrySummary {
    pub count: usize,
    pub avg_violation: Option<f64>,
    pub avg_abs_delta: Option<f64>,
    pub avg_choice_probability: Option<f64>,
    pub outcome_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct SessionTelemetrySummary {
    pub count: usize,
    pub avg_final_suspicion: Option<f64>,
}

#[derive(Debug, Default, Serialize)]
pub struct FitTelemetrySummary {
    pub count: usize,
    pub avg_mse: Option<f64>,
    pub avg_r_squared: Option<f64>,
    pub undefined_r_squared: usize,
    pub strategy_counts: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate trial, session, fit and optimiser events from a JSON telemetry log.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut violation_avg = Average::new();
    let mut delta_avg = Average::new();
    let mut probability_avg = Average::new();
    let mut final_suspicion_avg = Average::new();
    let mut mse_avg = Average::new();
    let mut r_squared_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match target {
            "luckycard::trial" => {
                summary.trials.count += 1;
                if let Some(value) = fields.get("violation").and_then(Value::as_f64) {
                    violation_avg.add(value);
                }
                if let Some(value) = fields.get("delta").and_then(Value::as_f64) {
                    delta_avg.add(value.abs());
                }
                if let Some(value) = fields.get("choice_probability").and_then(Value::as_f64) {
                    probability_avg.add(value);
                }
                let outcome = match fields.get("outcome").and_then(Value::as_i64) {
                    Some(-1) => "red",
                    Some(1) => "blue",
                    _ => "<unset>",
                };
                *summary
                    .trials
                    .outcome_counts
                    .entry(outcome.to_string())
                    .or_insert(0) += 1;
            }
            "luckycard::session" => {
                summary.sessions.count += 1;
                if let Some(value) = fields.get("final_suspicion").and_then(Value::as_f64) {
                    final_suspicion_avg.add(value);
                }
            }
            "luckycard::fit" => {
                summary.fits.count += 1;
                if let Some(value) = fields.get("mse").and_then(Value::as_f64) {
                    mse_avg.add(value);
                }
                match fields.get("r_squared").and_then(number_or_text) {
                    Some(value) => r_squared_avg.add(value),
                    None => summary.fits.undefined_r_squared += 1,
                }
                let strategy = fields
                    .get("strategy")
                    .and_then(Value::as_str)
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("<unset>");
                *summary
                    .fits
                    .strategy_counts
                    .entry(strategy.to_string())
                    .or_insert(0) += 1;
            }
            "luckycard::bayes" => {
                summary.optimiser_calls += 1;
            }
            _ => {}
        }
    }

    summary.trials.avg_violation = violation_avg.mean();
    summary.trials.avg_abs_delta = delta_avg.mean();
    summary.trials.avg_choice_probability = probability_avg.mean();
    summary.sessions.avg_final_suspicion = final_suspicion_avg.mean();
    summary.fits.avg_mse = mse_avg.mean();
    summary.fits.avg_r_squared = r_squared_avg.mean();
    Ok(summary)
}

/// R² is logged through its `Display` form, so it arrives as text.
fn number_or_text(raw: &Value) -> Option<f64> {
    if let Some(value) = raw.as_f64() {
        return Some(value);
    }
    raw.as_str()?.trim().parse::<f64>().ok()
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(
        &json_path,
        serde_json::to_vec_pretty(&summary).map_err(TelemetryError::from)?,
    )
    .map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary json",
        source,
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    let trials = &outputs.summary.trials;
    section.push_str(&format!("- Trial events captured: {}\n", trials.count));
    if let Some(value) = trials.avg_violation {
        section.push_str(&format!("- Avg expectation violation: {:.3}\n", value));
    }
    if let Some(value) = trials.avg_abs_delta {
        section.push_str(&format!("- Avg |Δ suspicion|: {:.3}\n", value));
    }
    if let Some(value) = trials.avg_choice_probability {
        section.push_str(&format!("- Avg choice probability: {:.3}\n", value));
    }
    if !trials.outcome_counts.is_empty() {
        section.push_str("- Opponent reports:\n");
        for (label, count) in &trials.outcome_counts {
            section.push_str(&format!("  - {}: {}\n", label, count));
        }
    }

    let fits = &outputs.summary.fits;
    section.push_str("\n### Fits\n");
    if fits.count == 0 {
        section.push_str("- <none>\n");
    } else {
        section.push_str(&format!("- Fit events: {}\n", fits.count));
        if let Some(value) = fits.avg_r_squared {
            section.push_str(&format!("- Avg R²: {:.4}\n", value));
        }
        if fits.undefined_r_squared > 0 {
            section.push_str(&format!("- Undefined R²: {}\n", fits.undefined_r_squared));
        }
        for (label, count) in &fits.strategy_counts {
            section.push_str(&format!("- {}: {}\n", label, count));
        }
    }

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push('\n');

    output.push_str("## Trials\n");
    output.push_str(&format!("- Events: {}\n", summary.trials.count));
    if let Some(value) = summary.trials.avg_violation {
        output.push_str(&format!("- Avg expectation violation: {:.3}\n", value));
    }
    if let Some(value) = summary.trials.avg_abs_delta {
        output.push_str(&format!("- Avg |Δ suspicion|: {:.3}\n", value));
    }
    if let Some(value) = summary.trials.avg_choice_probability {
        output.push_str(&format!("- Avg choice probability: {:.3}\n", value));
    }
    for (label, count) in &summary.trials.outcome_counts {
        output.push_str(&format!("- Reported {}: {}\n", label, count));
    }
    output.push('\n');

    output.push_str("## Sessions\n");
    output.push_str(&format!("- Events: {}\n", summary.sessions.count));
    if let Some(value) = summary.sessions.avg_final_suspicion {
        output.push_str(&format!("- Avg final suspicion: {:.4}\n", value));
    }
    output.push('\n');

    output.push_str("## Fits\n");
    if summary.fits.count == 0 {
        output.push_str("- <none>\n");
    } else {
        output.push_str(&format!("- Events: {}\n", summary.fits.count));
        if let Some(value) = summary.fits.avg_mse {
            output.push_str(&format!("- Avg MSE: {:.5}\n", value));
        }
        if let Some(value) = summary.fits.avg_r_squared {
            output.push_str(&format!("- Avg R²: {:.4}\n", value));
        }
        output.push_str(&format!(
            "- Undefined R²: {}\n",
            summary.fits.undefined_r_squared
        ));
        output.push_str(&format!("- Optimiser calls: {}\n", summary.optimiser_calls));
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        file
    }

    #[test]
    fn summarises_trial_session_and_fit_events() {
        let lines = vec![
            r#"{"target":"luckycard::trial","fields":{"trial":1,"n_red":2,"outcome":1,"violation":0.4,"suspicion":0.3,"delta":0.3,"choice_probability":1.0}}"#,
            r#"{"target":"luckycard::trial","fields":{"trial":2,"n_red":4,"outcome":-1,"violation":-0.2,"suspicion":0.3,"delta":-0.1,"choice_probability":0.5}}"#,
            r#"{"target":"luckycard::session","fields":{"trials":2,"final_suspicion":0.3}}"#,
            r#"{"target":"luckycard::fit","fields":{"subject":0,"strategy":"grid","r_squared":"0.8123","mse":0.02}}"#,
            r#"{"target":"luckycard::fit","fields":{"subject":1,"strategy":"bayesian","r_squared":"undefined","mse":0.0}}"#,
            r#"{"target":"luckycard::bayes","fields":{"call":0,"value":1.5}}"#,
            r#"{"target":"other","fields":{}}"#,
        ];
        let file = write_temp_file(&lines);
        let summary = summarise_telemetry(file.path()).expect("summarise");
        assert_eq!(summary.trials.count, 2);
        assert!((summary.trials.avg_violation.unwrap() - 0.1).abs() < 1e-12);
        assert!((summary.trials.avg_abs_delta.unwrap() - 0.2).abs() < 1e-12);
        assert!((summary.trials.avg_choice_probability.unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(summary.trials.outcome_counts.get("blue"), Some(&1));
        assert_eq!(summary.trials.outcome_counts.get("red"), Some(&1));
        assert_eq!(summary.sessions.count, 1);
        assert_eq!(summary.fits.count, 2);
        assert!((summary.fits.avg_r_squared.unwrap() - 0.8123).abs() < 1e-12);
        assert_eq!(summary.fits.undefined_r_squared, 1);
        assert_eq!(summary.fits.strategy_counts.get("grid"), Some(&1));
        assert_eq!(summary.optimiser_calls, 1);
    }

    #[test]
    fn handles_missing_file() {
        let path = Path::new("tests/does/not/exist.jsonl");
        let summary = summarise_telemetry(path).expect("summarise missing file");
        assert_eq!(summary.trials.count, 0);
        assert!(summary.trials.avg_violation.is_none());
        assert!(summary.fits.strategy_counts.is_empty());
    }

    #[test]
    fn appends_highlights_to_summary_markdown() {
        let mut summary_file = tempfile::NamedTempFile::new().expect("summary temp file");
        writeln!(summary_file, "# Experiment Summary").expect("seed summary content");
        let telemetry_json = tempfile::NamedTempFile::new().expect("telemetry json temp");
        let telemetry_md = tempfile::NamedTempFile::new().expect("telemetry md temp");

        let mut outcome_counts = BTreeMap::new();
        outcome_counts.insert("blue".to_string(), 12);
        let mut strategy_counts = BTreeMap::new();
        strategy_counts.insert("bayesian".to_string(), 3);

        let outputs = TelemetryOutputs {
            summary: TelemetrySummary {
                trials: TrialTelemetrySummary {
                    count: 12,
                    avg_violation: Some(0.25),
                    avg_abs_delta: Some(0.125),
                    avg_choice_probability: Some(0.5),
                    outcome_counts,
                },
                sessions: SessionTelemetrySummary::default(),
                fits: FitTelemetrySummary {
                    count: 3,
                    avg_mse: Some(0.01),
                    avg_r_squared: Some(0.9),
                    undefined_r_squared: 0,
                    strategy_counts,
                },
                optimiser_calls: 120,
            },
            json_path: telemetry_json.path().to_path_buf(),
            markdown_path: telemetry_md.path().to_path_buf(),
        };

        append_highlights_to_markdown(summary_file.path(), &outputs).expect("append highlights");

        let contents = std::fs::read_to_string(summary_file.path()).expect("read summary file");
        assert!(contents.contains("## Telemetry Highlights"));
        assert!(contents.contains("Trial events captured: 12"));
        assert!(contents.contains("Avg expectation violation: 0.250"));
        assert!(contents.contains("blue: 12"));
        assert!(contents.contains("### Fits"));
        assert!(contents.contains("bayesian: 3"));
    }
}
