//! Loaders for trial lists and recorded rating series.

use std::fs;
use std::path::{Path, PathBuf};

use luckycard_core::ModelError;
use luckycard_core::data::GameResponses;
use luckycard_core::model::trial::{Trial, TrialSpec};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid record in {path:?}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("response series {index} in {path:?}: {message}")]
    Response {
        path: PathBuf,
        index: usize,
        message: String,
    },
    #[error("{0}")]
    Model(#[from] ModelError),
}

fn read(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a JSON array of trial records.
pub fn load_trial_specs(path: &Path) -> Result<Vec<TrialSpec>, InputError> {
    let text = read(path)?;
    TrialSpec::parse_array(&text).map_err(|source| InputError::Record {
        path: path.to_path_buf(),
        source,
    })
}

/// Materialises specs against a pool size, drawing absent outcomes from `rng`.
pub fn resolve_trials<R: Rng + ?Sized>(
    specs: &[TrialSpec],
    n_cards: u32,
    rng: &mut R,
) -> Result<Vec<Trial>, InputError> {
    let trials = specs
        .iter()
        .map(|spec| spec.resolve(n_cards, rng))
        .collect::<Result<Vec<_>, _>>()?;
    for trial in &trials {
        trial.expectation()?;
    }
    Ok(trials)
}

/// Reads rating series, one per subject.
///
/// Accepts a JSON array whose entries are either plain arrays of numbers or
/// stored game-response objects, in which case `honestyRating` is used. A
/// single game-response object is read as one subject.
pub fn load_responses(path: &Path) -> Result<Vec<Vec<f64>>, InputError> {
    let text = read(path)?;
    let value: Value = serde_json::from_str(&text).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = match value {
        Value::Array(entries) => entries,
        object @ Value::Object(_) => vec![object],
        _ => {
            return Err(InputError::Response {
                path: path.to_path_buf(),
                index: 0,
                message: "expected an array of series or a response object".to_string(),
            });
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_series(path, index, entry))
        .collect()
}

fn parse_series(path: &Path, index: usize, entry: &Value) -> Result<Vec<f64>, InputError> {
    match entry {
        Value::Array(values) => values
            .iter()
            .map(|value| {
                value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| InputError::Response {
                        path: path.to_path_buf(),
                        index,
                        message: format!("{value} is not a number"),
                    })
            })
            .collect(),
        Value::Object(_) => {
            let responses =
                GameResponses::from_value(entry).map_err(|source| InputError::Record {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(responses.honesty_rating)
        }
        other => Err(InputError::Response {
            path: path.to_path_buf(),
            index,
            message: format!("unsupported entry {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Write;

    fn temp_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "{contents}").expect("write json");
        file
    }

    #[test]
    fn loads_and_resolves_trial_file() {
        let file = temp_json(r#"[{"n_red": 2, "outcome": 1}, {"n_red": 3, "block": "a"}]"#);
        let specs = load_trial_specs(file.path()).expect("specs");
        assert_eq!(specs.len(), 2);
        assert!(specs[1].extras.contains_key("block"));

        let mut rng = StdRng::seed_from_u64(42);
        let trials = resolve_trials(&specs, 5, &mut rng).expect("trials");
        assert!((trials[0].expectation().unwrap() - 0.6).abs() < 1e-12);
        assert!([-1, 1].contains(&trials[1].outcome_value()));
    }

    #[test]
    fn missing_n_red_is_reported() {
        let file = temp_json(r#"[{"outcome": 1}]"#);
        let err = load_trial_specs(file.path()).expect_err("missing field");
        assert!(matches!(
            err,
            InputError::Record {
                source: ModelError::MissingField { field: "n_red", .. },
                ..
            }
        ));
    }

    #[test]
    fn invalid_outcome_is_rejected_on_resolve() {
        let specs = vec![TrialSpec::new(2, Some(0))];
        let mut rng = StdRng::seed_from_u64(1);
        let err = resolve_trials(&specs, 5, &mut rng).expect_err("outcome 0");
        assert!(matches!(err, InputError::Model(ModelError::InvalidOutcome(0))));
    }

    #[test]
    fn loads_plain_series() {
        let file = temp_json("[[1, 2, 3], [6, 5.5, 0]]");
        let responses = load_responses(file.path()).expect("responses");
        assert_eq!(responses, vec![vec![1.0, 2.0, 3.0], vec![6.0, 5.5, 0.0]]);
    }

    #[test]
    fn loads_game_response_objects() {
        let record = r#"{
            "randomPick": [1, 2], "randomPickColour": [-1, 1], "reportColour": [1, 1],
            "RTreport": [500, 420], "honestyRating": [4, 2], "RThonesty": [900, 650],
            "results": [1, -1], "catchRating": [0, 1], "RTcatch": [300, 310]
        }"#;
        let file = temp_json(&format!("[{record}]"));
        let responses = load_responses(file.path()).expect("responses");
        assert_eq!(responses, vec![vec![4.0, 2.0]]);

        let single = temp_json(record);
        assert_eq!(load_responses(single.path()).expect("single"), vec![vec![4.0, 2.0]]);
    }

    #[test]
    fn rejects_non_numeric_ratings() {
        let file = temp_json(r#"[[1, "high"]]"#);
        let err = load_responses(file.path()).expect_err("non numeric");
        assert!(matches!(err, InputError::Response { index: 0, .. }));
    }
}
