use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use luckycard_core::model::colour::Colour;
use luckycard_core::model::trial::Trial;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Empirical divisor used by the earliest normalisation of simulated suspicion paths.
pub const LEGACY_DENOMINATOR: f64 = 5.4;
const DEFAULT_COLOUR_COUNT_DENOMINATOR: f64 = 5.0;

/// How a column is mapped onto a common scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// `(x - min) / (max - min)`; a constant column maps to zeros.
    #[default]
    MinMax,
    /// Shift so the minimum sits at zero, add `offset`, divide by `denominator`.
    Legacy {
        #[serde(default = "legacy_denominator")]
        denominator: f64,
        #[serde(default)]
        offset: f64,
    },
}

fn legacy_denominator() -> f64 {
    LEGACY_DENOMINATOR
}

impl Normalization {
    pub fn legacy() -> Self {
        Normalization::Legacy {
            denominator: LEGACY_DENOMINATOR,
            offset: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), FitError> {
        if let Normalization::Legacy { denominator, offset } = *self {
            if !denominator.is_finite() || denominator <= 0.0 {
                return Err(FitError::InvalidSetting {
                    field: "normalization.denominator".to_string(),
                    message: format!("{denominator} must be a positive number"),
                });
            }
            if !offset.is_finite() {
                return Err(FitError::InvalidSetting {
                    field: "normalization.offset".to_string(),
                    message: format!("{offset} is not finite"),
                });
            }
        }
        Ok(())
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        if values.is_empty() {
            return Vec::new();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        match *self {
            Normalization::MinMax => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                if range <= 0.0 {
                    return vec![0.0; values.len()];
                }
                values.iter().map(|v| (v - min) / range).collect()
            }
            Normalization::Legacy {
                denominator,
                offset,
            } => values
                .iter()
                .map(|v| (v + min.abs() + offset) / denominator)
                .collect(),
        }
    }
}

/// Knobs for deriving the feature table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default = "default_colour_count_denominator")]
    pub colour_count_denominator: f64,
}

fn default_colour_count_denominator() -> f64 {
    DEFAULT_COLOUR_COUNT_DENOMINATOR
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        self.normalization.validate()?;
        if !(self.colour_count_denominator.is_finite() && self.colour_count_denominator > 0.0) {
            return Err(FitError::InvalidSetting {
                field: "colour_count_denominator".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            colour_count_denominator: DEFAULT_COLOUR_COUNT_DENOMINATOR,
        }
    }
}

macro_rules! features {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Column of the derived trial table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Feature {
            $(#[serde(rename = $name)] $variant),+
        }

        impl Feature {
            pub const ALL: &'static [Feature] = &[$(Feature::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Feature::$variant => $name),+
                }
            }
        }

        impl FromStr for Feature {
            type Err = FitError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Feature::$variant),)+
                    other => Err(FitError::InvalidSetting {
                        field: "feature".to_string(),
                        message: format!("unknown column '{other}'"),
                    }),
                }
            }
        }
    };
}

features! {
    Trial => "trial",
    NRed => "n_red",
    NBlue => "n_blue",
    Outcome => "outcome",
    SignedViolation => "e_v",
    UnsignedViolation => "unsigned_e_v",
    NormedSignedViolation => "normed_signed_e_v",
    NormedUnsignedViolation => "normed_unsigned_e_v",
    CumulativeSignedViolation => "cs_signed_e_v",
    NormedCumulativeSignedViolation => "normed_cs_signed_e_v",
    CumulativeUnsignedViolation => "cs_unsigned_e_v",
    NormedCumulativeUnsignedViolation => "normed_cs_unsigned_e_v",
    ColourRun => "n_consec_colour",
    SignedColourRun => "signed_n_consec_colour",
    NormedSignedColourRun => "normed_signed_colour_count",
    NormedUnsignedColourRun => "normed_unsigned_colour_count",
    ReportedColourCount => "n_reported_colour_opp",
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per trial, one column per [`Feature`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    trials: Vec<Trial>,
    columns: BTreeMap<Feature, Vec<f64>>,
}

impl FeatureTable {
    pub fn from_trials(trials: &[Trial], config: &FeatureConfig) -> Result<Self, FitError> {
        if trials.is_empty() {
            return Err(FitError::EmptyObservations);
        }
        config.validate()?;

        let n = trials.len();
        let mut outcomes = Vec::with_capacity(n);
        let mut signed = Vec::with_capacity(n);
        let mut unsigned = Vec::with_capacity(n);
        for trial in trials {
            outcomes.push(trial.outcome()?);
            signed.push(trial.exp_violation()?);
            unsigned.push(trial.unsigned_violation()?);
        }

        let runs = colour_runs(&outcomes);
        let signed_runs: Vec<f64> = runs
            .iter()
            .zip(&outcomes)
            .map(|(run, colour)| run * colour.sign())
            .collect();
        let cs_signed = cumulative(&signed);
        let cs_unsigned = cumulative(&unsigned);
        let norm = config.normalization;

        let mut columns = BTreeMap::new();
        columns.insert(Feature::Trial, (1..=n).map(|i| i as f64).collect());
        columns.insert(
            Feature::NRed,
            trials.iter().map(|t| t.n_red() as f64).collect(),
        );
        columns.insert(
            Feature::NBlue,
            trials.iter().map(|t| t.n_blue() as f64).collect(),
        );
        columns.insert(
            Feature::Outcome,
            outcomes.iter().map(|c| c.sign()).collect(),
        );
        columns.insert(Feature::NormedSignedViolation, norm.apply(&signed));
        columns.insert(Feature::NormedUnsignedViolation, norm.apply(&unsigned));
        columns.insert(Feature::NormedCumulativeSignedViolation, norm.apply(&cs_signed));
        columns.insert(
            Feature::NormedCumulativeUnsignedViolation,
            norm.apply(&cs_unsigned),
        );
        columns.insert(Feature::NormedSignedColourRun, norm.apply(&signed_runs));
        columns.insert(
            Feature::NormedUnsignedColourRun,
            runs.iter()
                .map(|run| run / config.colour_count_denominator)
                .collect(),
        );
        columns.insert(Feature::ReportedColourCount, reported_counts(&outcomes));
        columns.insert(Feature::SignedViolation, signed);
        columns.insert(Feature::UnsignedViolation, unsigned);
        columns.insert(Feature::CumulativeSignedViolation, cs_signed);
        columns.insert(Feature::CumulativeUnsignedViolation, cs_unsigned);
        columns.insert(Feature::ColourRun, runs);
        columns.insert(Feature::SignedColourRun, signed_runs);

        Ok(Self {
            trials: trials.to_vec(),
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn column(&self, feature: Feature) -> &[f64] {
        self.columns
            .get(&feature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Row `index` as `(column name, value)` pairs.
    pub fn row(&self, index: usize) -> Vec<(&'static str, f64)> {
        self.columns
            .iter()
            .filter_map(|(feature, values)| values.get(index).map(|v| (feature.as_str(), *v)))
            .collect()
    }
}

/// Length of the current run of identical reports, counting the current trial.
fn colour_runs(outcomes: &[Colour]) -> Vec<f64> {
    let mut runs: Vec<f64> = Vec::with_capacity(outcomes.len());
    for (i, colour) in outcomes.iter().enumerate() {
        let run = match i.checked_sub(1) {
            Some(prev) if outcomes[prev] == *colour => runs[prev] + 1.0,
            _ => 1.0,
        };
        runs.push(run);
    }
    runs
}

fn reported_counts(outcomes: &[Colour]) -> Vec<f64> {
    let mut red = 0.0;
    let mut blue = 0.0;
    outcomes
        .iter()
        .map(|colour| match colour {
            Colour::Red => {
                red += 1.0;
                red
            }
            Colour::Blue => {
                blue += 1.0;
                blue
            }
        })
        .collect()
}

fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}
