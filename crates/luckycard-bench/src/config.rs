use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

use luckycard_core::ModelError;
use luckycard_core::game::{
    DEFAULT_SEED, NoiseSchedule, PlayMode, SessionConfig, UpdateRule,
};
use luckycard_core::model::player::PlayerConfig;
use luckycard_core::model::reward::RewardPolicy;
use luckycard_core::model::trial::{DEFAULT_CARD_POOL, TrialSpec};
use luckycard_fit::{
    FeatureConfig, FitError, FitStrategy, Normalization, PredictionModel, RatingScale,
};

const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root experiment configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    pub run_id: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub trials: TrialsConfig,
    pub player: PlayerConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub fit: Option<FitSection>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ExperimentConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: ExperimentConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.trials.validate()?;
        self.player.validate().map_err(ValidationError::from)?;
        self.session.validate()?;
        if let Some(fit) = self.fit.as_ref() {
            fit.validate()?;
        }
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Session settings for one Monte-Carlo run.
    pub fn session_config(&self, seed: u64) -> SessionConfig {
        self.session.to_session_config(seed)
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            fits_json: resolve_template(&self.run_id, &self.outputs.fits_json),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            plots_dir: resolve_template(&self.run_id, &self.outputs.plots_dir),
        }
    }
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Where the trial list comes from: a JSON file or inline records.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrialsConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub specs: Option<Vec<TrialSpec>>,
    #[serde(default = "default_n_cards")]
    pub n_cards: u32,
}

impl TrialsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match (&self.path, &self.specs) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::field(
                    "trials",
                    "set either trials.path or trials.specs, not both",
                ));
            }
            (None, None) => {
                return Err(ValidationError::field(
                    "trials",
                    "trials.path or trials.specs is required",
                ));
            }
            (Some(path), None) if path.trim().is_empty() => {
                return Err(ValidationError::field("trials.path", "path must not be empty"));
            }
            (None, Some(specs)) if specs.is_empty() => {
                return Err(ValidationError::field(
                    "trials.specs",
                    "at least one trial is required",
                ));
            }
            _ => {}
        }

        if self.n_cards == 0 {
            return Err(ValidationError::field(
                "trials.n_cards",
                "card pool must hold at least one card",
            ));
        }

        if let Some(specs) = &self.specs
            && let Some((index, spec)) = specs
                .iter()
                .enumerate()
                .find(|(_, spec)| spec.n_red > self.n_cards)
        {
            return Err(ValidationError::InvalidField {
                field: format!("trials.specs[{index}].n_red"),
                message: format!("{} red cards exceed the pool of {}", spec.n_red, self.n_cards),
            });
        }
        Ok(())
    }
}

fn default_n_cards() -> u32 {
    DEFAULT_CARD_POOL
}

/// Monte-Carlo and per-session settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default = "default_sessions")]
    pub n_sessions: usize,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub rule: UpdateRule,
    #[serde(default)]
    pub noise: NoiseSchedule,
    #[serde(default)]
    pub reward_policy: RewardPolicy,
    #[serde(default)]
    pub mode: PlayMode,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            n_sessions: default_sessions(),
            shuffle: false,
            rule: UpdateRule::default(),
            noise: NoiseSchedule::default(),
            reward_policy: RewardPolicy::default(),
            mode: PlayMode::default(),
        }
    }
}

impl SessionSection {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.runs == 0 {
            return Err(ValidationError::field(
                "session.runs",
                "number of runs must be greater than zero",
            ));
        }
        self.to_session_config(DEFAULT_SEED)
            .validate()
            .map_err(ValidationError::from)
    }

    fn to_session_config(&self, seed: u64) -> SessionConfig {
        SessionConfig {
            seed,
            shuffle: self.shuffle,
            n_sessions: self.n_sessions,
            rule: self.rule,
            noise: self.noise,
            reward_policy: self.reward_policy,
            mode: self.mode,
        }
    }
}

fn default_runs() -> usize {
    1
}

fn default_sessions() -> usize {
    1
}

/// Optional model-fitting block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FitSection {
    pub responses: String,
    #[serde(default)]
    pub scale: RatingScale,
    #[serde(default = "default_reverse")]
    pub reverse: bool,
    #[serde(default)]
    pub normalization: Normalization,
    /// Divisor for the normalised colour-run columns.
    #[serde(default = "default_colour_count_denominator")]
    pub colour_count_denominator: f64,
    pub model: PredictionModel,
    pub strategy: FitStrategy,
}

impl FitSection {
    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            normalization: self.normalization,
            colour_count_denominator: self.colour_count_denominator,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.responses.trim().is_empty() {
            return Err(ValidationError::field(
                "fit.responses",
                "path must not be empty",
            ));
        }
        self.scale
            .validate()
            .map_err(|err| fit_error("fit.scale", err))?;
        self.normalization
            .validate()
            .map_err(|err| fit_error("fit.normalization", err))?;
        self.feature_config()
            .validate()
            .map_err(|err| fit_error("fit.features", err))?;
        if let FitStrategy::Bayesian { space, .. } = &self.strategy {
            for (index, dimension) in space.iter().enumerate() {
                dimension
                    .validate()
                    .map_err(|err| fit_error(&format!("fit.strategy.space[{index}]"), err))?;
            }
        }
        self.strategy
            .validate(&self.model)
            .map_err(|err| fit_error("fit.strategy", err))
    }
}

fn default_reverse() -> bool {
    true
}

fn default_colour_count_denominator() -> f64 {
    FeatureConfig::default().colour_count_denominator
}

fn fit_error(field: &str, err: FitError) -> ValidationError {
    match err {
        FitError::InvalidSetting { field, message } => ValidationError::InvalidField {
            field: format!("fit.{field}"),
            message,
        },
        other => ValidationError::InvalidField {
            field: field.to_string(),
            message: other.to_string(),
        },
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    #[serde(default = "default_fits_json")]
    pub fits_json: String,
    pub summary_md: String,
    pub plots_dir: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.fits_json", &self.fits_json),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.plots_dir", &self.plots_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::field(label, "path must not be empty"));
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::field(label, "resolved path is invalid"));
            }
        }
        Ok(())
    }
}

fn default_fits_json() -> String {
    "bench/out/{run_id}/fits.json".to_string()
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::field("run_id", "run_id must not be empty"));
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::field(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub fits_json: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

impl ResolvedOutputs {
    /// Directory holding the summary, used for telemetry artefacts.
    pub fn summary_dir(&self) -> PathBuf {
        self.summary_md
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

impl ValidationError {
    fn field(field: &str, message: &str) -> Self {
        ValidationError::InvalidField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<ModelError> for ValidationError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidField { field, message } => {
                ValidationError::InvalidField { field, message }
            }
            other => ValidationError::InvalidField {
                field: "model".to_string(),
                message: other.to_string(),
            },
        }
    }
}
