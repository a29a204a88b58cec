// Runs in its own process: the structured subscriber is global and can only be installed once.

use luckycard_bench::config::ExperimentConfig;
use luckycard_bench::experiment::ExperimentRunner;
use luckycard_bench::logging::init_logging;
use tempfile::tempdir;

fn structured_config(dir: &std::path::Path) -> ExperimentConfig {
    let yaml = format!(
        r#"
run_id: "telemetry_flush"
seed: 17
trials:
  specs:
    - {{ n_red: 2, outcome: 1 }}
    - {{ n_red: 4, outcome: -1 }}
    - {{ n_red: 1, outcome: 1 }}
    - {{ n_red: 3, outcome: -1 }}
player:
  alpha: 0.4
session:
  runs: 5
  n_sessions: 2
fit:
  responses: "{responses}"
  model: {{ kind: single, regressor: e_v }}
  strategy:
    kind: grid
    candidates: [[0.0, 0.5], [0.5, 0.5], [1.0, 0.0]]
outputs:
  jsonl: "{out}/trials.jsonl"
  fits_json: "{out}/fits.json"
  summary_md: "{out}/summary.md"
  plots_dir: "{out}/plots"
logging:
  enable_structured: true
  tracing_level: "debug"
"#,
        responses = dir.join("ratings.json").display(),
        out = dir.join("out").display(),
    );
    let mut cfg: ExperimentConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

#[test]
fn telemetry_summary_sees_every_event_once_the_guard_is_dropped() {
    let dir = tempdir().expect("temp dir");
    std::fs::write(dir.path().join("ratings.json"), "[[5, 4, 3, 2], [1, 2, 3, 4]]")
        .expect("write ratings");

    let config = structured_config(dir.path());
    let outputs = config.resolved_outputs();
    let guard = init_logging(&config.logging, &outputs)
        .expect("logging installs")
        .expect("structured logging enabled");
    let telemetry_path = guard.telemetry_path.clone();

    let runner = ExperimentRunner::new(config, outputs).expect("runner created");
    let mut summary = runner.run().expect("experiment completes");
    assert_eq!(summary.telemetry_path.as_ref(), Some(&telemetry_path));
    assert!(summary.telemetry_outputs.is_none());

    drop(guard);
    summary.summarise_telemetry().expect("telemetry summarised");

    let telemetry = summary
        .telemetry_outputs
        .as_ref()
        .expect("telemetry outputs written");
    assert_eq!(telemetry.summary.trials.count, summary.rows_written);
    assert_eq!(telemetry.summary.trials.count, 40);
    assert_eq!(telemetry.summary.sessions.count, 5);
    assert_eq!(telemetry.summary.fits.count, 2);
    assert!(telemetry.json_path.exists());

    let markdown = std::fs::read_to_string(&summary.summary_path).expect("summary markdown");
    assert!(markdown.contains("Telemetry"));
}
