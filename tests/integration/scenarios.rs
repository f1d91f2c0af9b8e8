//! Bundled scenario and config file tests

use ratchet::scenarios::{run, Scenario};
use ratchet::util::config::{load_config, load_default_config, save_config, CONFIG_ENV};
use ratchet::EngineConfig;

use crate::support::*;

#[tokio::test(start_paused = true)]
async fn test_errors_scenario() {
    local(async {
        let report = run(Scenario::Errors, EngineConfig::default()).await.unwrap();
        assert_eq!(report.frames, vec!["", "0", "1"]);
        assert_eq!(
            report.notes,
            vec!["render 1: ok", "render 2: ok", "render 3: sync generator throws"]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_scenario() {
    local(async {
        let report = run(Scenario::Restart, EngineConfig::default()).await.unwrap();
        assert_eq!(
            report.frames,
            vec![
                "",
                "<div>1</div>",
                "<div>2</div>",
                "<div>3</div>",
                "<div>Restarting</div>",
                "<div>1</div>",
            ]
        );
        assert_eq!(report.notes.last().map(String::as_str), Some("render 5: caught 1"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_suspense_scenario() {
    local(async {
        let report = run(Scenario::Suspense, EngineConfig::default()).await.unwrap();
        assert_eq!(
            report.frames,
            vec!["", "<span>Loading...</span>", "<span>Child 200</span>"]
        );
        assert_eq!(
            report.notes,
            vec![
                "settled at: <span>Loading...</span>",
                "after 250ms: <span>Child 200</span>",
            ]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_coalesce_scenario() {
    local(async {
        let report = run(Scenario::Coalesce, EngineConfig::default()).await.unwrap();
        assert_eq!(report.frames, vec!["", "1", "2", "3"]);
        assert_eq!(report.executions, 3);
    })
    .await;
}

#[test]
fn test_scenario_names() {
    assert_eq!(Scenario::Coalesce.to_string(), "coalesce");
    assert_eq!(Scenario::Errors.to_string(), "errors");
}

#[test]
fn test_config_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ratchet.ron");
    let config = EngineConfig {
        strict_keys: false,
        max_resumptions: 64,
        trace_effects: true,
    };
    save_config(&path, &config).unwrap();

    std::env::set_var(CONFIG_ENV, &path);
    let loaded = load_default_config();
    std::env::remove_var(CONFIG_ENV);
    assert_eq!(loaded.unwrap(), config);
}

#[test]
fn test_config_file_missing_fields_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.ron");
    std::fs::write(&path, "(max_resumptions: 16)").unwrap();
    let config = load_config(&path).unwrap();
    assert_eq!(config.max_resumptions, 16);
    assert!(config.strict_keys);
}
