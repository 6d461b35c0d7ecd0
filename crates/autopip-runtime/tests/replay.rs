use std::fs;
use std::path::PathBuf;

use autopip_core::config::Config;
use autopip_runtime::Scenario;

fn scenarios_dir() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../fixtures/scenarios")
}

fn load_scenarios() -> Vec<Scenario> {
    let dir = scenarios_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("cannot list {dir:?}: {e}"))
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|path| Scenario::load(path).unwrap_or_else(|e| panic!("{e}")))
        .collect()
}

#[tokio::test]
async fn test_all_scenarios() {
    let scenarios = load_scenarios();
    assert!(
        !scenarios.is_empty(),
        "no scenarios found in {:?}",
        scenarios_dir()
    );

    let mut failed = Vec::new();
    for scenario in &scenarios {
        let replay = scenario.replay(&Config::default()).await;
        if !replay.passed() {
            for problem in &replay.problems {
                eprintln!("FAIL: scenario '{}': {problem}", scenario.name);
            }
            for entry in &replay.trace {
                eprintln!("    +{}ms {}", entry.at_ms, entry.event);
            }
            failed.push(scenario.name.clone());
        }
    }

    eprintln!(
        "\nReplay results: {}/{} scenarios passed",
        scenarios.len() - failed.len(),
        scenarios.len()
    );
    assert!(failed.is_empty(), "failed scenarios: {failed:?}");
}

#[tokio::test]
async fn replays_are_deterministic() {
    for scenario in load_scenarios() {
        let first = scenario.replay(&Config::default()).await;
        let second = scenario.replay(&Config::default()).await;
        assert_eq!(first.trace, second.trace, "scenario {}", scenario.name);
    }
}

#[test]
fn base_config_is_overridden_by_scenario_overlay() {
    let scenario: Scenario = serde_json::from_value(serde_json::json!({
        "name": "overlay",
        "config": {"armMinutes": 3},
        "steps": []
    }))
    .unwrap();
    let base = Config {
        arm_minutes: 7,
        debounce_ms: 40,
        ..Config::default()
    };
    let effective = scenario.config(&base);
    assert_eq!(effective.arm_minutes, 3);
    assert_eq!(effective.debounce_ms, 40);
}
