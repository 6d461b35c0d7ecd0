//! `autopip replay`: run a scenario and print its trace.

use std::path::Path;

use chrono::{DateTime, SecondsFormat};

use autopip_core::config::Config;
use autopip_runtime::sim::SIM_EPOCH_MS;
use autopip_runtime::{Replay, Scenario, TraceEntry};

pub async fn cmd_replay(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    let replay = scenario.replay(config).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&replay)?);
    } else {
        println!("{}", format_replay(&scenario, &replay));
    }

    if !replay.passed() {
        anyhow::bail!(
            "scenario {} failed {} expectation(s)",
            replay.name,
            replay.problems.len()
        );
    }
    Ok(())
}

fn format_replay(scenario: &Scenario, replay: &Replay) -> String {
    let mut lines = vec![format!("scenario: {}", scenario.name)];
    if !scenario.description.is_empty() {
        lines.push(format!("  {}", scenario.description));
    }
    lines.extend(replay.trace.iter().map(format_entry));
    if replay.passed() {
        lines.push("PASS".to_string());
    } else {
        lines.extend(replay.problems.iter().map(|p| format!("FAIL: {p}")));
    }
    lines.join("\n")
}

fn format_entry(entry: &TraceEntry) -> String {
    format!(
        "{}  +{:>6}ms  {}",
        virtual_timestamp(entry.at_ms),
        entry.at_ms,
        entry.event
    )
}

/// Wall-clock rendering of a virtual offset.
fn virtual_timestamp(at_ms: u64) -> String {
    i64::try_from(SIM_EPOCH_MS.saturating_add(at_ms))
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("+{at_ms}ms"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopip_core::types::TabId;
    use autopip_runtime::TraceEvent;

    #[test]
    fn virtual_timestamps_start_at_the_sim_epoch() {
        assert_eq!(virtual_timestamp(0), "2026-02-25T12:00:00.000Z");
        assert_eq!(virtual_timestamp(5_100), "2026-02-25T12:00:05.100Z");
    }

    #[test]
    fn entry_line_shows_offset_and_event() {
        let line = format_entry(&TraceEntry {
            at_ms: 600,
            event: TraceEvent::Injected { tab: TabId(3) },
        });
        assert_eq!(line, "2026-02-25T12:00:00.600Z  +   600ms  tab 3: engine injected");
    }
}
