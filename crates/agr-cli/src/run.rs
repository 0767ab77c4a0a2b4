//! # `agreement run`
//!
//! Replays a scenario file and prints the report. The exit code is 0 when
//! every step behaved as declared and every balance check held, 1
//! otherwise.
//!
//! Metrics emitted during the replay are captured by a Prometheus recorder
//! scoped to the replay; `--metrics` prints the rendered snapshot after the
//! report.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;

use agr_agreement::AgreementConfig;

use crate::scenario::{Scenario, ScenarioReport, ScenarioRunner};

/// Arguments for the `agreement run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (YAML).
    pub scenario: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Print the Prometheus metrics snapshot after the report.
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary.
    Text,
    /// The full report, including events, as JSON.
    Json,
}

/// Execute the run subcommand.
pub fn run_run(args: &RunArgs, config: Option<&Path>) -> Result<u8> {
    let scenario = load_scenario(&args.scenario, config)?;

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let report = metrics::with_local_recorder(&recorder, || ScenarioRunner::run(&scenario))
        .with_context(|| format!("failed to set up scenario {}", args.scenario.display()))?;

    println!("{}", render(&report, args.format)?);
    if args.metrics {
        println!("{}", handle.render());
    }

    if report.passed() {
        Ok(0)
    } else {
        tracing::warn!(scenario = %args.scenario.display(), "scenario failed");
        Ok(1)
    }
}

/// Read, merge and validate a scenario file. `config`, when given, replaces
/// the scenario's own `agreement` section.
pub fn load_scenario(path: &Path, config: Option<&Path>) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let mut scenario = Scenario::from_yaml_str(&raw)
        .with_context(|| format!("failed to parse scenario {}", path.display()))?;

    if let Some(config_path) = config {
        let raw = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config {}", config_path.display()))?;
        let agreement = AgreementConfig::from_yaml_str(&raw)
            .with_context(|| format!("invalid config {}", config_path.display()))?;
        scenario = scenario.with_agreement(agreement);
    }

    scenario
        .validate()
        .with_context(|| format!("invalid scenario {}", path.display()))?;
    tracing::debug!(
        scenario = %path.display(),
        steps = scenario.steps.len(),
        apps = scenario.apps.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

pub fn render(report: &ScenarioReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Text => Ok(render_text(report)),
    }
}

fn render_text(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let name = report.name.as_deref().unwrap_or("(unnamed)");
    let _ = writeln!(out, "Scenario: {name}");
    let _ = writeln!(out, "  Agreement: {}", report.agreement);
    let _ = writeln!(out, "  Finished at: {}", report.finished_at);

    let _ = writeln!(out, "Steps ({}):", report.steps.len());
    for step in &report.steps {
        let mark = if step.passed { "ok" } else { "FAIL" };
        let code = step.code.map(|c| format!(" [{c}]")).unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:>3} {:<4} {:<14}{code} {}",
            step.index, mark, step.op, step.detail
        );
    }

    let _ = writeln!(out, "Balances:");
    for line in &report.balances {
        let _ = writeln!(
            out,
            "  {} {}: wallet={} available={} locked={} challenged={}",
            line.account, line.token, line.wallet, line.available, line.locked, line.challenged
        );
    }

    if !report.checks.is_empty() {
        let _ = writeln!(out, "Checks:");
        for check in &report.checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            let _ = writeln!(
                out,
                "  {mark:<4} {} {}: {}",
                check.account, check.token, check.detail
            );
        }
    }

    let _ = writeln!(out, "Events: {}", report.events.len());
    let _ = write!(
        out,
        "Result: {}",
        if report.passed() { "PASSED" } else { "FAILED" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name: challenge-and-settle
agreement:
  title: Community covenant
  arbitrator: { account: court, fee_token: DAI, fee_amount: 30 }
wallets:
  - { account: bob, token: DAI, amount: 100 }
  - { account: bob, token: ANT, amount: 500 }
stakes:
  - { account: alice, token: ANT, amount: 1000 }
apps:
  - id: voting
    collateral: { token: ANT, action_collateral: 200, challenge_collateral: 100, challenge_duration_secs: 600 }
steps:
  - { op: sign, signer: alice }
  - { op: submit, app: voting, submitter: alice }
  - { op: challenge, action: 1, challenger: bob, offer: 50 }
  - { op: settle, action: 1, caller: alice }
checks:
  - { account: alice, token: ANT, available: 950, locked: 0 }
"#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn args(scenario: PathBuf, format: ReportFormat) -> RunArgs {
        RunArgs {
            scenario,
            format,
            metrics: false,
        }
    }

    #[test]
    fn run_passing_scenario_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "settle.yaml", SCENARIO);
        let result = run_run(&args(path, ReportFormat::Text), None);
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn run_failing_check_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bad.yaml",
            &SCENARIO.replace("available: 950", "available: 951"),
        );
        let result = run_run(&args(path, ReportFormat::Json), None);
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn run_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_run(&args(dir.path().join("nope.yaml"), ReportFormat::Text), None);
        assert!(result.unwrap_err().to_string().contains("failed to read scenario"));
    }

    #[test]
    fn config_file_replaces_agreement_section() {
        let dir = tempfile::tempdir().unwrap();
        let body = SCENARIO
            .lines()
            .filter(|l| !l.starts_with("agreement:") && !l.starts_with("  title:") && !l.starts_with("  arbitrator:"))
            .collect::<Vec<_>>()
            .join("\n");
        let path = write(dir.path(), "body.yaml", &body);
        assert!(load_scenario(&path, None).is_err());

        let config = write(
            dir.path(),
            "agreement.yaml",
            "title: Override\narbitrator: { account: court, fee_token: DAI, fee_amount: 30 }\n",
        );
        let scenario = load_scenario(&path, Some(&config)).unwrap();
        assert_eq!(scenario.agreement.unwrap().title, "Override");
    }

    #[test]
    fn text_report_lists_steps_and_balances() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        let report = ScenarioRunner::run(&scenario).unwrap();
        let text = render(&report, ReportFormat::Text).unwrap();
        assert!(text.contains("Scenario: challenge-and-settle"));
        assert!(text.contains("settle"));
        assert!(text.contains("alice ANT: wallet=0 available=950 locked=0 challenged=0"));
        assert!(text.ends_with("Result: PASSED"));
    }

    #[test]
    fn json_report_carries_events() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        let report = ScenarioRunner::run(&scenario).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&render(&report, ReportFormat::Json).unwrap()).unwrap();
        let events = json["events"].as_array().unwrap();
        assert!(events
            .iter()
            .any(|e| e["event"]["type"] == "action_settled"));
    }

    #[test]
    fn metrics_are_captured_per_replay() {
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || ScenarioRunner::run(&scenario)).unwrap();
        let rendered = handle.render();
        assert!(rendered.contains("agreement_actions_submitted_total 1"));
        assert!(rendered.contains("agreement_challenges_settled_total 1"));
    }
}
