//! # `agreement validate`
//!
//! Parses and structurally validates scenario files without replaying
//! them: configuration present and valid, apps declared once, and every
//! step naming an app of the right kind.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::run::load_scenario;

/// Arguments for the `agreement validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Scenario files to check.
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,
}

/// Execute the validate subcommand. Returns 1 if any file is invalid.
pub fn run_validate(args: &ValidateArgs, config: Option<&Path>) -> Result<u8> {
    let mut failures = 0usize;
    for path in &args.scenarios {
        match load_scenario(path, config) {
            Ok(scenario) => println!(
                "OK: {} ({} apps, {} steps, {} checks)",
                path.display(),
                scenario.apps.len(),
                scenario.steps.len(),
                scenario.checks.len()
            ),
            Err(e) => {
                eprintln!("FAIL: {e:#}");
                failures += 1;
            }
        }
    }

    if failures == 0 {
        Ok(0)
    } else {
        eprintln!("{failures} of {} scenario(s) invalid", args.scenarios.len());
        Ok(1)
    }
}
