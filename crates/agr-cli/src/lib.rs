//! # agr-cli — Scenario Driver for the Agreement Stack
//!
//! Provides the `agreement` command-line interface. Scenarios are YAML
//! scripts replayed against an in-memory engine with a manual clock, an
//! in-memory custody ledger and a local arbitrator.
//!
//! ## Subcommands
//!
//! - `agreement run` — Replay a scenario and print balances, step
//!   outcomes and events, optionally followed by a metrics snapshot.
//! - `agreement validate` — Structural checks on scenario files.
//!
//! ```bash
//! agreement run scenarios/settle.yaml
//! agreement run scenarios/dispute.yaml --format json --metrics
//! agreement --config agreement.yaml validate scenarios/*.yaml
//! ```

pub mod run;
pub mod scenario;
pub mod validate;
