#![deny(missing_docs)]
//! # agr-agreement — Collateral-Backed Dispute Engine
//!
//! An [`Agreement`] binds the participants of a set of disputable apps to a
//! versioned text and an arbitrator. Apps submit actions on behalf of their
//! users; every action locks collateral; anyone the app allows may
//! challenge an action by escrowing collateral of their own; the submitter
//! either settles or raises a dispute; the arbitrator's ruling decides who
//! keeps what.
//!
//! ## Module map
//!
//! - [`setting`]: append-only agreement versions and signer marks.
//! - [`collateral`], [`registry`]: per-app collateral terms and
//!   registration state.
//! - [`action`], [`challenge`]: the two state machines, built on
//!   [`lifecycle`].
//! - [`engine`]: the controller.
//! - [`custody`], [`arbitrator`], [`disputable`]: the adapters the engine
//!   talks to.
//! - [`paths`], [`events`]: read-side views.
//!
//! ## Crate Policy
//!
//! - Every entry point either commits in full or returns an error with no
//!   effect on the engine or the custody ledger.
//! - App callbacks never roll back committed transitions.
//! - No `.unwrap()` outside tests.

pub mod action;
pub mod arbitrator;
pub mod challenge;
pub mod collateral;
pub mod config;
pub mod custody;
pub mod disputable;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod paths;
pub mod registry;
pub mod setting;

// Re-export primary types for ergonomic imports.
pub use action::{Action, ActionState, SubmissionKind};
pub use arbitrator::{Arbitrator, ArbitratorFees, InMemoryArbitrator, Ruling};
pub use challenge::{Challenge, ChallengeState, FeeDeposit};
pub use collateral::{CollateralRequirement, CollateralRequirementInput};
pub use config::{AgreementConfig, ArbitratorConfig, ConfigError};
pub use custody::{Custody, CustodyBatch, CustodyOp, InMemoryCustody, StakeBalance};
pub use disputable::{DisputableApp, GenericActionStatus, GenericDisputable, Notification};
pub use engine::Agreement;
pub use error::{AgreementError, ArbitratorError, CustodyError, DisputableError, ErrorKind};
pub use events::{Event, EventRecord};
pub use lifecycle::{advance, LifecycleState, TransitionRecord};
pub use paths::AllowedPaths;
pub use registry::{DisputableInfo, DisputableState};
pub use setting::{Setting, SignerInfo};
