#![deny(missing_docs)]
//! # agr-core — Foundational Types for the Agreement Stack
//!
//! Shared primitives for the dispute-resolution engine and the disputable
//! apps built on it. Every other crate in the workspace depends on
//! `agr-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** Settings, actions, challenges, disputes and
//!    collateral requirements each get their own id type. You cannot pass a
//!    `ChallengeId` where an `ActionId` is expected.
//!
//! 2. **Checked token arithmetic.** `Amount` never wraps. Every addition and
//!    subtraction returns a `Result`, so balance bookkeeping fails loudly.
//!
//! 3. **Injected time.** The engine never reads the wall clock directly; it
//!    asks a [`Clock`]. Tests drive deadlines with [`MockClock`].
//!
//! 4. **Canonical digests.** Setting content hashes and dispute metadata are
//!    computed via `sha256_digest()` over `CanonicalBytes` only.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `agr-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod clock;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use amount::Amount;
pub use canonical::CanonicalBytes;
pub use clock::{Clock, MockClock, SystemClock};
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, CoreError};
pub use identity::{
    Account, ActionId, AgreementId, AppId, ChallengeId, CollateralRequirementId, DisputeId,
    SettingId, TokenId,
};
pub use temporal::Timestamp;
