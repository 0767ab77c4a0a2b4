#![deny(missing_docs)]
//! # agr-delay — Time-Delayed Disputable App
//!
//! Actions submitted through [`Delay`] wait out a fixed delay before they
//! may execute. While they wait, they can be challenged through the
//! agreement engine like any other action; the outcome of the challenge
//! decides whether execution proceeds.

pub mod config;
pub mod delay;
pub mod error;

// Re-export primary types for ergonomic imports.
pub use config::DelayConfig;
pub use delay::{Delay, DelayPaths, DelayState, Delayable};
pub use error::DelayError;
