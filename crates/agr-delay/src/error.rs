//! # Delay Errors

use agr_agreement::AgreementError;
use agr_core::CoreError;
use thiserror::Error;

/// Errors returned by the Delay app.
#[derive(Error, Debug)]
pub enum DelayError {
    /// Unknown delayable id.
    #[error("delayable {0} does not exist")]
    DelayableDoesNotExist(u64),

    /// Not scheduled, still on hold, too early, or the action is not closable.
    #[error("delayable {0} cannot be executed")]
    CannotExecute(u64),

    /// Already executed or stopped, or the action is not closable.
    #[error("delayable {0} cannot be stopped")]
    CannotStop(u64),

    /// Not in the `Scheduled` state.
    #[error("delayable {0} cannot be paused")]
    CannotPause(u64),

    /// Not paused by the submitter.
    #[error("delayable {0} cannot be resumed")]
    CannotResume(u64),

    /// Only the submitter may stop, pause or resume.
    #[error("{sender} is not allowed to {operation}")]
    SenderNotAllowed {
        /// The refused caller.
        sender: String,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// Invalid YAML or configuration values.
    #[error("invalid delay config: {0}")]
    Config(String),

    /// The engine refused the backing action operation.
    #[error(transparent)]
    Agreement(#[from] AgreementError),

    /// Timestamp arithmetic failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DelayError {
    /// Stable failure code. Engine errors keep the engine's code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DelayableDoesNotExist(_) => "DELAY_DELAYABLE_DOES_NOT_EXIST",
            Self::CannotExecute(_) => "DELAY_CANNOT_EXECUTE_DELAYABLE",
            Self::CannotStop(_) => "DELAY_CANNOT_STOP_DELAYABLE",
            Self::CannotPause(_) => "DELAY_CANNOT_PAUSE_DELAYABLE",
            Self::CannotResume(_) => "DELAY_CANNOT_RESUME_DELAYABLE",
            Self::SenderNotAllowed { .. } => "DELAY_SENDER_NOT_ALLOWED",
            Self::Config(_) => "DELAY_INVALID_CONFIG",
            Self::Agreement(e) => e.code(),
            Self::Core(_) => "DELAY_INTERNAL",
        }
    }
}
