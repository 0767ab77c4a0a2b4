//! # Error Types
//!
//! Every engine entry point either commits in full or fails with an
//! [`AgreementError`] and no partial effect. Errors are grouped by
//! [`ErrorKind`] so callers can tell an authorization failure from a state
//! conflict or a custody shortfall, and each variant carries a stable
//! [`code`](AgreementError::code) for scenario files and logs.

use agr_core::{
    Account, ActionId, Amount, AppId, ChallengeId, CollateralRequirementId, CoreError, DisputeId,
    SettingId, TokenId,
};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The caller lacks the role the operation requires.
    Authorization,
    /// The target does not exist or its state forbids the transition.
    State,
    /// The custody ledger refused a lock, unlock, slash or transfer.
    Custody,
    /// The signer has not accepted the current setting.
    AgreementBinding,
    /// The disputable app registry refused the request.
    Registry,
    /// The arbitrator refused or has not answered yet.
    Arbitration,
    /// Arithmetic or canonicalization failure.
    Internal,
}

impl ErrorKind {
    /// Stable upper-case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorization => "AUTHORIZATION",
            Self::State => "STATE",
            Self::Custody => "CUSTODY",
            Self::AgreementBinding => "AGREEMENT_BINDING",
            Self::Registry => "REGISTRY",
            Self::Arbitration => "ARBITRATION",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the engine.
#[derive(Error, Debug)]
pub enum AgreementError {
    // ── Authorization ───────────────────────────────────────────────
    /// The caller does not hold the role the operation needs.
    #[error("{sender} is not allowed to {operation}")]
    SenderNotAllowed {
        /// The refused caller.
        sender: String,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The disputable app's allow-check refused the challenger.
    #[error("disputable app does not allow {challenger} to challenge {action_id}")]
    SenderCannotChallengeAction {
        /// Action that was to be challenged.
        action_id: ActionId,
        /// The refused challenger.
        challenger: Account,
    },

    // ── Agreement binding ───────────────────────────────────────────
    /// The signer has not signed the current setting.
    #[error("{signer} must sign {setting_id} before acting")]
    MustSign {
        /// Signer that must sign.
        signer: Account,
        /// Setting awaiting their signature.
        setting_id: SettingId,
    },

    /// The signer already signed the current setting.
    #[error("{signer} already signed {setting_id}")]
    AlreadySigned {
        /// Signer.
        signer: Account,
        /// Setting already signed.
        setting_id: SettingId,
    },

    // ── Registry ────────────────────────────────────────────────────
    /// The app is already registered or still unregistering.
    #[error("disputable app {0} is already registered")]
    DisputableAppAlreadyExists(AppId),

    /// The app is not in the `Registered` state.
    #[error("disputable app {0} is not registered")]
    DisputableAppNotRegistered(AppId),

    /// No collateral requirement with that id for the app.
    #[error("collateral requirement {id} does not exist for {app}")]
    MissingCollateralRequirement {
        /// App the lookup ran against.
        app: AppId,
        /// Missing requirement id.
        id: CollateralRequirementId,
    },

    /// Unknown setting id.
    #[error("{0} does not exist")]
    SettingDoesNotExist(SettingId),

    /// No setting binds the arbitrator.
    #[error("arbitrator {0} is not bound to any setting")]
    ArbitratorNotBound(Account),

    // ── State ───────────────────────────────────────────────────────
    /// Unknown action id.
    #[error("{0} does not exist")]
    ActionDoesNotExist(ActionId),

    /// Unknown challenge id.
    #[error("{0} does not exist")]
    ChallengeDoesNotExist(ChallengeId),

    /// No challenge is bound to the dispute.
    #[error("{0} does not exist")]
    DisputeDoesNotExist(DisputeId),

    /// The action cannot be challenged right now.
    #[error("cannot challenge {action_id}: {reason}")]
    CannotChallenge {
        /// Action that was to be challenged.
        action_id: ActionId,
        /// Why the challenge was refused.
        reason: &'static str,
    },

    /// The action is challenged, already closed, or not closable by the caller.
    #[error("cannot close {0}")]
    CannotClose(ActionId),

    /// No waiting challenge, or the caller may not settle yet.
    #[error("cannot settle {0}")]
    CannotSettle(ActionId),

    /// No waiting challenge, or the answer window has ended.
    #[error("cannot dispute {0}")]
    CannotDispute(ActionId),

    /// The challenge behind the dispute is not `Disputed`.
    #[error("cannot rule {0}")]
    CannotRule(DisputeId),

    /// The action has no disputed challenge.
    #[error("cannot submit evidence for {0}")]
    CannotSubmitEvidence(ActionId),

    /// The submitter already closed their side of the evidence.
    #[error("submitter already finished submitting evidence for {0}")]
    SubmitterFinishedEvidence(ActionId),

    /// The challenger already closed their side of the evidence.
    #[error("challenger already finished submitting evidence for {0}")]
    ChallengerFinishedEvidence(ActionId),

    /// A state machine refused the transition.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    // ── Custody ─────────────────────────────────────────────────────
    /// The submitter's available stake does not cover the action collateral.
    #[error("{staker} has {available} available {token}, {required} required")]
    NotEnoughStake {
        /// Collateral token.
        token: TokenId,
        /// Submitter.
        staker: Account,
        /// Collateral the action needs.
        required: Amount,
        /// Stake available to lock.
        available: Amount,
    },

    /// The custody ledger refused a batch.
    #[error("custody error: {0}")]
    Custody(#[from] CustodyError),

    // ── Arbitration ─────────────────────────────────────────────────
    /// The arbitrator has no ruling for the dispute yet.
    #[error("{0} has not been ruled yet")]
    DisputeNotRuledYet(DisputeId),

    /// The arbitrator refused a request.
    #[error("arbitrator error: {0}")]
    Arbitrator(#[from] ArbitratorError),

    // ── Internal ────────────────────────────────────────────────────
    /// Arithmetic or canonicalization failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AgreementError {
    /// Which part of the taxonomy this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SenderNotAllowed { .. } | Self::SenderCannotChallengeAction { .. } => {
                ErrorKind::Authorization
            }
            Self::MustSign { .. } | Self::AlreadySigned { .. } => ErrorKind::AgreementBinding,
            Self::DisputableAppAlreadyExists(_)
            | Self::DisputableAppNotRegistered(_)
            | Self::MissingCollateralRequirement { .. }
            | Self::SettingDoesNotExist(_)
            | Self::ArbitratorNotBound(_) => ErrorKind::Registry,
            Self::ActionDoesNotExist(_)
            | Self::ChallengeDoesNotExist(_)
            | Self::DisputeDoesNotExist(_)
            | Self::CannotChallenge { .. }
            | Self::CannotClose(_)
            | Self::CannotSettle(_)
            | Self::CannotDispute(_)
            | Self::CannotRule(_)
            | Self::CannotSubmitEvidence(_)
            | Self::SubmitterFinishedEvidence(_)
            | Self::ChallengerFinishedEvidence(_)
            | Self::InvalidTransition { .. } => ErrorKind::State,
            Self::NotEnoughStake { .. } | Self::Custody(_) => ErrorKind::Custody,
            Self::DisputeNotRuledYet(_) | Self::Arbitrator(_) => ErrorKind::Arbitration,
            Self::Core(_) => ErrorKind::Internal,
        }
    }

    /// Stable failure code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SenderNotAllowed { .. } => "AGR_SENDER_NOT_ALLOWED",
            Self::SenderCannotChallengeAction { .. } => "AGR_SENDER_CANT_CHALLENGE_ACTION",
            Self::MustSign { .. } => "AGR_SIGNER_MUST_SIGN",
            Self::AlreadySigned { .. } => "AGR_SIGNER_ALREADY_SIGNED",
            Self::DisputableAppAlreadyExists(_) => "AGR_DISPUTABLE_ALREADY_EXISTS",
            Self::DisputableAppNotRegistered(_) => "AGR_DISPUTABLE_NOT_REGISTERED",
            Self::MissingCollateralRequirement { .. } => "AGR_MISSING_COLLATERAL_REQ",
            Self::SettingDoesNotExist(_) => "AGR_SETTING_DOES_NOT_EXIST",
            Self::ArbitratorNotBound(_) => "AGR_ARBITRATOR_NOT_BOUND",
            Self::ActionDoesNotExist(_) => "AGR_ACTION_DOES_NOT_EXIST",
            Self::ChallengeDoesNotExist(_) => "AGR_CHALLENGE_DOES_NOT_EXIST",
            Self::DisputeDoesNotExist(_) => "AGR_DISPUTE_DOES_NOT_EXIST",
            Self::CannotChallenge { .. } => "AGR_CANNOT_CHALLENGE_ACTION",
            Self::CannotClose(_) => "AGR_CANNOT_CLOSE_ACTION",
            Self::CannotSettle(_) => "AGR_CANNOT_SETTLE_ACTION",
            Self::CannotDispute(_) => "AGR_CANNOT_DISPUTE_ACTION",
            Self::CannotRule(_) => "AGR_CANNOT_RULE_ACTION",
            Self::CannotSubmitEvidence(_) => "AGR_CANNOT_SUBMIT_EVIDENCE",
            Self::SubmitterFinishedEvidence(_) => "AGR_SUBMITTER_FINISHED_EVIDENCE",
            Self::ChallengerFinishedEvidence(_) => "AGR_CHALLENGER_FINISHED_EVIDENCE",
            Self::InvalidTransition { .. } => "AGR_INVALID_TRANSITION",
            Self::NotEnoughStake { .. } => "STAKING_NOT_ENOUGH_AVAILABLE_BAL",
            Self::Custody(e) => e.code(),
            Self::DisputeNotRuledYet(_) => "ARBITRATOR_DISPUTE_NOT_RULED_YET",
            Self::Arbitrator(e) => e.code(),
            Self::Core(_) => "AGR_INTERNAL",
        }
    }
}

/// Failures reported by a custody ledger.
#[derive(Error, Debug)]
pub enum CustodyError {
    /// Not enough available stake to lock.
    #[error("{staker} has {available} available {token}, cannot lock {requested}")]
    InsufficientAvailable {
        /// Token.
        token: TokenId,
        /// Staker whose stake was to be locked.
        staker: Account,
        /// Amount to lock.
        requested: Amount,
        /// Amount available.
        available: Amount,
    },

    /// Not enough locked stake to unlock or slash.
    #[error("{staker} has {locked} locked {token}, cannot release {requested}")]
    InsufficientLocked {
        /// Token.
        token: TokenId,
        /// Staker whose stake was to be released.
        staker: Account,
        /// Amount to release.
        requested: Amount,
        /// Amount currently locked.
        locked: Amount,
    },

    /// The payer's wallet cannot cover a deposit into escrow.
    #[error("deposit of {requested} {token} from {payer} failed: balance is {balance}")]
    DepositFailed {
        /// Token.
        token: TokenId,
        /// Payer.
        payer: Account,
        /// Amount to deposit.
        requested: Amount,
        /// Payer's wallet balance.
        balance: Amount,
    },

    /// Escrow does not hold enough to pay out.
    #[error("transfer of {requested} {token} to {to} failed: escrow holds {escrowed}")]
    TransferFailed {
        /// Token.
        token: TokenId,
        /// Recipient.
        to: Account,
        /// Amount to pay out.
        requested: Amount,
        /// Amount held in escrow.
        escrowed: Amount,
    },

    /// Zero stake.
    #[error("stake amount must be greater than zero")]
    InvalidStakeAmount,

    /// Zero unstake.
    #[error("unstake amount must be greater than zero")]
    InvalidUnstakeAmount,

    /// Balance arithmetic overflowed or underflowed.
    #[error(transparent)]
    Arithmetic(#[from] CoreError),
}

impl CustodyError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientAvailable { .. } => "STAKING_NOT_ENOUGH_AVAILABLE_BAL",
            Self::InsufficientLocked { .. } => "STAKING_NOT_ENOUGH_LOCKED_BAL",
            Self::DepositFailed { .. } => "STAKING_TOKEN_DEPOSIT_FAILED",
            Self::TransferFailed { .. } => "STAKING_TOKEN_TRANSFER_FAILED",
            Self::InvalidStakeAmount => "STAKING_INVALID_STAKE_AMOUNT",
            Self::InvalidUnstakeAmount => "STAKING_INVALID_UNSTAKE_AMOUNT",
            Self::Arithmetic(_) => "STAKING_ARITHMETIC",
        }
    }
}

/// Failures reported by an arbitrator.
#[derive(Error, Debug)]
pub enum ArbitratorError {
    /// The arbitrator does not know the dispute.
    #[error("{0} does not exist at the arbitrator")]
    DisputeDoesNotExist(DisputeId),

    /// No ruling yet.
    #[error("{0} has not been ruled yet")]
    NotRuledYet(DisputeId),

    /// The dispute was already ruled.
    #[error("{0} was already ruled")]
    AlreadyRuled(DisputeId),

    /// Evidence is no longer accepted.
    #[error("evidence period for {0} is closed")]
    EvidencePeriodClosed(DisputeId),

    /// The arbitrator refuses new disputes.
    #[error("arbitrator unavailable: {0}")]
    Unavailable(String),
}

impl ArbitratorError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DisputeDoesNotExist(_) => "ARBITRATOR_DISPUTE_DOES_NOT_EXIST",
            Self::NotRuledYet(_) => "ARBITRATOR_DISPUTE_NOT_RULED_YET",
            Self::AlreadyRuled(_) => "ARBITRATOR_DISPUTE_ALREADY_RULED",
            Self::EvidencePeriodClosed(_) => "ARBITRATOR_EVIDENCE_PERIOD_CLOSED",
            Self::Unavailable(_) => "ARBITRATOR_UNAVAILABLE",
        }
    }
}

/// Failures a disputable app reports back from a callback.
///
/// The engine logs and swallows these; they never roll back a committed
/// transition.
#[derive(Error, Debug)]
pub enum DisputableError {
    /// The callback did not come from the agreement the app is bound to.
    #[error("callback came from a foreign agreement")]
    SenderNotAgreement,

    /// The app does not know the action.
    #[error("disputable action {0} does not exist")]
    ActionDoesNotExist(u64),

    /// The app refused the notification.
    #[error("callback rejected: {0}")]
    Rejected(String),
}

impl DisputableError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SenderNotAgreement => "DISPUTABLE_SENDER_NOT_AGREEMENT",
            Self::ActionDoesNotExist(_) => "DISPUTABLE_ACTION_DOES_NOT_EXIST",
            Self::Rejected(_) => "DISPUTABLE_CALLBACK_REJECTED",
        }
    }
}
