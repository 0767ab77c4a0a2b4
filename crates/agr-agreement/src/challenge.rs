//! # Challenges
//!
//! ```text
//!            ┌──settle──▶ Settled
//! Waiting ───┤
//!            └──dispute──▶ Disputed ──rule──▶ Rejected | Accepted | Voided
//! ```
//!
//! `Waiting` and `Disputed` are active; the other states are terminal. An
//! action may be challenged again only after its latest challenge ended
//! `Rejected` or `Voided`.

use std::collections::BTreeMap;

use agr_core::{Account, ActionId, Amount, ChallengeId, CollateralRequirementId, DisputeId, TokenId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::arbitrator::Ruling;
use crate::error::AgreementError;
use crate::lifecycle::{advance, LifecycleState, TransitionRecord};

/// Lifecycle of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeState {
    /// Inside the answer window.
    Waiting,
    /// The submitter, or anyone after the window, accepted the offer.
    Settled,
    /// Raised to the arbitrator.
    Disputed,
    /// Ruled in favor of the submitter.
    Rejected,
    /// Ruled in favor of the challenger.
    Accepted,
    /// The arbitrator refused to rule.
    Voided,
}

impl ChallengeState {
    /// Outcome state for a ruling.
    pub fn from_ruling(ruling: Ruling) -> Self {
        match ruling {
            Ruling::InFavorOfSubmitter => Self::Rejected,
            Ruling::InFavorOfChallenger => Self::Accepted,
            Ruling::Refused => Self::Voided,
        }
    }

    /// Waiting or disputed.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Waiting | Self::Disputed)
    }

    /// Whether the action may be closed or challenged again after this
    /// challenge.
    pub fn reopens_action(&self) -> bool {
        matches!(self, Self::Rejected | Self::Voided)
    }
}

impl LifecycleState for ChallengeState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Settled => "SETTLED",
            Self::Disputed => "DISPUTED",
            Self::Rejected => "REJECTED",
            Self::Accepted => "ACCEPTED",
            Self::Voided => "VOIDED",
        }
    }

    fn valid_transitions(&self) -> &'static [ChallengeState] {
        match self {
            Self::Waiting => &[Self::Settled, Self::Disputed],
            Self::Disputed => &[Self::Rejected, Self::Accepted, Self::Voided],
            Self::Settled | Self::Rejected | Self::Accepted | Self::Voided => &[],
        }
    }
}

impl std::fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arbitration fees deposited or paid by one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDeposit {
    /// Fee token.
    pub token: TokenId,
    /// Fee amount.
    pub amount: Amount,
}

/// A challenge raised against an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Engine-assigned id.
    pub id: ChallengeId,
    /// The challenged action.
    pub action_id: ActionId,
    /// Who raised the challenge.
    pub challenger: Account,
    /// The challenger's context.
    pub context: Vec<u8>,
    /// Amount of the action collateral the challenger accepts to settle for.
    pub settlement_offer: Amount,
    /// End of the answer window.
    pub end_date: Timestamp,
    /// Requirement the collateral amounts were taken from.
    pub collateral_requirement_id: CollateralRequirementId,
    /// Escrowed by the challenger when the challenge was raised.
    pub challenger_arbitrator_fees: FeeDeposit,
    /// Paid by the submitter to the arbitrator when disputing.
    pub submitter_arbitrator_fees: Option<FeeDeposit>,
    /// Dispute id at the arbitrator, once disputed.
    pub dispute_id: Option<DisputeId>,
    /// Current state.
    pub state: ChallengeState,
    /// Ruling applied, if any.
    pub ruling: Option<Ruling>,
    /// The submitter closed their side of the evidence.
    pub submitter_finished_evidence: bool,
    /// The challenger closed their side of the evidence.
    pub challenger_finished_evidence: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Transition history.
    pub transitions: Vec<TransitionRecord<ChallengeState>>,
}

impl Challenge {
    pub(crate) fn transition_to(&mut self, target: ChallengeState, at: Timestamp) -> Result<(), AgreementError> {
        advance(&mut self.state, &mut self.transitions, target, at)
    }
}

/// Fields supplied when opening a challenge.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    /// Challenged action.
    pub action_id: ActionId,
    /// Challenger.
    pub challenger: Account,
    /// Challenger context.
    pub context: Vec<u8>,
    /// Settlement offer.
    pub settlement_offer: Amount,
    /// End of the answer window.
    pub end_date: Timestamp,
    /// Requirement in force for the action.
    pub collateral_requirement_id: CollateralRequirementId,
    /// Fee escrowed by the challenger.
    pub challenger_arbitrator_fees: FeeDeposit,
    /// Engine time of the challenge.
    pub created_at: Timestamp,
}

/// Arena of challenges plus the dispute correlation index.
///
/// Disputes are keyed by `(arbitrator, dispute_id)`: dispute ids are only
/// unique per arbitrator.
#[derive(Debug, Default)]
pub struct ChallengeStore {
    challenges: Vec<Challenge>,
    by_dispute: BTreeMap<(Account, DisputeId), ChallengeId>,
}

impl ChallengeStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a waiting challenge and return its id.
    pub fn insert(&mut self, new: NewChallenge) -> ChallengeId {
        let id = ChallengeId(self.challenges.len() as u64 + 1);
        self.challenges.push(Challenge {
            id,
            action_id: new.action_id,
            challenger: new.challenger,
            context: new.context,
            settlement_offer: new.settlement_offer,
            end_date: new.end_date,
            collateral_requirement_id: new.collateral_requirement_id,
            challenger_arbitrator_fees: new.challenger_arbitrator_fees,
            submitter_arbitrator_fees: None,
            dispute_id: None,
            state: ChallengeState::Waiting,
            ruling: None,
            submitter_finished_evidence: false,
            challenger_finished_evidence: false,
            created_at: new.created_at,
            transitions: Vec::new(),
        });
        id
    }

    /// Look up a challenge.
    pub fn get(&self, id: ChallengeId) -> Result<&Challenge, AgreementError> {
        index(id)
            .and_then(|i| self.challenges.get(i))
            .ok_or(AgreementError::ChallengeDoesNotExist(id))
    }

    /// Look up a challenge for mutation.
    pub fn get_mut(&mut self, id: ChallengeId) -> Result<&mut Challenge, AgreementError> {
        index(id)
            .and_then(|i| self.challenges.get_mut(i))
            .ok_or(AgreementError::ChallengeDoesNotExist(id))
    }

    pub(crate) fn index_dispute(&mut self, arbitrator: Account, dispute_id: DisputeId, challenge_id: ChallengeId) {
        self.by_dispute.insert((arbitrator, dispute_id), challenge_id);
    }

    /// Challenge disputed at `arbitrator` under `dispute_id`.
    pub fn by_dispute(&self, arbitrator: &Account, dispute_id: DisputeId) -> Option<ChallengeId> {
        self.by_dispute.get(&(arbitrator.clone(), dispute_id)).copied()
    }

    /// Whether any arbitrator holds a dispute with this id.
    pub fn dispute_exists(&self, dispute_id: DisputeId) -> bool {
        self.by_dispute.keys().any(|(_, id)| *id == dispute_id)
    }

    /// Challenges in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter()
    }

    /// Number of challenges.
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    /// True when nothing was challenged.
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

fn index(id: ChallengeId) -> Option<usize> {
    usize::try_from(id.get().checked_sub(1)?).ok()
}
