//! # Arbitrator Adapter
//!
//! The engine's view of an external arbitrator: it quotes dispute fees,
//! opens disputes, receives evidence, and eventually holds a ruling that
//! the engine pulls when the arbitrator calls back.
//!
//! [`InMemoryArbitrator`] is a local court for tests and scenario replays.
//! Its [`decide`](InMemoryArbitrator::decide) hook accepts exactly one
//! ruling per dispute; a second ruling for the same dispute is rejected at
//! this boundary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use agr_core::{Account, Amount, ContentDigest, DisputeId, TokenId};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ArbitratorError;

/// Rulings the engine understands. Numeric codes follow the arbitrator
/// convention (2 = refused, 3 = first party, 4 = second party).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ruling {
    /// No decision; both sides get their collateral back.
    Refused,
    /// The action stands.
    InFavorOfSubmitter,
    /// The action is rejected and the collateral slashed.
    InFavorOfChallenger,
}

impl Ruling {
    /// Number of non-refused outcomes offered to the arbitrator.
    pub const POSSIBLE_RULINGS: u8 = 2;

    /// Stable upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refused => "REFUSED",
            Self::InFavorOfSubmitter => "IN_FAVOR_OF_SUBMITTER",
            Self::InFavorOfChallenger => "IN_FAVOR_OF_CHALLENGER",
        }
    }

    /// Numeric ruling code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Refused => 2,
            Self::InFavorOfSubmitter => 3,
            Self::InFavorOfChallenger => 4,
        }
    }

    /// Parse a numeric ruling code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(Self::Refused),
            3 => Some(Self::InFavorOfSubmitter),
            4 => Some(Self::InFavorOfChallenger),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ruling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fee quote for opening one dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitratorFees {
    /// Fee token.
    pub token: TokenId,
    /// Fee amount.
    pub amount: Amount,
}

/// External arbitrator, as seen by the engine.
pub trait Arbitrator: Send + Sync {
    /// Account that receives dispute fees and is allowed to trigger rulings.
    fn account(&self) -> &Account;

    /// Current fee for opening a dispute.
    fn dispute_fees(&self) -> ArbitratorFees;

    /// Open a dispute and return its id. Ids are unique per arbitrator.
    fn create_dispute(
        &self,
        possible_rulings: u8,
        metadata: ContentDigest,
    ) -> Result<DisputeId, ArbitratorError>;

    /// File evidence for one party. `finished` closes that party's side.
    fn submit_evidence(
        &self,
        dispute_id: DisputeId,
        party: &Account,
        evidence: &[u8],
        finished: bool,
    ) -> Result<(), ArbitratorError>;

    /// Stop accepting evidence for the dispute.
    fn close_evidence_period(&self, dispute_id: DisputeId) -> Result<(), ArbitratorError>;

    /// The final ruling, or [`ArbitratorError::NotRuledYet`].
    fn ruling(&self, dispute_id: DisputeId) -> Result<Ruling, ArbitratorError>;
}

// ── In-memory arbitrator ───────────────────────────────────────────────

/// One piece of evidence received by the arbitrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Who filed it.
    pub party: Account,
    /// Raw evidence bytes.
    pub evidence: Vec<u8>,
    /// Whether the party finished with this submission.
    pub finished: bool,
}

/// A dispute as held by [`InMemoryArbitrator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Dispute id.
    pub id: DisputeId,
    /// Number of possible non-refused rulings.
    pub possible_rulings: u8,
    /// Digest identifying the action and challenge.
    pub metadata: ContentDigest,
    /// Evidence in arrival order.
    pub evidence: Vec<EvidenceRecord>,
    /// No more evidence accepted.
    pub evidence_closed: bool,
    /// Final ruling once decided.
    pub ruling: Option<Ruling>,
}

/// A local arbitrator backed by concurrent maps.
pub struct InMemoryArbitrator {
    account: Account,
    fees: Mutex<ArbitratorFees>,
    disputes: DashMap<DisputeId, DisputeRecord>,
    last_id: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryArbitrator {
    /// A court at `account` quoting `fee_amount` of `fee_token` per dispute.
    pub fn new(account: Account, fee_token: TokenId, fee_amount: Amount) -> Self {
        Self {
            account,
            fees: Mutex::new(ArbitratorFees {
                token: fee_token,
                amount: fee_amount,
            }),
            disputes: DashMap::new(),
            last_id: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Change the fee quoted for future disputes.
    pub fn set_fees(&self, token: TokenId, amount: Amount) {
        *self.fees.lock() = ArbitratorFees { token, amount };
    }

    /// Refuse new disputes while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Record the final ruling for a dispute. Only one ruling is accepted.
    pub fn decide(&self, dispute_id: DisputeId, ruling: Ruling) -> Result<(), ArbitratorError> {
        let mut record = self
            .disputes
            .get_mut(&dispute_id)
            .ok_or(ArbitratorError::DisputeDoesNotExist(dispute_id))?;
        if record.ruling.is_some() {
            return Err(ArbitratorError::AlreadyRuled(dispute_id));
        }
        record.ruling = Some(ruling);
        record.evidence_closed = true;
        tracing::info!(dispute_id = %dispute_id, ruling = %ruling, "dispute decided");
        Ok(())
    }

    /// Snapshot of a dispute.
    pub fn dispute(&self, dispute_id: DisputeId) -> Option<DisputeRecord> {
        self.disputes.get(&dispute_id).map(|r| r.clone())
    }

    /// Number of disputes ever opened.
    pub fn dispute_count(&self) -> usize {
        self.disputes.len()
    }
}

impl std::fmt::Debug for InMemoryArbitrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryArbitrator")
            .field("account", &self.account)
            .field("disputes", &self.disputes.len())
            .finish()
    }
}

impl Arbitrator for InMemoryArbitrator {
    fn account(&self) -> &Account {
        &self.account
    }

    fn dispute_fees(&self) -> ArbitratorFees {
        self.fees.lock().clone()
    }

    fn create_dispute(
        &self,
        possible_rulings: u8,
        metadata: ContentDigest,
    ) -> Result<DisputeId, ArbitratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ArbitratorError::Unavailable(
                "not accepting new disputes".into(),
            ));
        }
        let id = DisputeId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.disputes.insert(
            id,
            DisputeRecord {
                id,
                possible_rulings,
                metadata,
                evidence: Vec::new(),
                evidence_closed: false,
                ruling: None,
            },
        );
        Ok(id)
    }

    fn submit_evidence(
        &self,
        dispute_id: DisputeId,
        party: &Account,
        evidence: &[u8],
        finished: bool,
    ) -> Result<(), ArbitratorError> {
        let mut record = self
            .disputes
            .get_mut(&dispute_id)
            .ok_or(ArbitratorError::DisputeDoesNotExist(dispute_id))?;
        if record.evidence_closed {
            return Err(ArbitratorError::EvidencePeriodClosed(dispute_id));
        }
        record.evidence.push(EvidenceRecord {
            party: party.clone(),
            evidence: evidence.to_vec(),
            finished,
        });
        Ok(())
    }

    fn close_evidence_period(&self, dispute_id: DisputeId) -> Result<(), ArbitratorError> {
        let mut record = self
            .disputes
            .get_mut(&dispute_id)
            .ok_or(ArbitratorError::DisputeDoesNotExist(dispute_id))?;
        record.evidence_closed = true;
        Ok(())
    }

    fn ruling(&self, dispute_id: DisputeId) -> Result<Ruling, ArbitratorError> {
        let record = self
            .disputes
            .get(&dispute_id)
            .ok_or(ArbitratorError::DisputeDoesNotExist(dispute_id))?;
        record.ruling.ok_or(ArbitratorError::NotRuledYet(dispute_id))
    }
}
