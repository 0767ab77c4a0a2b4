//! # Engine Events
//!
//! Append-only record of what the engine did, for indexing and scenario
//! output. Events are never read back by the engine itself.

use agr_core::{Account, ActionId, AppId, ChallengeId, CollateralRequirementId, DisputeId, SettingId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::arbitrator::Ruling;

/// Something the engine committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new setting became current.
    SettingChanged {
        /// The new setting.
        setting_id: SettingId,
    },
    /// A signer accepted a setting.
    Signed {
        /// Who signed.
        signer: Account,
        /// What they signed.
        setting_id: SettingId,
    },
    /// An app was registered with its first collateral requirement.
    DisputableAppActivated {
        /// The app.
        app: AppId,
        /// Its initial requirement.
        collateral_requirement_id: CollateralRequirementId,
    },
    /// An app was asked to unregister.
    DisputableAppDeactivated {
        /// The app.
        app: AppId,
    },
    /// An app finished unregistering.
    DisputableAppUnregistered {
        /// The app.
        app: AppId,
    },
    /// An app's collateral requirement was replaced.
    CollateralRequirementChanged {
        /// The app.
        app: AppId,
        /// The requirement now in force.
        collateral_requirement_id: CollateralRequirementId,
    },
    /// An app submitted an action.
    ActionSubmitted {
        /// The new action.
        action_id: ActionId,
        /// The submitting app.
        app: AppId,
    },
    /// An action was challenged.
    ActionChallenged {
        /// The challenged action.
        action_id: ActionId,
        /// The new challenge.
        challenge_id: ChallengeId,
    },
    /// A challenge was settled.
    ActionSettled {
        /// The action.
        action_id: ActionId,
        /// The settled challenge.
        challenge_id: ChallengeId,
    },
    /// A challenge was raised to the arbitrator.
    ActionDisputed {
        /// The action.
        action_id: ActionId,
        /// The disputed challenge.
        challenge_id: ChallengeId,
        /// Dispute id at the arbitrator.
        dispute_id: DisputeId,
    },
    /// A party filed evidence.
    EvidenceSubmitted {
        /// The action.
        action_id: ActionId,
        /// The dispute the evidence went to.
        dispute_id: DisputeId,
        /// Submitter or challenger.
        party: Account,
        /// Whether the party closed their side.
        finished: bool,
    },
    /// A ruling was applied.
    ActionRuled {
        /// The action.
        action_id: ActionId,
        /// The ruled challenge.
        challenge_id: ChallengeId,
        /// The arbitrator's ruling.
        ruling: Ruling,
    },
    /// An action was closed and its collateral released.
    ActionClosed {
        /// The action.
        action_id: ActionId,
    },
}

impl Event {
    /// Snake-case event name, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SettingChanged { .. } => "setting_changed",
            Self::Signed { .. } => "signed",
            Self::DisputableAppActivated { .. } => "disputable_app_activated",
            Self::DisputableAppDeactivated { .. } => "disputable_app_deactivated",
            Self::DisputableAppUnregistered { .. } => "disputable_app_unregistered",
            Self::CollateralRequirementChanged { .. } => "collateral_requirement_changed",
            Self::ActionSubmitted { .. } => "action_submitted",
            Self::ActionChallenged { .. } => "action_challenged",
            Self::ActionSettled { .. } => "action_settled",
            Self::ActionDisputed { .. } => "action_disputed",
            Self::EvidenceSubmitted { .. } => "evidence_submitted",
            Self::ActionRuled { .. } => "action_ruled",
            Self::ActionClosed { .. } => "action_closed",
        }
    }
}

/// An event with its position in the log and the engine time it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1.
    pub sequence: u64,
    /// Engine time of the event.
    pub at: Timestamp,
    /// What happened.
    pub event: Event,
}

/// The engine's append-only event log.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn emit(&mut self, at: Timestamp, event: Event) {
        tracing::debug!(event = event.name(), "agreement event");
        let sequence = self.records.len() as u64 + 1;
        self.records.push(EventRecord { sequence, at, event });
    }

    /// All records in emission order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before the first event.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
