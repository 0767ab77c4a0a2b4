//! # Collateral Requirements
//!
//! Each disputable app carries an append-only log of collateral
//! requirements. Every (re)activation or explicit change appends a new
//! version, even when the numbers are unchanged. Actions and challenges
//! keep the id of the version they were created under, so later changes
//! never reach back into past actions.

use agr_core::{Amount, CollateralRequirementId, TokenId, Timestamp};
use serde::{Deserialize, Serialize};

/// Requested collateral terms, as supplied by the app owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRequirementInput {
    /// Collateral token.
    pub token: TokenId,
    /// Collateral locked per action.
    pub action_collateral: Amount,
    /// Collateral deposited per challenge.
    pub challenge_collateral: Amount,
    /// Length of the answer window in seconds.
    pub challenge_duration_secs: u64,
}

/// One recorded version of an app's collateral terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRequirement {
    /// Version id, starting at 1 per app.
    pub id: CollateralRequirementId,
    /// Collateral token.
    pub token: TokenId,
    /// Locked from the submitter's available stake on submit.
    pub action_collateral: Amount,
    /// Deposited by the challenger on challenge.
    pub challenge_collateral: Amount,
    /// Length of the answer window that opens on challenge.
    pub challenge_duration_secs: u64,
    /// When this version was recorded.
    pub created_at: Timestamp,
}

/// Append-only requirement versions for a single app.
#[derive(Debug, Clone, Default)]
pub struct CollateralLog {
    entries: Vec<CollateralRequirement>,
}

impl CollateralLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new version and return its id. Ids start at 1 per app.
    pub fn append(&mut self, input: CollateralRequirementInput, at: Timestamp) -> CollateralRequirementId {
        let id = CollateralRequirementId(self.entries.len() as u64 + 1);
        self.entries.push(CollateralRequirement {
            id,
            token: input.token,
            action_collateral: input.action_collateral,
            challenge_collateral: input.challenge_collateral,
            challenge_duration_secs: input.challenge_duration_secs,
            created_at: at,
        });
        id
    }

    /// A version by id.
    pub fn get(&self, id: CollateralRequirementId) -> Option<&CollateralRequirement> {
        let index = id.get().checked_sub(1)?;
        self.entries.get(usize::try_from(index).ok()?)
    }

    /// The latest version.
    pub fn current(&self) -> Option<&CollateralRequirement> {
        self.entries.last()
    }

    /// Number of versions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before the first version.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(action: u64) -> CollateralRequirementInput {
        CollateralRequirementInput {
            token: TokenId::new("ANT"),
            action_collateral: Amount(action),
            challenge_collateral: Amount(100),
            challenge_duration_secs: 3600,
        }
    }

    #[test]
    fn identical_inputs_still_append_new_versions() {
        let mut log = CollateralLog::new();
        let at = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let first = log.append(input(200), at);
        let second = log.append(input(200), at);
        assert_eq!(first, CollateralRequirementId(1));
        assert_eq!(second, CollateralRequirementId(2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.current().unwrap().id, second);
    }

    #[test]
    fn old_versions_remain_readable() {
        let mut log = CollateralLog::new();
        let at = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let first = log.append(input(200), at);
        log.append(input(500), at);
        assert_eq!(log.get(first).unwrap().action_collateral, Amount(200));
        assert!(log.get(CollateralRequirementId(0)).is_none());
    }

    #[test]
    fn input_parses_from_yaml() {
        let yaml = "token: ANT\naction_collateral: 200\nchallenge_collateral: 100\nchallenge_duration_secs: 86400\n";
        let parsed: CollateralRequirementInput = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.challenge_duration_secs, 86400);
        assert_eq!(parsed.token.as_str(), "ANT");
    }
}
