//! # Allowed Paths
//!
//! Which transitions are open on an action at a given instant. The same
//! predicates gate the engine's entry points, so a path reported open here
//! is the path the engine will accept (modulo the caller's role).

use agr_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::challenge::{Challenge, ChallengeState};

/// Operations open on an action at a given instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedPaths {
    /// The owning app may close it.
    pub can_close: bool,
    /// A new challenge may be raised.
    pub can_challenge: bool,
    /// The submitter may settle (open for the whole answer window).
    pub can_settle: bool,
    /// The submitter may raise a dispute.
    pub can_dispute: bool,
    /// Anyone may settle: the answer window has passed.
    pub can_claim_settlement: bool,
    /// The bound arbitrator may rule.
    pub can_rule_dispute: bool,
}

impl AllowedPaths {
    /// Evaluate the paths of `action` whose latest challenge is `challenge`.
    pub fn evaluate(action: &Action, challenge: Option<&Challenge>, now: Timestamp) -> Self {
        let open = is_open(action, challenge);
        let waiting = challenge.filter(|c| c.state == ChallengeState::Waiting);
        Self {
            can_close: open,
            can_challenge: open,
            can_settle: waiting.is_some(),
            can_dispute: waiting.is_some_and(|c| now < c.end_date),
            can_claim_settlement: waiting.is_some_and(|c| now >= c.end_date),
            can_rule_dispute: challenge.is_some_and(|c| c.state == ChallengeState::Disputed),
        }
    }
}

/// Not closed, and either never challenged or its latest challenge ended
/// in a way that hands the action back to the submitter.
pub(crate) fn is_open(action: &Action, challenge: Option<&Challenge>) -> bool {
    if action.is_closed() {
        return false;
    }
    match challenge {
        None => true,
        Some(c) => c.state.reopens_action(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionStore, NewAction, SubmissionKind};
    use crate::challenge::{ChallengeStore, FeeDeposit, NewChallenge};
    use agr_core::{Account, ActionId, Amount, AppId, CollateralRequirementId, SettingId, TokenId};

    fn t(secs: u64) -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z")
            .unwrap()
            .plus_secs(secs)
            .unwrap()
    }

    fn action() -> Action {
        let mut store = ActionStore::new();
        let id = store.insert(NewAction {
            app: AppId::new("voting"),
            disputable_action_id: 1,
            submitter: Account::new("alice"),
            setting_id: SettingId(1),
            collateral_requirement_id: CollateralRequirementId(1),
            context: Vec::new(),
            kind: SubmissionKind::Immediate,
            submitted_at: t(0),
        });
        store.get(id).unwrap().clone()
    }

    fn challenge(end: u64) -> Challenge {
        let mut store = ChallengeStore::new();
        let id = store.insert(NewChallenge {
            action_id: ActionId(1),
            challenger: Account::new("bob"),
            context: Vec::new(),
            settlement_offer: Amount(10),
            end_date: t(end),
            collateral_requirement_id: CollateralRequirementId(1),
            challenger_arbitrator_fees: FeeDeposit {
                token: TokenId::new("DAI"),
                amount: Amount(30),
            },
            created_at: t(0),
        });
        store.get(id).unwrap().clone()
    }

    #[test]
    fn fresh_action_can_be_closed_or_challenged() {
        let paths = AllowedPaths::evaluate(&action(), None, t(0));
        assert!(paths.can_close);
        assert!(paths.can_challenge);
        assert!(!paths.can_settle);
        assert!(!paths.can_dispute);
    }

    #[test]
    fn dispute_closes_exactly_at_end_date() {
        let action = action();
        let challenge = challenge(100);
        let before = AllowedPaths::evaluate(&action, Some(&challenge), t(99));
        assert!(before.can_dispute);
        assert!(before.can_settle);
        assert!(!before.can_claim_settlement);
        assert!(!before.can_close);

        let at_end = AllowedPaths::evaluate(&action, Some(&challenge), t(100));
        assert!(!at_end.can_dispute);
        assert!(at_end.can_claim_settlement);
    }

    #[test]
    fn disputed_challenge_only_allows_ruling() {
        let action = action();
        let mut challenge = challenge(100);
        challenge.state = ChallengeState::Disputed;
        let paths = AllowedPaths::evaluate(&action, Some(&challenge), t(10));
        assert_eq!(
            paths,
            AllowedPaths {
                can_rule_dispute: true,
                ..AllowedPaths::default()
            }
        );
    }

    #[test]
    fn settled_challenge_leaves_no_path() {
        let action = action();
        let mut challenge = challenge(100);
        challenge.state = ChallengeState::Settled;
        assert_eq!(
            AllowedPaths::evaluate(&action, Some(&challenge), t(10)),
            AllowedPaths::default()
        );
    }

    #[test]
    fn voided_challenge_reopens_action() {
        let action = action();
        let mut challenge = challenge(100);
        challenge.state = ChallengeState::Voided;
        let paths = AllowedPaths::evaluate(&action, Some(&challenge), t(10));
        assert!(paths.can_close);
        assert!(paths.can_challenge);
    }
}
