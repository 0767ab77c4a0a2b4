//! # Action Store
//!
//! Actions are created by disputable apps and mutated only by the engine.
//!
//! ```text
//! Submitted ─┐
//!            ├──challenge──▶ Challenged ──close / accepted ruling──▶ Closed
//! Scheduled ─┘      │
//!                   └──close──▶ Closed
//! ```
//!
//! `Closed` is terminal. An action stays `Challenged` across a rejected or
//! voided challenge (and across a re-challenge); whether it may still be
//! closed is decided by the state of its latest challenge.

use agr_core::{Account, ActionId, AppId, ChallengeId, CollateralRequirementId, SettingId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::AgreementError;
use crate::lifecycle::{advance, LifecycleState, TransitionRecord};

/// How the submitting app wants the action to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionKind {
    /// Available to proceed as soon as it is submitted.
    Immediate,
    /// Must reach an executable timestamp kept by the app.
    Scheduled,
}

/// Lifecycle of an action. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionState {
    /// Submitted by an app that executes it later.
    Scheduled,
    /// Submitted and immediately open.
    Submitted,
    /// Has, or had, a challenge.
    Challenged,
    /// Collateral released; nothing more can happen.
    Closed,
}

impl LifecycleState for ActionState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Submitted => "SUBMITTED",
            Self::Challenged => "CHALLENGED",
            Self::Closed => "CLOSED",
        }
    }

    fn valid_transitions(&self) -> &'static [ActionState] {
        match self {
            Self::Scheduled | Self::Submitted => &[Self::Challenged, Self::Closed],
            Self::Challenged => &[Self::Closed],
            Self::Closed => &[],
        }
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Engine-assigned id, starting at 1.
    pub id: ActionId,
    /// The app that submitted the action.
    pub app: AppId,
    /// The app's own id for this action.
    pub disputable_action_id: u64,
    /// The user the collateral is locked for.
    pub submitter: Account,
    /// Setting in force at submission.
    pub setting_id: SettingId,
    /// Requirement in force at submission.
    pub collateral_requirement_id: CollateralRequirementId,
    /// Opaque context supplied by the submitter.
    pub context: Vec<u8>,
    /// Current state.
    pub state: ActionState,
    /// Latest challenge, if any.
    pub current_challenge_id: Option<ChallengeId>,
    /// End of the latest challenge's answer window.
    pub challenge_end_date: Option<Timestamp>,
    /// Submission time.
    pub submitted_at: Timestamp,
    /// Set once the action collateral was unlocked or slashed.
    pub collateral_released: bool,
    /// Transition history.
    pub transitions: Vec<TransitionRecord<ActionState>>,
}

impl Action {
    /// True once closed.
    pub fn is_closed(&self) -> bool {
        self.state == ActionState::Closed
    }

    pub(crate) fn mark_challenged(&mut self, challenge_id: ChallengeId, end_date: Timestamp, at: Timestamp) -> Result<(), AgreementError> {
        if self.state != ActionState::Challenged {
            advance(&mut self.state, &mut self.transitions, ActionState::Challenged, at)?;
        }
        self.current_challenge_id = Some(challenge_id);
        self.challenge_end_date = Some(end_date);
        Ok(())
    }

    pub(crate) fn mark_closed(&mut self, at: Timestamp) -> Result<(), AgreementError> {
        advance(&mut self.state, &mut self.transitions, ActionState::Closed, at)?;
        self.collateral_released = true;
        Ok(())
    }
}

/// Fields supplied when inserting a new action.
#[derive(Debug, Clone)]
pub struct NewAction {
    /// Submitting app.
    pub app: AppId,
    /// The app's own id for the action.
    pub disputable_action_id: u64,
    /// Submitter.
    pub submitter: Account,
    /// Current setting.
    pub setting_id: SettingId,
    /// Current requirement of the app.
    pub collateral_requirement_id: CollateralRequirementId,
    /// Submitter context.
    pub context: Vec<u8>,
    /// Immediate or scheduled.
    pub kind: SubmissionKind,
    /// Engine time of submission.
    pub submitted_at: Timestamp,
}

/// Arena of every action ever submitted, indexed by id.
#[derive(Debug, Default)]
pub struct ActionStore {
    actions: Vec<Action>,
}

impl ActionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next inserted action will receive.
    pub fn next_id(&self) -> ActionId {
        ActionId(self.actions.len() as u64 + 1)
    }

    /// Append an action and return its id.
    pub fn insert(&mut self, new: NewAction) -> ActionId {
        let id = self.next_id();
        let state = match new.kind {
            SubmissionKind::Immediate => ActionState::Submitted,
            SubmissionKind::Scheduled => ActionState::Scheduled,
        };
        self.actions.push(Action {
            id,
            app: new.app,
            disputable_action_id: new.disputable_action_id,
            submitter: new.submitter,
            setting_id: new.setting_id,
            collateral_requirement_id: new.collateral_requirement_id,
            context: new.context,
            state,
            current_challenge_id: None,
            challenge_end_date: None,
            submitted_at: new.submitted_at,
            collateral_released: false,
            transitions: Vec::new(),
        });
        id
    }

    /// Look up an action.
    pub fn get(&self, id: ActionId) -> Result<&Action, AgreementError> {
        index(id)
            .and_then(|i| self.actions.get(i))
            .ok_or(AgreementError::ActionDoesNotExist(id))
    }

    /// Look up an action for mutation.
    pub fn get_mut(&mut self, id: ActionId) -> Result<&mut Action, AgreementError> {
        index(id)
            .and_then(|i| self.actions.get_mut(i))
            .ok_or(AgreementError::ActionDoesNotExist(id))
    }

    /// Actions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn index(id: ActionId) -> Option<usize> {
    usize::try_from(id.get().checked_sub(1)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn new_action(kind: SubmissionKind) -> NewAction {
        NewAction {
            app: AppId::new("voting"),
            disputable_action_id: 1,
            submitter: Account::new("alice"),
            setting_id: SettingId(1),
            collateral_requirement_id: CollateralRequirementId(1),
            context: b"proposal".to_vec(),
            kind,
            submitted_at: at(),
        }
    }

    #[test]
    fn insert_assigns_ids_from_one() {
        let mut store = ActionStore::new();
        assert_eq!(store.insert(new_action(SubmissionKind::Immediate)), ActionId(1));
        assert_eq!(store.insert(new_action(SubmissionKind::Scheduled)), ActionId(2));
        assert_eq!(store.get(ActionId(1)).unwrap().state, ActionState::Submitted);
        assert_eq!(store.get(ActionId(2)).unwrap().state, ActionState::Scheduled);
    }

    #[test]
    fn action_zero_does_not_exist() {
        let store = ActionStore::new();
        let err = store.get(ActionId(0)).unwrap_err();
        assert_eq!(err.code(), "AGR_ACTION_DOES_NOT_EXIST");
    }

    #[test]
    fn closed_is_terminal() {
        assert!(ActionState::Closed.is_terminal());
        assert!(!ActionState::Challenged.is_terminal());
        assert!(!ActionState::Challenged.can_transition_to(ActionState::Submitted));
    }

    #[test]
    fn closing_twice_is_an_invalid_transition() {
        let mut store = ActionStore::new();
        let id = store.insert(new_action(SubmissionKind::Immediate));
        let action = store.get_mut(id).unwrap();
        action.mark_closed(at()).unwrap();
        assert!(action.collateral_released);
        let err = action.mark_closed(at()).unwrap_err();
        assert_eq!(err.code(), "AGR_INVALID_TRANSITION");
        assert_eq!(action.transitions.len(), 1);
    }

    #[test]
    fn rechallenge_keeps_single_challenged_transition() {
        let mut store = ActionStore::new();
        let id = store.insert(new_action(SubmissionKind::Immediate));
        let action = store.get_mut(id).unwrap();
        action.mark_challenged(ChallengeId(1), at(), at()).unwrap();
        action.mark_challenged(ChallengeId(2), at(), at()).unwrap();
        assert_eq!(action.current_challenge_id, Some(ChallengeId(2)));
        assert_eq!(action.transitions.len(), 1);
    }
}
