//! # Lifecycle Bookkeeping
//!
//! Shared plumbing for the action and challenge state machines: an
//! explicit transition table per state enum, and an append-only audit log
//! of every transition taken.

use agr_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::AgreementError;

/// A state enum with an explicit transition table.
pub trait LifecycleState: Copy + Eq + std::fmt::Debug + 'static {
    /// Stable upper-case name.
    fn as_str(&self) -> &'static str;

    /// Valid target states from this state.
    fn valid_transitions(&self) -> &'static [Self];

    /// No transition leaves this state.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Whether `target` is in the transition table.
    fn can_transition_to(&self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// One entry in a state machine's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    /// State before.
    pub from_state: S,
    /// State after.
    pub to_state: S,
    /// When it happened.
    pub at: Timestamp,
}

/// Move `state` to `target` if the transition table allows it, recording
/// the step in `log`.
pub fn advance<S: LifecycleState>(
    state: &mut S,
    log: &mut Vec<TransitionRecord<S>>,
    target: S,
    at: Timestamp,
) -> Result<(), AgreementError> {
    if !state.can_transition_to(target) {
        return Err(AgreementError::InvalidTransition {
            from: state.as_str(),
            to: target.as_str(),
        });
    }
    log.push(TransitionRecord {
        from_state: *state,
        to_state: target,
        at,
    });
    *state = target;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Open,
        Shut,
        Bricked,
    }

    impl LifecycleState for Door {
        fn as_str(&self) -> &'static str {
            match self {
                Self::Open => "OPEN",
                Self::Shut => "SHUT",
                Self::Bricked => "BRICKED",
            }
        }

        fn valid_transitions(&self) -> &'static [Door] {
            match self {
                Self::Open => &[Self::Shut],
                Self::Shut => &[Self::Open, Self::Bricked],
                Self::Bricked => &[],
            }
        }
    }

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(1_800_000_000 + secs).unwrap()
    }

    #[test]
    fn advance_records_each_step() {
        let mut state = Door::Open;
        let mut log = Vec::new();
        advance(&mut state, &mut log, Door::Shut, at(0)).unwrap();
        advance(&mut state, &mut log, Door::Bricked, at(5)).unwrap();
        assert_eq!(state, Door::Bricked);
        assert!(state.is_terminal());
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].from_state, Door::Shut);
        assert_eq!(log[1].at, at(5));
    }

    #[test]
    fn invalid_transition_leaves_state_alone() {
        let mut state = Door::Open;
        let mut log = Vec::new();
        let err = advance(&mut state, &mut log, Door::Bricked, at(0)).unwrap_err();
        assert_eq!(err.code(), "AGR_INVALID_TRANSITION");
        assert_eq!(err.to_string(), "invalid transition from OPEN to BRICKED");
        assert_eq!(state, Door::Open);
        assert!(log.is_empty());
    }
}
