//! # Delay App
//!
//! Scheduled actions that become executable a fixed delay after they are
//! submitted. During the delay anyone the app allows may challenge the
//! action through the agreement engine.
//!
//! ```text
//! Scheduled ──pause──▶ Paused ──resume──▶ Scheduled
//!     │                  │
//!     ├──stop────────────┴──▶ Stopped
//!     └──execute──▶ Executed
//! ```
//!
//! A challenge also holds execution, independently of the submitter's own
//! pause. Execution resumes when the challenge is rejected or voided; the
//! time spent on hold is added to `executable_at`. A settled or accepted
//! challenge stops the item for good.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agr_agreement::{
    advance, Agreement, AllowedPaths, DisputableApp, DisputableError, LifecycleState,
    SubmissionKind, TransitionRecord,
};
use agr_core::{Account, ActionId, AgreementId, AppId, Clock, Timestamp};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::DelayConfig;
use crate::error::DelayError;

/// Lifecycle of a delayable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelayState {
    /// Waiting for its execution time.
    Scheduled,
    /// Paused by the submitter.
    Paused,
    /// Stopped by the submitter or by a lost challenge.
    Stopped,
    /// Executed; the payload was handed back.
    Executed,
}

impl LifecycleState for DelayState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Executed => "EXECUTED",
        }
    }

    fn valid_transitions(&self) -> &'static [DelayState] {
        match self {
            Self::Scheduled => &[Self::Paused, Self::Stopped, Self::Executed],
            Self::Paused => &[Self::Scheduled, Self::Stopped],
            Self::Stopped | Self::Executed => &[],
        }
    }
}

impl std::fmt::Display for DelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delayable {
    /// Delay-local id, starting at 1.
    pub id: u64,
    /// Backing engine action.
    pub action_id: ActionId,
    /// Who scheduled it.
    pub submitter: Account,
    /// Opaque payload handed back on execution.
    pub payload: Vec<u8>,
    /// Earliest execution time, pushed back by holds.
    pub executable_at: Timestamp,
    /// Current state.
    pub state: DelayState,
    /// Start of the current hold, if any.
    pub paused_at: Option<Timestamp>,
    /// The submitter paused it.
    pub submitter_paused: bool,
    /// A challenge holds it.
    pub challenge_paused: bool,
    /// Transition history.
    pub transitions: Vec<TransitionRecord<DelayState>>,
}

impl Delayable {
    fn is_pending(&self) -> bool {
        matches!(self.state, DelayState::Scheduled | DelayState::Paused)
    }

    fn hold(&mut self, now: Timestamp) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Lift the hold once neither the submitter nor a challenge keeps it.
    fn release(&mut self, now: Timestamp) -> Result<(), agr_core::CoreError> {
        if self.submitter_paused || self.challenge_paused {
            return Ok(());
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.executable_at = self.executable_at.plus(now.since(&paused_at))?;
        }
        Ok(())
    }
}

/// Paths open on a delayable, together with the engine's own paths for
/// the backing action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayPaths {
    /// The delay passed and nothing holds the item.
    pub can_execute: bool,
    /// The submitter may stop it.
    pub can_stop: bool,
    /// The submitter may pause it.
    pub can_pause: bool,
    /// The submitter may resume it.
    pub can_resume: bool,
    /// Engine paths of the backing action.
    pub agreement: AllowedPaths,
}

/// The time-delayed disputable app.
pub struct Delay {
    app_id: AppId,
    agreement: AgreementId,
    delay_secs: u64,
    clock: Arc<dyn Clock>,
    last_id: AtomicU64,
    items: DashMap<u64, Delayable>,
    /// `None` lets anyone challenge.
    challengers: RwLock<Option<BTreeSet<Account>>>,
}

impl Delay {
    /// A Delay app waiting `delay_secs` between scheduling and execution.
    pub fn new(app_id: AppId, agreement: AgreementId, delay_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            app_id,
            agreement,
            delay_secs,
            clock,
            last_id: AtomicU64::new(0),
            items: DashMap::new(),
            challengers: RwLock::new(None),
        }
    }

    /// Build from a [`DelayConfig`].
    pub fn from_config(config: &DelayConfig, agreement: AgreementId, clock: Arc<dyn Clock>) -> Self {
        let delay = Self::new(config.app_id.clone(), agreement, config.delay_secs, clock);
        delay.set_challengers(
            config
                .challengers
                .as_ref()
                .map(|c| c.iter().cloned().collect()),
        );
        delay
    }

    /// Registry id of the app.
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Configured delay in seconds.
    pub fn delay_secs(&self) -> u64 {
        self.delay_secs
    }

    /// Replace the challenger allow-list. `None` lets anyone challenge.
    pub fn set_challengers(&self, challengers: Option<BTreeSet<Account>>) {
        *self.challengers.write() = challengers;
    }

    /// Snapshot of a delayable.
    pub fn get(&self, id: u64) -> Result<Delayable, DelayError> {
        self.items
            .get(&id)
            .map(|item| item.clone())
            .ok_or(DelayError::DelayableDoesNotExist(id))
    }

    /// Number of delayables ever scheduled.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True before the first schedule.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Submit a new scheduled action, locking the submitter's collateral.
    pub fn schedule(
        &self,
        engine: &mut Agreement,
        submitter: &Account,
        payload: Vec<u8>,
        context: Vec<u8>,
    ) -> Result<u64, DelayError> {
        let id = self.last_id.load(Ordering::SeqCst) + 1;
        let executable_at = self.clock.now().plus_secs(self.delay_secs)?;
        let action_id = engine.new_action(
            &self.app_id,
            id,
            submitter,
            context,
            SubmissionKind::Scheduled,
        )?;
        self.last_id.store(id, Ordering::SeqCst);
        self.items.insert(
            id,
            Delayable {
                id,
                action_id,
                submitter: submitter.clone(),
                payload,
                executable_at,
                state: DelayState::Scheduled,
                paused_at: None,
                submitter_paused: false,
                challenge_paused: false,
                transitions: Vec::new(),
            },
        );
        tracing::info!(
            delayable_id = id,
            action_id = %action_id,
            submitter = %submitter,
            executable_at = %executable_at,
            "delayable scheduled"
        );
        Ok(id)
    }

    /// Execute an item whose delay has passed. Returns its payload.
    pub fn execute(&self, engine: &mut Agreement, id: u64) -> Result<Vec<u8>, DelayError> {
        let item = self.get(id)?;
        if !self.can_execute(engine, &item)? {
            return Err(DelayError::CannotExecute(id));
        }
        engine.close(&self.app_id, item.action_id)?;
        let now = self.clock.now();
        self.transition(id, DelayState::Executed, now)?;
        tracing::info!(delayable_id = id, action_id = %item.action_id, "delayable executed");
        Ok(item.payload)
    }

    /// Cancel an item and release its collateral. Submitter only.
    pub fn stop(&self, engine: &mut Agreement, caller: &Account, id: u64) -> Result<(), DelayError> {
        let item = self.get(id)?;
        if !self.can_stop(engine, &item)? {
            return Err(DelayError::CannotStop(id));
        }
        if caller != &item.submitter {
            return Err(DelayError::SenderNotAllowed {
                sender: caller.to_string(),
                operation: "stop",
            });
        }
        engine.close(&self.app_id, item.action_id)?;
        let now = self.clock.now();
        self.transition(id, DelayState::Stopped, now)?;
        tracing::info!(delayable_id = id, action_id = %item.action_id, "delayable stopped");
        Ok(())
    }

    /// Hold execution. Submitter only.
    pub fn pause(&self, caller: &Account, id: u64) -> Result<(), DelayError> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(DelayError::DelayableDoesNotExist(id))?;
        if item.state != DelayState::Scheduled {
            return Err(DelayError::CannotPause(id));
        }
        if caller != &item.submitter {
            return Err(DelayError::SenderNotAllowed {
                sender: caller.to_string(),
                operation: "pause",
            });
        }
        let now = self.clock.now();
        let entry = item.value_mut();
        advance(&mut entry.state, &mut entry.transitions, DelayState::Paused, now)?;
        entry.submitter_paused = true;
        entry.hold(now);
        tracing::info!(delayable_id = id, "delayable paused");
        Ok(())
    }

    /// Lift the submitter's hold. Submitter only.
    pub fn resume(&self, caller: &Account, id: u64) -> Result<(), DelayError> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(DelayError::DelayableDoesNotExist(id))?;
        if item.state != DelayState::Paused {
            return Err(DelayError::CannotResume(id));
        }
        if caller != &item.submitter {
            return Err(DelayError::SenderNotAllowed {
                sender: caller.to_string(),
                operation: "resume",
            });
        }
        let now = self.clock.now();
        let entry = item.value_mut();
        let mut staged = entry.clone();
        advance(&mut staged.state, &mut staged.transitions, DelayState::Scheduled, now)?;
        staged.submitter_paused = false;
        staged.release(now)?;
        *entry = staged;
        tracing::info!(delayable_id = id, executable_at = %entry.executable_at, "delayable resumed");
        Ok(())
    }

    /// Paths open on a delayable right now.
    pub fn get_allowed_paths(&self, engine: &Agreement, id: u64) -> Result<DelayPaths, DelayError> {
        let item = self.get(id)?;
        let agreement = engine.get_allowed_paths(item.action_id)?;
        Ok(DelayPaths {
            can_execute: self.can_execute(engine, &item)?,
            can_stop: self.can_stop(engine, &item)?,
            can_pause: item.state == DelayState::Scheduled,
            can_resume: item.state == DelayState::Paused,
            agreement,
        })
    }

    fn can_execute(&self, engine: &Agreement, item: &Delayable) -> Result<bool, DelayError> {
        Ok(item.state == DelayState::Scheduled
            && !item.challenge_paused
            && self.clock.now() >= item.executable_at
            && engine.can_close(item.action_id)?)
    }

    fn can_stop(&self, engine: &Agreement, item: &Delayable) -> Result<bool, DelayError> {
        Ok(item.is_pending() && engine.can_close(item.action_id)?)
    }

    fn transition(&self, id: u64, target: DelayState, now: Timestamp) -> Result<(), DelayError> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(DelayError::DelayableDoesNotExist(id))?;
        let entry = item.value_mut();
        advance(&mut entry.state, &mut entry.transitions, target, now)?;
        Ok(())
    }

    /// Apply a callback to the item behind `disputable_action_id`.
    fn on_item(
        &self,
        agreement: AgreementId,
        disputable_action_id: u64,
        f: impl FnOnce(&mut Delayable, Timestamp) -> Result<(), DisputableError>,
    ) -> Result<(), DisputableError> {
        if agreement != self.agreement {
            return Err(DisputableError::SenderNotAgreement);
        }
        let mut item = self
            .items
            .get_mut(&disputable_action_id)
            .ok_or(DisputableError::ActionDoesNotExist(disputable_action_id))?;
        f(item.value_mut(), self.clock.now())
    }
}

impl std::fmt::Debug for Delay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delay")
            .field("app_id", &self.app_id)
            .field("delay_secs", &self.delay_secs)
            .field("items", &self.items.len())
            .finish()
    }
}

impl DisputableApp for Delay {
    fn app_id(&self) -> &AppId {
        &self.app_id
    }

    fn can_challenge(&self, disputable_action_id: u64, challenger: &Account) -> bool {
        let pending = self
            .items
            .get(&disputable_action_id)
            .is_some_and(|item| item.is_pending());
        let permitted = match &*self.challengers.read() {
            Some(allowed) => allowed.contains(challenger),
            None => true,
        };
        pending && permitted
    }

    fn on_challenged(
        &self,
        agreement: AgreementId,
        disputable_action_id: u64,
        challenger: &Account,
    ) -> Result<(), DisputableError> {
        self.on_item(agreement, disputable_action_id, |item, now| {
            item.challenge_paused = true;
            item.hold(now);
            tracing::info!(delayable_id = item.id, challenger = %challenger, "delayable held by challenge");
            Ok(())
        })
    }

    fn on_allowed(&self, agreement: AgreementId, disputable_action_id: u64) -> Result<(), DisputableError> {
        self.on_item(agreement, disputable_action_id, lift_challenge_hold)
    }

    fn on_rejected(&self, agreement: AgreementId, disputable_action_id: u64) -> Result<(), DisputableError> {
        self.on_item(agreement, disputable_action_id, |item, now| {
            item.challenge_paused = false;
            item.paused_at = None;
            advance(&mut item.state, &mut item.transitions, DelayState::Stopped, now)
                .map_err(|e| DisputableError::Rejected(e.to_string()))?;
            tracing::info!(delayable_id = item.id, "delayable stopped by challenge");
            Ok(())
        })
    }

    fn on_voided(&self, agreement: AgreementId, disputable_action_id: u64) -> Result<(), DisputableError> {
        self.on_item(agreement, disputable_action_id, lift_challenge_hold)
    }
}

fn lift_challenge_hold(item: &mut Delayable, now: Timestamp) -> Result<(), DisputableError> {
    item.challenge_paused = false;
    item.release(now)
        .map_err(|e| DisputableError::Rejected(e.to_string()))?;
    tracing::info!(delayable_id = item.id, executable_at = %item.executable_at, "challenge hold lifted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agr_agreement::{CollateralRequirementInput, InMemoryArbitrator, InMemoryCustody, Ruling};
    use agr_core::{Amount, MockClock, TokenId};

    // ----- Helpers -----

    const DELAY: u64 = 1_000;
    const ANSWER: u64 = 100;

    fn alice() -> Account {
        Account::new("alice")
    }

    fn bob() -> Account {
        Account::new("bob")
    }

    struct Fixture {
        clock: Arc<MockClock>,
        custody: Arc<InMemoryCustody>,
        court: Arc<InMemoryArbitrator>,
        delay: Arc<Delay>,
        engine: Agreement,
    }

    fn fixture() -> Fixture {
        fixture_with_delay(DELAY)
    }

    fn fixture_with_delay(delay_secs: u64) -> Fixture {
        let ant = TokenId::new("ANT");
        let dai = TokenId::new("DAI");
        let clock = Arc::new(MockClock::new(
            Timestamp::parse("2026-05-01T00:00:00Z").unwrap(),
        ));
        let custody = Arc::new(InMemoryCustody::new());
        custody.mint(&ant, &alice(), Amount(1_000)).unwrap();
        custody.stake(&ant, &alice(), Amount(1_000)).unwrap();
        custody.mint(&dai, &alice(), Amount(100)).unwrap();
        custody.mint(&ant, &bob(), Amount(1_000)).unwrap();
        custody.mint(&dai, &bob(), Amount(100)).unwrap();
        let court = Arc::new(InMemoryArbitrator::new(Account::new("court"), dai, Amount(10)));
        let mut engine = Agreement::new(
            "Delay covenant",
            Vec::new(),
            court.clone(),
            custody.clone(),
            clock.clone(),
        )
        .unwrap();
        let delay = Arc::new(Delay::new(AppId::new("delay"), engine.id(), delay_secs, clock.clone()));
        engine
            .activate(
                delay.clone(),
                CollateralRequirementInput {
                    token: ant,
                    action_collateral: Amount(100),
                    challenge_collateral: Amount(50),
                    challenge_duration_secs: ANSWER,
                },
            )
            .unwrap();
        engine.sign(&alice()).unwrap();
        Fixture {
            clock,
            custody,
            court,
            delay,
            engine,
        }
    }

    impl Fixture {
        fn schedule(&mut self) -> u64 {
            self.delay
                .schedule(&mut self.engine, &alice(), b"transfer".to_vec(), b"ctx".to_vec())
                .unwrap()
        }

        fn challenge(&mut self, id: u64) {
            let action_id = self.delay.get(id).unwrap().action_id;
            self.engine
                .challenge(action_id, &bob(), Amount(0), Vec::new())
                .unwrap();
        }

        fn rule(&mut self, id: u64, ruling: Ruling) {
            let action_id = self.delay.get(id).unwrap().action_id;
            let dispute_id = self.engine.dispute(action_id, &alice()).unwrap();
            self.court.decide(dispute_id, ruling).unwrap();
            self.engine.rule(&Account::new("court"), dispute_id).unwrap();
        }

        fn locked(&self) -> Amount {
            self.engine
                .stake_balance(&TokenId::new("ANT"), &alice())
                .locked
        }
    }

    #[test]
    fn schedule_creates_scheduled_action() {
        let mut f = fixture();
        let id = f.schedule();
        let item = f.delay.get(id).unwrap();
        assert_eq!(item.state, DelayState::Scheduled);
        assert_eq!(item.executable_at, f.clock.now().plus_secs(DELAY).unwrap());
        assert_eq!(
            f.engine.get_action(item.action_id).unwrap().state,
            agr_agreement::ActionState::Scheduled
        );
        assert_eq!(f.locked(), Amount(100));
    }

    #[test]
    fn unrepresentable_delay_leaves_no_action_behind() {
        let mut f = fixture_with_delay(u64::MAX);
        let err = f
            .delay
            .schedule(&mut f.engine, &alice(), b"transfer".to_vec(), Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), "DELAY_INTERNAL");
        assert_eq!(f.locked(), Amount::ZERO);
        assert_eq!(f.engine.actions().count(), 0);
        assert!(f.delay.is_empty());
    }

    #[test]
    fn execute_waits_for_the_delay() {
        let mut f = fixture();
        let id = f.schedule();
        f.clock.advance_secs(DELAY - 1).unwrap();
        let err = f.delay.execute(&mut f.engine, id).unwrap_err();
        assert_eq!(err.code(), "DELAY_CANNOT_EXECUTE_DELAYABLE");
        f.clock.advance_secs(1).unwrap();
        assert_eq!(f.delay.execute(&mut f.engine, id).unwrap(), b"transfer".to_vec());
        assert_eq!(f.delay.get(id).unwrap().state, DelayState::Executed);
        assert_eq!(f.locked(), Amount::ZERO);
        let err = f.delay.execute(&mut f.engine, id).unwrap_err();
        assert_eq!(err.code(), "DELAY_CANNOT_EXECUTE_DELAYABLE");
    }

    #[test]
    fn stop_is_submitter_only_and_unlocks() {
        let mut f = fixture();
        let id = f.schedule();
        let err = f.delay.stop(&mut f.engine, &bob(), id).unwrap_err();
        assert_eq!(err.code(), "DELAY_SENDER_NOT_ALLOWED");
        f.delay.stop(&mut f.engine, &alice(), id).unwrap();
        assert_eq!(f.locked(), Amount::ZERO);
        let err = f.delay.stop(&mut f.engine, &alice(), id).unwrap_err();
        assert_eq!(err.code(), "DELAY_CANNOT_STOP_DELAYABLE");
        f.clock.advance_secs(DELAY).unwrap();
        assert!(f.delay.execute(&mut f.engine, id).is_err());
    }

    #[test]
    fn unknown_delayable() {
        let mut f = fixture();
        let err = f.delay.execute(&mut f.engine, 0).unwrap_err();
        assert_eq!(err.code(), "DELAY_DELAYABLE_DOES_NOT_EXIST");
    }

    #[test]
    fn challenge_blocks_execution_and_stop() {
        let mut f = fixture();
        let id = f.schedule();
        f.challenge(id);
        f.clock.advance_secs(DELAY).unwrap();
        let paths = f.delay.get_allowed_paths(&f.engine, id).unwrap();
        assert!(!paths.can_execute);
        assert!(!paths.can_stop);
        assert!(paths.agreement.can_claim_settlement);
    }

    #[test]
    fn ruling_for_submitter_reopens_execution_after_extension() {
        let mut f = fixture();
        let id = f.schedule();
        let original = f.delay.get(id).unwrap().executable_at;
        f.clock.advance_secs(10).unwrap();
        f.challenge(id);
        f.clock.advance_secs(50).unwrap();
        f.rule(id, Ruling::InFavorOfSubmitter);
        let item = f.delay.get(id).unwrap();
        assert!(!item.challenge_paused);
        assert_eq!(item.executable_at, original.plus_secs(50).unwrap());
        f.clock.set(original.plus_secs(50).unwrap());
        f.delay.execute(&mut f.engine, id).unwrap();
    }

    #[test]
    fn refused_ruling_reopens_execution() {
        let mut f = fixture();
        let id = f.schedule();
        f.challenge(id);
        f.rule(id, Ruling::Refused);
        f.clock.advance_secs(DELAY).unwrap();
        f.delay.execute(&mut f.engine, id).unwrap();
    }

    #[test]
    fn ruling_for_challenger_stops_the_item() {
        let mut f = fixture();
        let id = f.schedule();
        f.challenge(id);
        f.rule(id, Ruling::InFavorOfChallenger);
        assert_eq!(f.delay.get(id).unwrap().state, DelayState::Stopped);
        f.clock.advance_secs(DELAY).unwrap();
        assert!(f.delay.execute(&mut f.engine, id).is_err());
        let err = f.delay.stop(&mut f.engine, &alice(), id).unwrap_err();
        assert_eq!(err.code(), "DELAY_CANNOT_STOP_DELAYABLE");
        assert_eq!(f.locked(), Amount::ZERO);
    }

    #[test]
    fn stop_after_rejected_challenge_unlocks_collateral() {
        let mut f = fixture();
        let id = f.schedule();
        f.challenge(id);
        f.rule(id, Ruling::InFavorOfSubmitter);
        assert_eq!(f.locked(), Amount(100));
        f.delay.stop(&mut f.engine, &alice(), id).unwrap();
        assert_eq!(f.locked(), Amount::ZERO);
    }

    #[test]
    fn settlement_stops_the_item() {
        let mut f = fixture();
        let id = f.schedule();
        f.challenge(id);
        let action_id = f.delay.get(id).unwrap().action_id;
        f.engine.settle(action_id, &alice()).unwrap();
        assert_eq!(f.delay.get(id).unwrap().state, DelayState::Stopped);
        assert_eq!(f.custody.escrow_balance(&TokenId::new("ANT")), Amount::ZERO);
    }

    #[test]
    fn pause_and_resume_extend_the_delay() {
        let mut f = fixture();
        let id = f.schedule();
        let original = f.delay.get(id).unwrap().executable_at;
        let err = f.delay.pause(&bob(), id).unwrap_err();
        assert_eq!(err.code(), "DELAY_SENDER_NOT_ALLOWED");
        f.delay.pause(&alice(), id).unwrap();
        f.clock.advance_secs(DELAY).unwrap();
        assert!(f.delay.execute(&mut f.engine, id).is_err());
        f.delay.resume(&alice(), id).unwrap();
        assert_eq!(
            f.delay.get(id).unwrap().executable_at,
            original.plus_secs(DELAY).unwrap()
        );
        let err = f.delay.resume(&alice(), id).unwrap_err();
        assert_eq!(err.code(), "DELAY_CANNOT_RESUME_DELAYABLE");
    }

    #[test]
    fn paused_item_can_still_be_stopped_and_challenged() {
        let mut f = fixture();
        let id = f.schedule();
        f.delay.pause(&alice(), id).unwrap();
        assert!(f.delay.can_challenge(id, &bob()));
        f.delay.stop(&mut f.engine, &alice(), id).unwrap();
        assert!(!f.delay.can_challenge(id, &bob()));
    }

    #[test]
    fn allow_list_restricts_challengers() {
        let mut f = fixture();
        let id = f.schedule();
        f.delay
            .set_challengers(Some([Account::new("guardian")].into_iter().collect()));
        let action_id = f.delay.get(id).unwrap().action_id;
        let err = f
            .engine
            .challenge(action_id, &bob(), Amount(0), Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), "AGR_SENDER_CANT_CHALLENGE_ACTION");
    }

    #[test]
    fn foreign_agreement_callbacks_are_rejected() {
        let mut f = fixture();
        let id = f.schedule();
        let err = f.delay.on_rejected(AgreementId::new(), id).unwrap_err();
        assert_eq!(err.code(), "DISPUTABLE_SENDER_NOT_AGREEMENT");
        assert_eq!(f.delay.get(id).unwrap().state, DelayState::Scheduled);
    }
}
