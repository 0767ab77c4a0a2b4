//! # Agreement Engine
//!
//! The controller that ties the registries, the action and challenge
//! stores, and the custody and arbitrator adapters together.
//!
//! ## Entry points
//!
//! | Operation | Caller | Effect |
//! |---|---|---|
//! | [`new_action`](Agreement::new_action) | disputable app | lock action collateral, open action |
//! | [`challenge`](Agreement::challenge) | anyone the app allows | escrow challenge collateral and dispute fee |
//! | [`settle`](Agreement::settle) | submitter; anyone after the answer window | slash the offer, refund the challenger |
//! | [`dispute`](Agreement::dispute) | submitter, inside the answer window | pay the fee, open a dispute |
//! | [`submit_evidence`](Agreement::submit_evidence) | submitter or challenger | forward evidence |
//! | [`rule`](Agreement::rule) | bound arbitrator | apply the ruling |
//! | [`close`](Agreement::close) | owning app | unlock collateral, close action |
//!
//! ## Atomicity
//!
//! Each entry point validates first, then moves money through a single
//! [`CustodyBatch`], then mutates engine state. A custody failure leaves the
//! engine untouched. `dispute` is the one entry point that calls the
//! arbitrator after paying: if the arbitrator refuses the new dispute or its
//! opening evidence, the fee goes back to the submitter. App callbacks run
//! last, after the transition is committed; their failures are logged and
//! counted, never propagated.

use std::collections::BTreeMap;
use std::sync::Arc;

use agr_core::{
    sha256_digest, Account, ActionId, AgreementId, Amount, AppId, CanonicalBytes, ChallengeId,
    Clock, CollateralRequirementId, ContentDigest, CoreError, DisputeId, SettingId, Timestamp, TokenId,
};

use crate::action::{Action, ActionStore, NewAction, SubmissionKind};
use crate::arbitrator::{Arbitrator, Ruling};
use crate::challenge::{Challenge, ChallengeState, ChallengeStore, FeeDeposit, NewChallenge};
use crate::collateral::{CollateralRequirement, CollateralRequirementInput};
use crate::custody::{Custody, CustodyBatch, StakeBalance};
use crate::disputable::{DisputableApp, Notification};
use crate::error::{AgreementError, ArbitratorError};
use crate::events::{Event, EventLog, EventRecord};
use crate::paths::{is_open, AllowedPaths};
use crate::registry::{AppRegistry, DisputableInfo, DisputableState};
use crate::setting::{Setting, SettingRegistry, SignerInfo};

/// A collateral-backed agreement between the participants of a set of
/// disputable apps.
pub struct Agreement {
    id: AgreementId,
    title: String,
    clock: Arc<dyn Clock>,
    custody: Arc<dyn Custody>,
    arbitrators: BTreeMap<Account, Arc<dyn Arbitrator>>,
    settings: SettingRegistry,
    apps: AppRegistry,
    actions: ActionStore,
    challenges: ChallengeStore,
    events: EventLog,
}

impl Agreement {
    /// Create an engine whose first setting binds `arbitrator`.
    pub fn new(
        title: impl Into<String>,
        content: Vec<u8>,
        arbitrator: Arc<dyn Arbitrator>,
        custody: Arc<dyn Custody>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AgreementError> {
        let title = title.into();
        let mut engine = Self {
            id: AgreementId::new(),
            title: title.clone(),
            clock,
            custody,
            arbitrators: BTreeMap::new(),
            settings: SettingRegistry::new(),
            apps: AppRegistry::new(),
            actions: ActionStore::new(),
            challenges: ChallengeStore::new(),
            events: EventLog::new(),
        };
        engine.change_setting(arbitrator, title, content)?;
        tracing::info!(agreement = %engine.id, title = %engine.title, "agreement created");
        Ok(engine)
    }

    /// Random id minted at construction.
    pub fn id(&self) -> AgreementId {
        self.id
    }

    /// Title of the first setting.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current engine time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The custody adapter.
    pub fn custody(&self) -> &Arc<dyn Custody> {
        &self.custody
    }

    /// Every event emitted so far.
    pub fn events(&self) -> &[EventRecord] {
        self.events.records()
    }

    // ── Settings and signers ────────────────────────────────────────

    /// Append a new setting bound to `arbitrator`. Every signer must sign
    /// again before submitting.
    pub fn change_setting(
        &mut self,
        arbitrator: Arc<dyn Arbitrator>,
        title: impl Into<String>,
        content: Vec<u8>,
    ) -> Result<SettingId, AgreementError> {
        let now = self.now();
        let account = arbitrator.account().clone();
        let setting_id = self
            .settings
            .create_setting(title, content, account.clone(), now)?;
        self.arbitrators.insert(account.clone(), arbitrator);
        self.events.emit(now, Event::SettingChanged { setting_id });
        tracing::info!(setting_id = %setting_id, arbitrator = %account, "setting changed");
        Ok(setting_id)
    }

    /// Sign the current setting.
    pub fn sign(&mut self, signer: &Account) -> Result<SettingId, AgreementError> {
        let setting_id = self.settings.sign(signer)?;
        let now = self.now();
        self.events.emit(
            now,
            Event::Signed {
                signer: signer.clone(),
                setting_id,
            },
        );
        tracing::debug!(signer = %signer, setting_id = %setting_id, "signed");
        Ok(setting_id)
    }

    /// What `signer` last signed and whether they must sign again.
    pub fn signer(&self, signer: &Account) -> SignerInfo {
        self.settings.signer_info(signer)
    }

    /// Id of the setting in force.
    pub fn current_setting_id(&self) -> SettingId {
        self.settings.current_setting_id()
    }

    /// Look up a setting.
    pub fn setting(&self, id: SettingId) -> Result<&Setting, AgreementError> {
        self.settings
            .get(id)
            .ok_or(AgreementError::SettingDoesNotExist(id))
    }

    /// Arbitrator registered under `account`, if any setting ever bound it.
    pub fn arbitrator(&self, account: &Account) -> Option<Arc<dyn Arbitrator>> {
        self.arbitrators.get(account).cloned()
    }

    // ── Disputable apps ─────────────────────────────────────────────

    /// Register a disputable app with its first collateral requirement.
    pub fn activate(
        &mut self,
        app: Arc<dyn DisputableApp>,
        requirement: CollateralRequirementInput,
    ) -> Result<CollateralRequirementId, AgreementError> {
        let now = self.now();
        let app_id = app.app_id().clone();
        let collateral_requirement_id = self.apps.activate(app, requirement, now)?;
        self.events.emit(
            now,
            Event::DisputableAppActivated {
                app: app_id.clone(),
                collateral_requirement_id,
            },
        );
        self.events.emit(
            now,
            Event::CollateralRequirementChanged {
                app: app_id.clone(),
                collateral_requirement_id,
            },
        );
        tracing::info!(app = %app_id, collateral_requirement_id = %collateral_requirement_id, "disputable app activated");
        Ok(collateral_requirement_id)
    }

    /// Start unregistering an app. It is unregistered at once when it has no
    /// ongoing actions, otherwise when the last one finishes.
    pub fn deactivate(&mut self, app: &AppId) -> Result<DisputableState, AgreementError> {
        let now = self.now();
        let state = self.apps.deactivate(app)?;
        self.events
            .emit(now, Event::DisputableAppDeactivated { app: app.clone() });
        if state == DisputableState::Unregistered {
            self.events
                .emit(now, Event::DisputableAppUnregistered { app: app.clone() });
        }
        tracing::info!(app = %app, state = %state, "disputable app deactivated");
        Ok(state)
    }

    /// Replace an app's collateral requirement. Existing actions keep theirs.
    pub fn change_collateral_requirement(
        &mut self,
        app: &AppId,
        requirement: CollateralRequirementInput,
    ) -> Result<CollateralRequirementId, AgreementError> {
        let now = self.now();
        let collateral_requirement_id =
            self.apps.change_collateral_requirement(app, requirement, now)?;
        self.events.emit(
            now,
            Event::CollateralRequirementChanged {
                app: app.clone(),
                collateral_requirement_id,
            },
        );
        Ok(collateral_requirement_id)
    }

    /// Registry entry for an app.
    pub fn disputable_info(&self, app: &AppId) -> Option<&DisputableInfo> {
        self.apps.info(app)
    }

    /// A requirement of an app, current or past.
    pub fn collateral_requirement(
        &self,
        app: &AppId,
        id: CollateralRequirementId,
    ) -> Result<&CollateralRequirement, AgreementError> {
        self.apps.requirement(app, id)
    }

    // ── Lookups ─────────────────────────────────────────────────────

    /// Look up an action.
    pub fn get_action(&self, id: ActionId) -> Result<&Action, AgreementError> {
        self.actions.get(id)
    }

    /// Look up a challenge.
    pub fn get_challenge(&self, id: ChallengeId) -> Result<&Challenge, AgreementError> {
        self.challenges.get(id)
    }

    /// Every action in id order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Every challenge in id order.
    pub fn challenges(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter()
    }

    /// Latest challenge raised against an action.
    pub fn current_challenge(&self, action_id: ActionId) -> Result<Option<&Challenge>, AgreementError> {
        let action = self.actions.get(action_id)?;
        Ok(self.latest_challenge(action))
    }

    /// What can happen to the action right now.
    pub fn get_allowed_paths(&self, action_id: ActionId) -> Result<AllowedPaths, AgreementError> {
        let action = self.actions.get(action_id)?;
        Ok(AllowedPaths::evaluate(
            action,
            self.latest_challenge(action),
            self.now(),
        ))
    }

    /// Whether the action can be closed right now.
    pub fn can_close(&self, action_id: ActionId) -> Result<bool, AgreementError> {
        let action = self.actions.get(action_id)?;
        Ok(is_open(action, self.latest_challenge(action)))
    }

    /// The staker's stake balance as held by custody.
    pub fn stake_balance(&self, token: &TokenId, staker: &Account) -> StakeBalance {
        self.custody.stake_balance(token, staker)
    }

    /// Action collateral of `staker` currently under an active challenge.
    pub fn challenged_balance(&self, token: &TokenId, staker: &Account) -> Amount {
        self.actions
            .iter()
            .filter(|a| &a.submitter == staker && !a.collateral_released)
            .filter(|a| self.latest_challenge(a).is_some_and(|c| c.state.is_active()))
            .filter_map(|a| self.apps.requirement(&a.app, a.collateral_requirement_id).ok())
            .filter(|r| &r.token == token)
            .fold(Amount::ZERO, |acc, r| {
                Amount(acc.0.saturating_add(r.action_collateral.0))
            })
    }

    // ── Submit and close ────────────────────────────────────────────

    /// Open a new action on behalf of `submitter`, locking the app's
    /// current action collateral.
    pub fn new_action(
        &mut self,
        app: &AppId,
        disputable_action_id: u64,
        submitter: &Account,
        context: Vec<u8>,
        kind: SubmissionKind,
    ) -> Result<ActionId, AgreementError> {
        if !self.apps.is_registered(app) {
            return Err(AgreementError::DisputableAppNotRegistered(app.clone()));
        }
        if self.settings.signer_must_sign(submitter) {
            return Err(AgreementError::MustSign {
                signer: submitter.clone(),
                setting_id: self.settings.current_setting_id(),
            });
        }
        let requirement = self.apps.current_requirement(app)?.clone();
        let balance = self.custody.stake_balance(&requirement.token, submitter);
        if balance.available < requirement.action_collateral {
            return Err(AgreementError::NotEnoughStake {
                token: requirement.token,
                staker: submitter.clone(),
                required: requirement.action_collateral,
                available: balance.available,
            });
        }

        self.custody.execute(&CustodyBatch::new().lock(
            &requirement.token,
            submitter,
            requirement.action_collateral,
        ))?;

        let now = self.now();
        let action_id = self.actions.insert(NewAction {
            app: app.clone(),
            disputable_action_id,
            submitter: submitter.clone(),
            setting_id: self.settings.current_setting_id(),
            collateral_requirement_id: requirement.id,
            context,
            kind,
            submitted_at: now,
        });
        self.apps.action_opened(app);
        self.events.emit(
            now,
            Event::ActionSubmitted {
                action_id,
                app: app.clone(),
            },
        );
        metrics::counter!("agreement_actions_submitted_total").increment(1);
        tracing::info!(
            action_id = %action_id,
            app = %app,
            submitter = %submitter,
            collateral = %requirement.action_collateral,
            "action submitted"
        );
        Ok(action_id)
    }

    /// Close an action owned by `app`, unlocking its collateral.
    pub fn close(&mut self, app: &AppId, action_id: ActionId) -> Result<(), AgreementError> {
        let action = self.actions.get(action_id)?;
        if &action.app != app {
            return Err(AgreementError::SenderNotAllowed {
                sender: app.to_string(),
                operation: "close",
            });
        }
        if !is_open(action, self.latest_challenge(action)) {
            return Err(AgreementError::CannotClose(action_id));
        }
        let action = action.clone();

        if !action.collateral_released {
            let requirement = self
                .apps
                .requirement(&action.app, action.collateral_requirement_id)?;
            self.custody.execute(&CustodyBatch::new().unlock(
                &requirement.token,
                &action.submitter,
                requirement.action_collateral,
            ))?;
        }

        let now = self.now();
        self.actions.get_mut(action_id)?.mark_closed(now)?;
        self.finish_action(&action.app, now);
        self.events.emit(now, Event::ActionClosed { action_id });
        metrics::counter!("agreement_actions_closed_total").increment(1);
        tracing::info!(action_id = %action_id, app = %app, "action closed");
        Ok(())
    }

    // ── Challenge and settlement ────────────────────────────────────

    /// Challenge an action. The challenger escrows the challenge collateral
    /// and the arbitrator's current dispute fee.
    pub fn challenge(
        &mut self,
        action_id: ActionId,
        challenger: &Account,
        settlement_offer: Amount,
        context: Vec<u8>,
    ) -> Result<ChallengeId, AgreementError> {
        let action = self.actions.get(action_id)?;
        if action.is_closed() {
            return Err(AgreementError::CannotChallenge {
                action_id,
                reason: "action is closed",
            });
        }
        if !is_open(action, self.latest_challenge(action)) {
            return Err(AgreementError::CannotChallenge {
                action_id,
                reason: "latest challenge is still in effect",
            });
        }
        let action = action.clone();
        let handle = self
            .apps
            .handle(&action.app)
            .ok_or_else(|| AgreementError::DisputableAppNotRegistered(action.app.clone()))?;
        if !handle.can_challenge(action.disputable_action_id, challenger) {
            return Err(AgreementError::SenderCannotChallengeAction {
                action_id,
                challenger: challenger.clone(),
            });
        }
        let requirement = self
            .apps
            .requirement(&action.app, action.collateral_requirement_id)?
            .clone();
        let fees = self.arbitrator_for(action.setting_id)?.dispute_fees();
        let now = self.now();
        let end_date = now.plus_secs(requirement.challenge_duration_secs)?;

        self.custody.execute(
            &CustodyBatch::new()
                .transfer_in(&requirement.token, challenger, requirement.challenge_collateral)
                .transfer_in(&fees.token, challenger, fees.amount),
        )?;

        let challenge_id = self.challenges.insert(NewChallenge {
            action_id,
            challenger: challenger.clone(),
            context,
            settlement_offer,
            end_date,
            collateral_requirement_id: requirement.id,
            challenger_arbitrator_fees: FeeDeposit {
                token: fees.token,
                amount: fees.amount,
            },
            created_at: now,
        });
        self.actions
            .get_mut(action_id)?
            .mark_challenged(challenge_id, end_date, now)?;
        self.events.emit(
            now,
            Event::ActionChallenged {
                action_id,
                challenge_id,
            },
        );
        metrics::counter!("agreement_actions_challenged_total").increment(1);
        tracing::info!(
            action_id = %action_id,
            challenge_id = %challenge_id,
            challenger = %challenger,
            settlement_offer = %settlement_offer,
            end_date = %end_date,
            "action challenged"
        );

        self.notify(
            &action.app,
            Notification::Challenged {
                disputable_action_id: action.disputable_action_id,
                challenger: challenger.clone(),
            },
        );
        Ok(challenge_id)
    }

    /// Accept the challenger's settlement offer.
    ///
    /// Before the end of the answer window only the submitter may settle;
    /// from the end date on, anyone may.
    pub fn settle(&mut self, action_id: ActionId, caller: &Account) -> Result<(), AgreementError> {
        let (action, challenge) = self.waiting_challenge(action_id)
            .map_err(|e| match e {
                AgreementError::ActionDoesNotExist(_) => e,
                _ => AgreementError::CannotSettle(action_id),
            })?;
        let now = self.now();
        if now < challenge.end_date && caller != &action.submitter {
            return Err(AgreementError::CannotSettle(action_id));
        }
        let requirement = self
            .apps
            .requirement(&action.app, action.collateral_requirement_id)?
            .clone();
        let slashed = std::cmp::min(challenge.settlement_offer, requirement.action_collateral);
        let unlocked = requirement.action_collateral.saturating_sub(slashed);
        let fee = &challenge.challenger_arbitrator_fees;

        self.custody.execute(
            &CustodyBatch::new()
                .slash(&requirement.token, &action.submitter, slashed, &challenge.challenger)
                .unlock(&requirement.token, &action.submitter, unlocked)
                .transfer_out(&requirement.token, requirement.challenge_collateral, &challenge.challenger)
                .transfer_out(&fee.token, fee.amount, &challenge.challenger),
        )?;

        self.challenges
            .get_mut(challenge.id)?
            .transition_to(ChallengeState::Settled, now)?;
        self.actions.get_mut(action_id)?.collateral_released = true;
        self.finish_action(&action.app, now);
        self.events.emit(
            now,
            Event::ActionSettled {
                action_id,
                challenge_id: challenge.id,
            },
        );
        metrics::counter!("agreement_challenges_settled_total").increment(1);
        tracing::info!(
            action_id = %action_id,
            challenge_id = %challenge.id,
            caller = %caller,
            slashed = %slashed,
            "challenge settled"
        );

        self.notify(
            &action.app,
            Notification::Rejected {
                disputable_action_id: action.disputable_action_id,
            },
        );
        Ok(())
    }

    // ── Dispute, evidence, ruling ───────────────────────────────────

    /// Raise the challenge to the arbitrator. Only the submitter may
    /// dispute, and only strictly before the challenge end date. Both
    /// parties' contexts are filed as opening evidence.
    pub fn dispute(&mut self, action_id: ActionId, caller: &Account) -> Result<DisputeId, AgreementError> {
        let (action, challenge) = self.waiting_challenge(action_id)
            .map_err(|e| match e {
                AgreementError::ActionDoesNotExist(_) => e,
                _ => AgreementError::CannotDispute(action_id),
            })?;
        let now = self.now();
        if now >= challenge.end_date {
            return Err(AgreementError::CannotDispute(action_id));
        }
        if caller != &action.submitter {
            return Err(AgreementError::SenderNotAllowed {
                sender: caller.to_string(),
                operation: "dispute",
            });
        }
        let arbitrator = self.arbitrator_for(action.setting_id)?;
        let fees = arbitrator.dispute_fees();
        let batch = CustodyBatch::new()
            .transfer_in(&fees.token, &action.submitter, fees.amount)
            .transfer_out(&fees.token, fees.amount, arbitrator.account());
        let metadata = self.dispute_metadata(&action, &challenge)?;
        self.custody.execute(&batch)?;

        let opened = arbitrator
            .create_dispute(Ruling::POSSIBLE_RULINGS, metadata)
            .and_then(|dispute_id| {
                arbitrator.submit_evidence(dispute_id, &action.submitter, &action.context, false)?;
                arbitrator.submit_evidence(dispute_id, &challenge.challenger, &challenge.context, false)?;
                Ok(dispute_id)
            });
        let dispute_id = match opened {
            Ok(dispute_id) => dispute_id,
            Err(err) => {
                let refund = CustodyBatch::new()
                    .transfer_in(&fees.token, arbitrator.account(), fees.amount)
                    .transfer_out(&fees.token, fees.amount, &action.submitter);
                if let Err(refund_err) = self.custody.execute(&refund) {
                    tracing::error!(
                        action_id = %action_id,
                        code = refund_err.code(),
                        error = %refund_err,
                        "dispute fee refund failed"
                    );
                }
                return Err(err.into());
            }
        };

        let record = self.challenges.get_mut(challenge.id)?;
        record.transition_to(ChallengeState::Disputed, now)?;
        record.dispute_id = Some(dispute_id);
        record.submitter_arbitrator_fees = Some(FeeDeposit {
            token: fees.token,
            amount: fees.amount,
        });
        self.challenges
            .index_dispute(arbitrator.account().clone(), dispute_id, challenge.id);
        self.events.emit(
            now,
            Event::ActionDisputed {
                action_id,
                challenge_id: challenge.id,
                dispute_id,
            },
        );
        metrics::counter!("agreement_disputes_created_total").increment(1);
        tracing::info!(
            action_id = %action_id,
            challenge_id = %challenge.id,
            dispute_id = %dispute_id,
            arbitrator = %arbitrator.account(),
            "action disputed"
        );
        Ok(dispute_id)
    }

    /// Forward evidence from either party of a disputed challenge. Once
    /// both parties have finished, the evidence period is closed.
    pub fn submit_evidence(
        &mut self,
        action_id: ActionId,
        sender: &Account,
        evidence: Vec<u8>,
        finished: bool,
    ) -> Result<(), AgreementError> {
        let action = self.actions.get(action_id)?;
        let challenge = self
            .latest_challenge(action)
            .filter(|c| c.state == ChallengeState::Disputed)
            .ok_or(AgreementError::CannotSubmitEvidence(action_id))?;
        let dispute_id = challenge
            .dispute_id
            .ok_or(AgreementError::CannotSubmitEvidence(action_id))?;
        let is_submitter = sender == &action.submitter;
        if !is_submitter && sender != &challenge.challenger {
            return Err(AgreementError::SenderNotAllowed {
                sender: sender.to_string(),
                operation: "submit evidence",
            });
        }
        if is_submitter && challenge.submitter_finished_evidence {
            return Err(AgreementError::SubmitterFinishedEvidence(action_id));
        }
        if !is_submitter && challenge.challenger_finished_evidence {
            return Err(AgreementError::ChallengerFinishedEvidence(action_id));
        }
        let counterpart_finished = if is_submitter {
            challenge.challenger_finished_evidence
        } else {
            challenge.submitter_finished_evidence
        };
        let challenge_id = challenge.id;
        let arbitrator = self.arbitrator_for(action.setting_id)?;

        arbitrator.submit_evidence(dispute_id, sender, &evidence, finished)?;
        let period_closed = finished && counterpart_finished;
        if period_closed {
            arbitrator.close_evidence_period(dispute_id)?;
        }

        let record = self.challenges.get_mut(challenge_id)?;
        if is_submitter {
            record.submitter_finished_evidence |= finished;
        } else {
            record.challenger_finished_evidence |= finished;
        }
        let now = self.now();
        self.events.emit(
            now,
            Event::EvidenceSubmitted {
                action_id,
                dispute_id,
                party: sender.clone(),
                finished,
            },
        );
        tracing::debug!(
            action_id = %action_id,
            dispute_id = %dispute_id,
            party = %sender,
            finished,
            period_closed,
            "evidence submitted"
        );
        Ok(())
    }

    /// Apply the arbitrator's ruling for `dispute_id`. `caller` must be the
    /// arbitrator the dispute was raised with.
    pub fn rule(&mut self, caller: &Account, dispute_id: DisputeId) -> Result<Ruling, AgreementError> {
        let challenge_id = match self.challenges.by_dispute(caller, dispute_id) {
            Some(id) => id,
            None if self.challenges.dispute_exists(dispute_id) => {
                return Err(AgreementError::SenderNotAllowed {
                    sender: caller.to_string(),
                    operation: "rule",
                })
            }
            None => return Err(AgreementError::DisputeDoesNotExist(dispute_id)),
        };
        let challenge = self.challenges.get(challenge_id)?.clone();
        if challenge.state != ChallengeState::Disputed {
            return Err(AgreementError::CannotRule(dispute_id));
        }
        let arbitrator = self
            .arbitrator(caller)
            .ok_or_else(|| AgreementError::ArbitratorNotBound(caller.clone()))?;
        let ruling = match arbitrator.ruling(dispute_id) {
            Ok(ruling) => ruling,
            Err(ArbitratorError::NotRuledYet(_)) => {
                return Err(AgreementError::DisputeNotRuledYet(dispute_id))
            }
            Err(err) => return Err(err.into()),
        };
        let action = self.actions.get(challenge.action_id)?.clone();
        let requirement = self
            .apps
            .requirement(&action.app, action.collateral_requirement_id)?
            .clone();
        let fee = &challenge.challenger_arbitrator_fees;
        let submitter = &action.submitter;
        let challenger = &challenge.challenger;

        let batch = match ruling {
            Ruling::InFavorOfSubmitter => CustodyBatch::new()
                .transfer_out(&requirement.token, requirement.challenge_collateral, submitter)
                .transfer_out(&fee.token, fee.amount, submitter),
            Ruling::InFavorOfChallenger => CustodyBatch::new()
                .slash(&requirement.token, submitter, requirement.action_collateral, challenger)
                .transfer_out(&requirement.token, requirement.challenge_collateral, challenger)
                .transfer_out(&fee.token, fee.amount, challenger),
            Ruling::Refused => {
                let (to_submitter, to_challenger) = fee.amount.split_half();
                CustodyBatch::new()
                    .transfer_out(&requirement.token, requirement.challenge_collateral, challenger)
                    .transfer_out(&fee.token, to_submitter, submitter)
                    .transfer_out(&fee.token, to_challenger, challenger)
            }
        };
        self.custody.execute(&batch)?;

        let now = self.now();
        let outcome = ChallengeState::from_ruling(ruling);
        let record = self.challenges.get_mut(challenge_id)?;
        record.transition_to(outcome, now)?;
        record.ruling = Some(ruling);
        self.events.emit(
            now,
            Event::ActionRuled {
                action_id: action.id,
                challenge_id,
                ruling,
            },
        );
        if ruling == Ruling::InFavorOfChallenger {
            self.actions.get_mut(action.id)?.mark_closed(now)?;
            self.finish_action(&action.app, now);
            self.events.emit(now, Event::ActionClosed { action_id: action.id });
            metrics::counter!("agreement_actions_closed_total").increment(1);
        }
        metrics::counter!("agreement_rulings_total", "ruling" => ruling.as_str()).increment(1);
        tracing::info!(
            action_id = %action.id,
            challenge_id = %challenge_id,
            dispute_id = %dispute_id,
            ruling = %ruling,
            "dispute ruled"
        );

        let disputable_action_id = action.disputable_action_id;
        let notification = match ruling {
            Ruling::InFavorOfSubmitter => Notification::Allowed { disputable_action_id },
            Ruling::InFavorOfChallenger => Notification::Rejected { disputable_action_id },
            Ruling::Refused => Notification::Voided { disputable_action_id },
        };
        self.notify(&action.app, notification);
        Ok(ruling)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn latest_challenge(&self, action: &Action) -> Option<&Challenge> {
        action
            .current_challenge_id
            .and_then(|id| self.challenges.get(id).ok())
    }

    /// The action and its latest challenge, which must be `Waiting`.
    fn waiting_challenge(&self, action_id: ActionId) -> Result<(Action, Challenge), AgreementError> {
        let action = self.actions.get(action_id)?;
        let challenge = self
            .latest_challenge(action)
            .filter(|c| c.state == ChallengeState::Waiting)
            .ok_or(AgreementError::CannotSettle(action_id))?;
        Ok((action.clone(), challenge.clone()))
    }

    fn arbitrator_for(&self, setting_id: SettingId) -> Result<Arc<dyn Arbitrator>, AgreementError> {
        let setting = self.setting(setting_id)?;
        self.arbitrator(&setting.arbitrator)
            .ok_or_else(|| AgreementError::ArbitratorNotBound(setting.arbitrator.clone()))
    }

    fn dispute_metadata(&self, action: &Action, challenge: &Challenge) -> Result<ContentDigest, AgreementError> {
        let setting = self.setting(action.setting_id)?;
        let canonical = CanonicalBytes::new(&serde_json::json!({
            "agreement": self.id.to_string(),
            "action_id": action.id.get(),
            "challenge_id": challenge.id.get(),
            "setting_content_hash": setting.content_hash.to_hex(),
        }))
        .map_err(CoreError::from)?;
        Ok(sha256_digest(&canonical))
    }

    /// Count an action as no longer ongoing for its app.
    fn finish_action(&mut self, app: &AppId, now: Timestamp) {
        if self.apps.action_finished(app) {
            self.events
                .emit(now, Event::DisputableAppUnregistered { app: app.clone() });
            tracing::info!(app = %app, "disputable app unregistered");
        }
    }

    fn notify(&self, app: &AppId, notification: Notification) {
        let Some(handle) = self.apps.handle(app) else {
            return;
        };
        if let Err(err) = notification.deliver(handle.as_ref(), self.id) {
            metrics::counter!("agreement_callback_failures_total").increment(1);
            tracing::warn!(
                app = %app,
                callback = notification.as_str(),
                code = err.code(),
                error = %err,
                "disputable app callback failed"
            );
        }
    }
}

impl std::fmt::Debug for Agreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agreement")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("settings", &self.settings.len())
            .field("apps", &self.apps.len())
            .field("actions", &self.actions.len())
            .field("challenges", &self.challenges.len())
            .field("events", &self.events.len())
            .finish()
    }
}
