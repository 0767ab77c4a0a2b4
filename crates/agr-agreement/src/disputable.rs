//! # Disputable Apps
//!
//! A disputable app is any component that submits actions to the engine
//! and reacts to their outcome. The engine only ever sees the narrow
//! [`DisputableApp`] capability: an allow-check for challengers and four
//! outcome callbacks.
//!
//! ## Callback contract
//!
//! Callbacks are delivered after the engine has committed the transition
//! that triggered them. A failing callback is logged and counted but never
//! rolls back engine state. Every callback carries the engine's
//! [`AgreementId`]; apps reject callbacks from any other engine with
//! [`DisputableError::SenderNotAgreement`].
//!
//! [`GenericDisputable`] is a ready-made app for actions with no side
//! effect of their own (proposals, attestations, scenario replays).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use agr_core::{Account, ActionId, AgreementId, AppId};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::action::SubmissionKind;
use crate::engine::Agreement;
use crate::error::{AgreementError, DisputableError};

/// Capability the engine holds for each registered app.
pub trait DisputableApp: Send + Sync {
    /// The app's id in the engine registry.
    fn app_id(&self) -> &AppId;

    /// Whether `challenger` may challenge the given action.
    fn can_challenge(&self, disputable_action_id: u64, challenger: &Account) -> bool;

    /// An action was challenged and must not proceed for now.
    fn on_challenged(
        &self,
        agreement: AgreementId,
        disputable_action_id: u64,
        challenger: &Account,
    ) -> Result<(), DisputableError>;

    /// The challenge was rejected; the action may proceed.
    fn on_allowed(&self, agreement: AgreementId, disputable_action_id: u64)
        -> Result<(), DisputableError>;

    /// The challenge succeeded or was settled; the action must not proceed.
    fn on_rejected(&self, agreement: AgreementId, disputable_action_id: u64)
        -> Result<(), DisputableError>;

    /// The arbitrator refused to rule; the action may proceed.
    fn on_voided(&self, agreement: AgreementId, disputable_action_id: u64)
        -> Result<(), DisputableError>;
}

/// An outcome notification queued by the engine for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// See [`DisputableApp::on_challenged`].
    Challenged {
        /// The app's id for the action.
        disputable_action_id: u64,
        /// The challenger.
        challenger: Account,
    },
    /// See [`DisputableApp::on_allowed`].
    Allowed {
        /// The app's id for the action.
        disputable_action_id: u64,
    },
    /// See [`DisputableApp::on_rejected`].
    Rejected {
        /// The app's id for the action.
        disputable_action_id: u64,
    },
    /// See [`DisputableApp::on_voided`].
    Voided {
        /// The app's id for the action.
        disputable_action_id: u64,
    },
}

impl Notification {
    /// Callback name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Challenged { .. } => "challenged",
            Self::Allowed { .. } => "allowed",
            Self::Rejected { .. } => "rejected",
            Self::Voided { .. } => "voided",
        }
    }

    /// Route the notification to the matching callback.
    pub fn deliver(
        &self,
        app: &dyn DisputableApp,
        agreement: AgreementId,
    ) -> Result<(), DisputableError> {
        match self {
            Self::Challenged {
                disputable_action_id,
                challenger,
            } => app.on_challenged(agreement, *disputable_action_id, challenger),
            Self::Allowed {
                disputable_action_id,
            } => app.on_allowed(agreement, *disputable_action_id),
            Self::Rejected {
                disputable_action_id,
            } => app.on_rejected(agreement, *disputable_action_id),
            Self::Voided {
                disputable_action_id,
            } => app.on_voided(agreement, *disputable_action_id),
        }
    }
}

// ── Generic disputable ─────────────────────────────────────────────────

/// Status of an action as seen by [`GenericDisputable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericActionStatus {
    /// Submitted, not challenged.
    Open,
    /// Under challenge.
    Challenged,
    /// Must not proceed.
    Rejected,
    /// Closed through the engine.
    Closed,
}

#[derive(Debug, Clone)]
struct GenericAction {
    action_id: ActionId,
    status: GenericActionStatus,
}

/// A disputable app whose actions carry no side effect beyond the
/// engine's own bookkeeping.
pub struct GenericDisputable {
    app_id: AppId,
    agreement: AgreementId,
    next_id: AtomicU64,
    actions: DashMap<u64, GenericAction>,
    /// `None` lets anyone challenge.
    challengers: RwLock<Option<BTreeSet<Account>>>,
    received: Mutex<Vec<Notification>>,
    fail_callbacks: AtomicBool,
}

impl GenericDisputable {
    /// An app that accepts callbacks only from `agreement`.
    pub fn new(app_id: AppId, agreement: AgreementId) -> Self {
        Self {
            app_id,
            agreement,
            next_id: AtomicU64::new(0),
            actions: DashMap::new(),
            challengers: RwLock::new(None),
            received: Mutex::new(Vec::new()),
            fail_callbacks: AtomicBool::new(false),
        }
    }

    /// Restrict challenges to the given accounts. `None` opens them to anyone.
    pub fn set_challengers(&self, challengers: Option<BTreeSet<Account>>) {
        *self.challengers.write() = challengers;
    }

    /// Make every subsequent callback fail.
    pub fn set_fail_callbacks(&self, fail: bool) {
        self.fail_callbacks.store(fail, Ordering::SeqCst);
    }

    /// Submit a new action through the engine on behalf of `submitter`.
    pub fn submit(
        &self,
        engine: &mut Agreement,
        submitter: &Account,
        context: Vec<u8>,
    ) -> Result<ActionId, AgreementError> {
        let disputable_action_id = self.next_id.load(Ordering::SeqCst) + 1;
        let action_id = engine.new_action(
            &self.app_id,
            disputable_action_id,
            submitter,
            context,
            SubmissionKind::Immediate,
        )?;
        self.next_id.store(disputable_action_id, Ordering::SeqCst);
        self.actions.insert(
            disputable_action_id,
            GenericAction {
                action_id,
                status: GenericActionStatus::Open,
            },
        );
        Ok(action_id)
    }

    /// Close an action through the engine, releasing its collateral.
    pub fn close(&self, engine: &mut Agreement, action_id: ActionId) -> Result<(), AgreementError> {
        engine.close(&self.app_id, action_id)?;
        if let Some(mut entry) = self
            .actions
            .iter_mut()
            .find(|entry| entry.value().action_id == action_id)
        {
            entry.status = GenericActionStatus::Closed;
        }
        Ok(())
    }

    /// Status of a disputable action, if known.
    pub fn status(&self, disputable_action_id: u64) -> Option<GenericActionStatus> {
        self.actions.get(&disputable_action_id).map(|a| a.status)
    }

    /// Engine action id backing a disputable action.
    pub fn action_id(&self, disputable_action_id: u64) -> Option<ActionId> {
        self.actions.get(&disputable_action_id).map(|a| a.action_id)
    }

    /// Every notification received so far, in delivery order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    fn accept(
        &self,
        agreement: AgreementId,
        notification: Notification,
        disputable_action_id: u64,
        status: GenericActionStatus,
    ) -> Result<(), DisputableError> {
        if agreement != self.agreement {
            return Err(DisputableError::SenderNotAgreement);
        }
        if self.fail_callbacks.load(Ordering::SeqCst) {
            return Err(DisputableError::Rejected(format!(
                "{} callback disabled",
                notification.as_str()
            )));
        }
        let mut entry = self
            .actions
            .get_mut(&disputable_action_id)
            .ok_or(DisputableError::ActionDoesNotExist(disputable_action_id))?;
        entry.status = status;
        drop(entry);
        self.received.lock().push(notification);
        Ok(())
    }
}

impl std::fmt::Debug for GenericDisputable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericDisputable")
            .field("app_id", &self.app_id)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl DisputableApp for GenericDisputable {
    fn app_id(&self) -> &AppId {
        &self.app_id
    }

    fn can_challenge(&self, disputable_action_id: u64, challenger: &Account) -> bool {
        let open = self
            .actions
            .get(&disputable_action_id)
            .is_some_and(|a| a.status != GenericActionStatus::Closed);
        let permitted = match &*self.challengers.read() {
            Some(allowed) => allowed.contains(challenger),
            None => true,
        };
        open && permitted
    }

    fn on_challenged(
        &self,
        agreement: AgreementId,
        disputable_action_id: u64,
        challenger: &Account,
    ) -> Result<(), DisputableError> {
        self.accept(
            agreement,
            Notification::Challenged {
                disputable_action_id,
                challenger: challenger.clone(),
            },
            disputable_action_id,
            GenericActionStatus::Challenged,
        )
    }

    fn on_allowed(&self, agreement: AgreementId, disputable_action_id: u64) -> Result<(), DisputableError> {
        self.accept(
            agreement,
            Notification::Allowed {
                disputable_action_id,
            },
            disputable_action_id,
            GenericActionStatus::Open,
        )
    }

    fn on_rejected(&self, agreement: AgreementId, disputable_action_id: u64) -> Result<(), DisputableError> {
        self.accept(
            agreement,
            Notification::Rejected {
                disputable_action_id,
            },
            disputable_action_id,
            GenericActionStatus::Rejected,
        )
    }

    fn on_voided(&self, agreement: AgreementId, disputable_action_id: u64) -> Result<(), DisputableError> {
        self.accept(
            agreement,
            Notification::Voided {
                disputable_action_id,
            },
            disputable_action_id,
            GenericActionStatus::Open,
        )
    }
}
