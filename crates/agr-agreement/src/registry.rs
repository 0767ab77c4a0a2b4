//! # Disputable App Registry
//!
//! Tracks which apps are registered against the engine, their collateral
//! requirement history, and how many of their actions are still ongoing.
//!
//! ```text
//! Unregistered ──activate──▶ Registered ──deactivate──▶ Unregistered   (no ongoing actions)
//!                                 │
//!                                 └──deactivate──▶ Unregistering ──last action finished──▶ Unregistered
//! ```
//!
//! The ongoing-action counter persists across registration cycles.

use std::collections::BTreeMap;
use std::sync::Arc;

use agr_core::{AppId, CollateralRequirementId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::collateral::{CollateralLog, CollateralRequirement, CollateralRequirementInput};
use crate::disputable::DisputableApp;
use crate::error::AgreementError;

/// Registration state of a disputable app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputableState {
    /// Never registered, or fully unregistered.
    Unregistered,
    /// Accepting new actions.
    Registered,
    /// Deactivation requested while actions were still ongoing.
    Unregistering,
}

impl DisputableState {
    /// Stable upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "UNREGISTERED",
            Self::Registered => "REGISTERED",
            Self::Unregistering => "UNREGISTERING",
        }
    }
}

impl std::fmt::Display for DisputableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public view of one app's registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputableInfo {
    /// The app.
    pub app: AppId,
    /// Registration state.
    pub state: DisputableState,
    /// Requirement applied to new actions.
    pub current_collateral_requirement_id: CollateralRequirementId,
    /// Actions submitted and not yet finished.
    pub ongoing_actions: u64,
}

struct DisputableEntry {
    info: DisputableInfo,
    requirements: CollateralLog,
    handle: Arc<dyn DisputableApp>,
}

/// Registry of every app that ever activated.
#[derive(Default)]
pub struct AppRegistry {
    apps: BTreeMap<AppId, DisputableEntry>,
}

impl AppRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an app, appending a fresh collateral requirement version.
    ///
    /// # Errors
    ///
    /// [`AgreementError::DisputableAppAlreadyExists`] if the app is
    /// `Registered` or `Unregistering`.
    pub fn activate(
        &mut self,
        handle: Arc<dyn DisputableApp>,
        requirement: CollateralRequirementInput,
        at: Timestamp,
    ) -> Result<CollateralRequirementId, AgreementError> {
        let app_id = handle.app_id().clone();
        match self.apps.get_mut(&app_id) {
            Some(entry) => {
                if entry.info.state != DisputableState::Unregistered {
                    return Err(AgreementError::DisputableAppAlreadyExists(app_id));
                }
                let id = entry.requirements.append(requirement, at);
                entry.info.state = DisputableState::Registered;
                entry.info.current_collateral_requirement_id = id;
                entry.handle = handle;
                Ok(id)
            }
            None => {
                let mut requirements = CollateralLog::new();
                let id = requirements.append(requirement, at);
                self.apps.insert(
                    app_id.clone(),
                    DisputableEntry {
                        info: DisputableInfo {
                            app: app_id,
                            state: DisputableState::Registered,
                            current_collateral_requirement_id: id,
                            ongoing_actions: 0,
                        },
                        requirements,
                        handle,
                    },
                );
                Ok(id)
            }
        }
    }

    /// Request unregistration. Returns the resulting state.
    pub fn deactivate(&mut self, app_id: &AppId) -> Result<DisputableState, AgreementError> {
        let entry = self.registered_entry_mut(app_id)?;
        entry.info.state = if entry.info.ongoing_actions == 0 {
            DisputableState::Unregistered
        } else {
            DisputableState::Unregistering
        };
        Ok(entry.info.state)
    }

    /// Append a new requirement version for a registered app.
    pub fn change_collateral_requirement(
        &mut self,
        app_id: &AppId,
        requirement: CollateralRequirementInput,
        at: Timestamp,
    ) -> Result<CollateralRequirementId, AgreementError> {
        let entry = self.registered_entry_mut(app_id)?;
        let id = entry.requirements.append(requirement, at);
        entry.info.current_collateral_requirement_id = id;
        Ok(id)
    }

    /// Registration of an app, if it ever activated.
    pub fn info(&self, app_id: &AppId) -> Option<&DisputableInfo> {
        self.apps.get(app_id).map(|e| &e.info)
    }

    /// True only in the `Registered` state.
    pub fn is_registered(&self, app_id: &AppId) -> bool {
        self.info(app_id)
            .is_some_and(|info| info.state == DisputableState::Registered)
    }

    /// A requirement version of an app.
    pub fn requirement(
        &self,
        app_id: &AppId,
        id: CollateralRequirementId,
    ) -> Result<&CollateralRequirement, AgreementError> {
        self.apps
            .get(app_id)
            .and_then(|e| e.requirements.get(id))
            .ok_or_else(|| AgreementError::MissingCollateralRequirement {
                app: app_id.clone(),
                id,
            })
    }

    /// The requirement applied to the app's next action.
    pub fn current_requirement(&self, app_id: &AppId) -> Result<&CollateralRequirement, AgreementError> {
        let info = self
            .info(app_id)
            .ok_or_else(|| AgreementError::DisputableAppNotRegistered(app_id.clone()))?;
        self.requirement(app_id, info.current_collateral_requirement_id)
    }

    /// Callback handle of the app.
    pub fn handle(&self, app_id: &AppId) -> Option<Arc<dyn DisputableApp>> {
        self.apps.get(app_id).map(|e| Arc::clone(&e.handle))
    }

    /// Count a newly submitted action.
    pub fn action_opened(&mut self, app_id: &AppId) {
        if let Some(entry) = self.apps.get_mut(app_id) {
            entry.info.ongoing_actions += 1;
        }
    }

    /// Count a finished action. Returns true if this flipped the app from
    /// `Unregistering` to `Unregistered`.
    pub fn action_finished(&mut self, app_id: &AppId) -> bool {
        let Some(entry) = self.apps.get_mut(app_id) else {
            return false;
        };
        entry.info.ongoing_actions = entry.info.ongoing_actions.saturating_sub(1);
        if entry.info.ongoing_actions == 0 && entry.info.state == DisputableState::Unregistering {
            entry.info.state = DisputableState::Unregistered;
            return true;
        }
        false
    }

    /// Number of apps ever activated.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// True before the first activation.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    fn registered_entry_mut(&mut self, app_id: &AppId) -> Result<&mut DisputableEntry, AgreementError> {
        match self.apps.get_mut(app_id) {
            Some(entry) if entry.info.state == DisputableState::Registered => Ok(entry),
            _ => Err(AgreementError::DisputableAppNotRegistered(app_id.clone())),
        }
    }
}

impl std::fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRegistry")
            .field("apps", &self.apps.values().map(|e| &e.info).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disputable::GenericDisputable;
    use agr_core::{AgreementId, Amount, TokenId};

    fn at() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn requirement() -> CollateralRequirementInput {
        CollateralRequirementInput {
            token: TokenId::new("ANT"),
            action_collateral: Amount(200),
            challenge_collateral: Amount(100),
            challenge_duration_secs: 600,
        }
    }

    fn handle() -> Arc<dyn DisputableApp> {
        Arc::new(GenericDisputable::new(AppId::new("voting"), AgreementId::new()))
    }

    #[test]
    fn activate_registers_with_first_requirement() {
        let mut registry = AppRegistry::new();
        let id = registry.activate(handle(), requirement(), at()).unwrap();
        assert_eq!(id, CollateralRequirementId(1));
        let info = registry.info(&AppId::new("voting")).unwrap();
        assert_eq!(info.state, DisputableState::Registered);
        assert_eq!(info.ongoing_actions, 0);
    }

    #[test]
    fn activating_twice_fails() {
        let mut registry = AppRegistry::new();
        registry.activate(handle(), requirement(), at()).unwrap();
        let err = registry.activate(handle(), requirement(), at()).unwrap_err();
        assert_eq!(err.code(), "AGR_DISPUTABLE_ALREADY_EXISTS");
    }

    #[test]
    fn deactivate_without_actions_unregisters_immediately() {
        let mut registry = AppRegistry::new();
        registry.activate(handle(), requirement(), at()).unwrap();
        let app = AppId::new("voting");
        assert_eq!(registry.deactivate(&app).unwrap(), DisputableState::Unregistered);
        assert_eq!(
            registry.deactivate(&app).unwrap_err().code(),
            "AGR_DISPUTABLE_NOT_REGISTERED"
        );
    }

    #[test]
    fn deactivate_with_ongoing_actions_waits_for_last_close() {
        let mut registry = AppRegistry::new();
        let app = AppId::new("voting");
        registry.activate(handle(), requirement(), at()).unwrap();
        registry.action_opened(&app);
        registry.action_opened(&app);
        assert_eq!(registry.deactivate(&app).unwrap(), DisputableState::Unregistering);
        assert!(!registry.action_finished(&app));
        assert!(registry.action_finished(&app));
        assert_eq!(registry.info(&app).unwrap().state, DisputableState::Unregistered);
    }

    #[test]
    fn reactivation_appends_new_requirement_version() {
        let mut registry = AppRegistry::new();
        let app = AppId::new("voting");
        registry.activate(handle(), requirement(), at()).unwrap();
        registry.deactivate(&app).unwrap();
        let id = registry.activate(handle(), requirement(), at()).unwrap();
        assert_eq!(id, CollateralRequirementId(2));
        assert_eq!(registry.current_requirement(&app).unwrap().id, id);
        assert!(registry.requirement(&app, CollateralRequirementId(1)).is_ok());
    }

    #[test]
    fn change_requirement_requires_registration() {
        let mut registry = AppRegistry::new();
        let app = AppId::new("voting");
        assert!(registry
            .change_collateral_requirement(&app, requirement(), at())
            .is_err());
        registry.activate(handle(), requirement(), at()).unwrap();
        let id = registry
            .change_collateral_requirement(&app, requirement(), at())
            .unwrap();
        assert_eq!(id, CollateralRequirementId(2));
    }
}
