//! # Scenario Files
//!
//! A scenario is a YAML script replayed against a fresh in-memory engine
//! with a manual clock. It seeds wallets and stakes, registers apps, and
//! then applies an ordered list of steps. A step may declare the failure
//! code it expects; the replay records whether every step behaved as
//! declared and, at the end, evaluates balance checks.
//!
//! ```yaml
//! name: settle-with-offer
//! agreement:
//!   title: Community covenant
//!   arbitrator: { account: court, fee_token: DAI, fee_amount: 30 }
//! wallets:
//!   - { account: bob, token: DAI, amount: 100 }
//!   - { account: bob, token: ANT, amount: 500 }
//! stakes:
//!   - { account: alice, token: ANT, amount: 1000 }
//! apps:
//!   - id: voting
//!     collateral:
//!       token: ANT
//!       action_collateral: 200
//!       challenge_collateral: 100
//!       challenge_duration_secs: 600
//! steps:
//!   - { op: sign, signer: alice }
//!   - { op: submit, app: voting, submitter: alice, context: proposal }
//!   - { op: challenge, action: 1, challenger: bob, offer: 50 }
//!   - { op: settle, action: 1, caller: alice }
//!   - { op: close, app: voting, action: 1, expect_error: AGR_CANNOT_CLOSE_ACTION }
//! checks:
//!   - { account: alice, token: ANT, available: 950, locked: 0 }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use agr_agreement::{
    Agreement, AgreementConfig, AgreementError, Arbitrator, ArbitratorConfig, ArbitratorError,
    CollateralRequirementInput, Custody, CustodyError, DisputableApp, EventRecord, GenericDisputable,
    InMemoryArbitrator, InMemoryCustody, Ruling,
};
use agr_core::{
    Account, ActionId, Amount, AppId, CoreError, DisputeId, MockClock, Timestamp, TokenId,
};
use agr_delay::{Delay, DelayConfig, DelayError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clock start used when a scenario does not pin one.
pub const DEFAULT_START: &str = "2026-01-01T00:00:00Z";

// ── Scenario document ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Engine configuration. May be supplied from a separate file instead.
    #[serde(default)]
    pub agreement: Option<AgreementConfig>,
    #[serde(default)]
    pub start: Option<Timestamp>,
    /// Wallet balances minted before the first step.
    #[serde(default)]
    pub wallets: Vec<Holding>,
    /// Stakes deposited before the first step. Minted on top of `wallets`.
    #[serde(default)]
    pub stakes: Vec<Holding>,
    #[serde(default)]
    pub apps: Vec<AppSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub checks: Vec<BalanceCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Holding {
    pub account: Account,
    pub token: TokenId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    #[default]
    Generic,
    Delay,
}

/// A disputable app instantiated for the replay.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSpec {
    pub id: AppId,
    #[serde(default)]
    pub kind: AppKind,
    pub collateral: CollateralRequirementInput,
    /// Required for delay apps.
    #[serde(default)]
    pub delay_secs: Option<u64>,
    #[serde(default)]
    pub challengers: Option<Vec<Account>>,
    /// Activate against the engine before the first step.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub op: Op,
    /// Failure code the step must produce, e.g. `AGR_CANNOT_SETTLE_ACTION`.
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Sign {
        signer: Account,
    },
    /// Re-activate a declared app, optionally with new collateral terms.
    Activate {
        app: AppId,
        #[serde(default)]
        collateral: Option<CollateralRequirementInput>,
    },
    Deactivate {
        app: AppId,
    },
    ChangeCollateral {
        app: AppId,
        collateral: CollateralRequirementInput,
    },
    Stake {
        account: Account,
        token: TokenId,
        amount: Amount,
    },
    Unstake {
        account: Account,
        token: TokenId,
        amount: Amount,
    },
    Submit {
        app: AppId,
        submitter: Account,
        #[serde(default)]
        context: String,
    },
    Challenge {
        action: ActionId,
        challenger: Account,
        #[serde(default)]
        offer: Amount,
        #[serde(default)]
        context: String,
    },
    Settle {
        action: ActionId,
        caller: Account,
    },
    Dispute {
        action: ActionId,
        caller: Account,
    },
    Evidence {
        action: ActionId,
        party: Account,
        #[serde(default)]
        evidence: String,
        #[serde(default)]
        finished: bool,
    },
    CloseEvidence {
        dispute: DisputeId,
        #[serde(default)]
        arbitrator: Option<Account>,
    },
    /// Let the arbitrator decide (when `ruling` is given) and report back.
    /// Defaults to the arbitrator of the current setting.
    Rule {
        dispute: DisputeId,
        #[serde(default)]
        ruling: Option<Ruling>,
        #[serde(default)]
        arbitrator: Option<Account>,
    },
    Close {
        app: AppId,
        action: ActionId,
    },
    Advance {
        secs: u64,
    },
    ChangeSetting {
        title: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        arbitrator: Option<ArbitratorConfig>,
    },
    Schedule {
        app: AppId,
        submitter: Account,
        #[serde(default)]
        payload: String,
        #[serde(default)]
        context: String,
    },
    Execute {
        app: AppId,
        delayable: u64,
    },
    Stop {
        app: AppId,
        caller: Account,
        delayable: u64,
    },
    Pause {
        app: AppId,
        caller: Account,
        delayable: u64,
    },
    Resume {
        app: AppId,
        caller: Account,
        delayable: u64,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sign { .. } => "sign",
            Self::Activate { .. } => "activate",
            Self::Deactivate { .. } => "deactivate",
            Self::ChangeCollateral { .. } => "change_collateral",
            Self::Stake { .. } => "stake",
            Self::Unstake { .. } => "unstake",
            Self::Submit { .. } => "submit",
            Self::Challenge { .. } => "challenge",
            Self::Settle { .. } => "settle",
            Self::Dispute { .. } => "dispute",
            Self::Evidence { .. } => "evidence",
            Self::CloseEvidence { .. } => "close_evidence",
            Self::Rule { .. } => "rule",
            Self::Close { .. } => "close",
            Self::Advance { .. } => "advance",
            Self::ChangeSetting { .. } => "change_setting",
            Self::Schedule { .. } => "schedule",
            Self::Execute { .. } => "execute",
            Self::Stop { .. } => "stop",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
        }
    }

    /// The app a step targets, with the kind it must be.
    fn target_app(&self) -> Option<(&AppId, Option<AppKind>)> {
        match self {
            Self::Activate { app, .. }
            | Self::Deactivate { app }
            | Self::ChangeCollateral { app, .. }
            | Self::Close { app, .. } => Some((app, None)),
            Self::Submit { app, .. } => Some((app, Some(AppKind::Generic))),
            Self::Schedule { app, .. }
            | Self::Execute { app, .. }
            | Self::Stop { app, .. }
            | Self::Pause { app, .. }
            | Self::Resume { app, .. } => Some((app, Some(AppKind::Delay))),
            _ => None,
        }
    }

    fn participant(&self) -> Option<&Account> {
        match self {
            Self::Sign { signer } => Some(signer),
            Self::Stake { account, .. } | Self::Unstake { account, .. } => Some(account),
            Self::Submit { submitter, .. } | Self::Schedule { submitter, .. } => Some(submitter),
            Self::Challenge { challenger, .. } => Some(challenger),
            Self::Settle { caller, .. }
            | Self::Dispute { caller, .. }
            | Self::Stop { caller, .. }
            | Self::Pause { caller, .. }
            | Self::Resume { caller, .. } => Some(caller),
            Self::Evidence { party, .. } => Some(party),
            _ => None,
        }
    }
}

/// Expected balances at the end of the replay. Omitted fields are not
/// checked.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceCheck {
    pub account: Account,
    pub token: TokenId,
    #[serde(default)]
    pub wallet: Option<Amount>,
    #[serde(default)]
    pub available: Option<Amount>,
    #[serde(default)]
    pub locked: Option<Amount>,
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

impl Scenario {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Replace the embedded engine configuration.
    pub fn with_agreement(mut self, config: AgreementConfig) -> Self {
        self.agreement = Some(config);
        self
    }

    /// Structural checks that need no engine: configuration present and
    /// valid, app ids unique, and every step naming an app of the right
    /// kind.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let config = self
            .agreement
            .as_ref()
            .ok_or_else(|| ScenarioError::Invalid("no agreement configuration".into()))?;
        config
            .validate()
            .map_err(|e| ScenarioError::Invalid(e.to_string()))?;

        let mut kinds = BTreeMap::new();
        for app in &self.apps {
            if kinds.insert(app.id.clone(), app.kind).is_some() {
                return Err(ScenarioError::Invalid(format!("app {} declared twice", app.id)));
            }
            if app.kind == AppKind::Delay && app.delay_secs.is_none() {
                return Err(ScenarioError::Invalid(format!(
                    "delay app {} needs delay_secs",
                    app.id
                )));
            }
            if app.challengers.as_ref().is_some_and(|c| c.is_empty()) {
                return Err(ScenarioError::Invalid(format!(
                    "app {} lists no challengers",
                    app.id
                )));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            if step.expect_error.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(ScenarioError::Invalid(format!(
                    "step {number}: expect_error must not be empty"
                )));
            }
            let Some((app, required)) = step.op.target_app() else {
                continue;
            };
            match (kinds.get(app), required) {
                (None, _) => {
                    return Err(ScenarioError::Invalid(format!(
                        "step {number} ({}): unknown app {app}",
                        step.op.name()
                    )))
                }
                (Some(kind), Some(required)) if *kind != required => {
                    return Err(ScenarioError::Invalid(format!(
                        "step {number} ({}): app {app} is not a {} app",
                        step.op.name(),
                        match required {
                            AppKind::Generic => "generic",
                            AppKind::Delay => "delay",
                        }
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ── Step failures ──────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Agreement(#[from] AgreementError),

    #[error(transparent)]
    Delay(#[from] DelayError),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Arbitrator(#[from] ArbitratorError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    Scenario(String),
}

impl StepError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Agreement(e) => e.code(),
            Self::Delay(e) => e.code(),
            Self::Custody(e) => e.code(),
            Self::Arbitrator(e) => e.code(),
            Self::Core(_) => "AGR_INTERNAL",
            Self::Scenario(_) => "SCENARIO_ERROR",
        }
    }
}

// ── Report ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub op: &'static str,
    pub at: Timestamp,
    pub passed: bool,
    /// Failure code, when the step failed.
    pub code: Option<&'static str>,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceLine {
    pub account: Account,
    pub token: TokenId,
    pub wallet: Amount,
    pub available: Amount,
    pub locked: Amount,
    /// Portion of `locked` backing actions under an open challenge.
    pub challenged: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub account: Account,
    pub token: TokenId,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: Option<String>,
    pub agreement: String,
    pub finished_at: Timestamp,
    pub steps: Vec<StepRecord>,
    pub balances: Vec<BalanceLine>,
    pub checks: Vec<CheckResult>,
    pub events: Vec<EventRecord>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed) && self.checks.iter().all(|c| c.passed)
    }
}

// ── Runner ─────────────────────────────────────────────────────────────

/// Engine, adapters and apps for one replay.
pub struct ScenarioRunner {
    clock: Arc<MockClock>,
    custody: Arc<InMemoryCustody>,
    engine: Agreement,
    arbitrators: BTreeMap<Account, Arc<InMemoryArbitrator>>,
    generic: BTreeMap<AppId, Arc<GenericDisputable>>,
    delays: BTreeMap<AppId, Arc<Delay>>,
    requirements: BTreeMap<AppId, CollateralRequirementInput>,
    accounts: BTreeSet<Account>,
    tokens: BTreeSet<TokenId>,
}

impl ScenarioRunner {
    /// Build the engine and seed balances and apps.
    pub fn new(scenario: &Scenario) -> Result<Self, StepError> {
        let config = scenario
            .agreement
            .as_ref()
            .ok_or_else(|| StepError::Scenario("no agreement configuration".into()))?;
        let start = match scenario.start {
            Some(start) => start,
            None => Timestamp::parse(DEFAULT_START)?,
        };

        let clock = Arc::new(MockClock::new(start));
        let custody = Arc::new(InMemoryCustody::new());
        let court = Arc::new(config.arbitrator.build());
        let engine = Agreement::new(
            config.title.clone(),
            config.content.clone().into_bytes(),
            court.clone(),
            custody.clone(),
            clock.clone(),
        )?;

        let mut runner = Self {
            clock,
            custody,
            engine,
            arbitrators: BTreeMap::new(),
            generic: BTreeMap::new(),
            delays: BTreeMap::new(),
            requirements: BTreeMap::new(),
            accounts: BTreeSet::new(),
            tokens: BTreeSet::new(),
        };
        runner.track_arbitrator(&court);
        runner.arbitrators.insert(court.account().clone(), court);

        for holding in &scenario.wallets {
            runner
                .custody
                .mint(&holding.token, &holding.account, holding.amount)?;
            runner.track(&holding.account, &holding.token);
        }
        for holding in &scenario.stakes {
            runner
                .custody
                .mint(&holding.token, &holding.account, holding.amount)?;
            runner
                .custody
                .stake(&holding.token, &holding.account, holding.amount)?;
            runner.track(&holding.account, &holding.token);
        }

        for declared in &scenario.apps {
            runner.install_app(declared)?;
            if declared.active {
                runner.activate(&declared.id, None)?;
            }
        }
        Ok(runner)
    }

    /// Replay a whole scenario.
    pub fn run(scenario: &Scenario) -> Result<ScenarioReport, StepError> {
        let mut runner = Self::new(scenario)?;
        let steps = scenario
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| runner.step(index + 1, step))
            .collect();
        let checks = scenario.checks.iter().map(|c| runner.check(c)).collect();
        Ok(ScenarioReport {
            name: scenario.name.clone(),
            agreement: runner.engine.id().to_string(),
            finished_at: runner.engine.now(),
            steps,
            balances: runner.balances(),
            checks,
            events: runner.engine.events().to_vec(),
        })
    }

    pub fn engine(&self) -> &Agreement {
        &self.engine
    }

    /// Apply one step and record whether it behaved as declared.
    pub fn step(&mut self, index: usize, step: &Step) -> StepRecord {
        let op = step.op.name();
        let outcome = self.apply(&step.op);
        let at = self.engine.now();
        let record = match (outcome, step.expect_error.as_deref()) {
            (Ok(detail), None) => StepRecord {
                index,
                op,
                at,
                passed: true,
                code: None,
                detail,
            },
            (Ok(detail), Some(expected)) => StepRecord {
                index,
                op,
                at,
                passed: false,
                code: None,
                detail: format!("expected {expected} but the step succeeded ({detail})"),
            },
            (Err(e), expected) => {
                let code = e.code();
                let passed = expected == Some(code);
                let detail = match expected {
                    Some(expected) if !passed => format!("expected {expected}: {e}"),
                    _ => e.to_string(),
                };
                StepRecord {
                    index,
                    op,
                    at,
                    passed,
                    code: Some(code),
                    detail,
                }
            }
        };

        if record.passed {
            tracing::info!(step = index, op, detail = %record.detail, "step applied");
        } else {
            tracing::warn!(step = index, op, detail = %record.detail, "step did not behave as declared");
        }
        record
    }

    /// Apply one operation. Returns a short description of what happened.
    pub fn apply(&mut self, op: &Op) -> Result<String, StepError> {
        if let Some(account) = op.participant() {
            self.accounts.insert(account.clone());
        }

        match op {
            Op::Sign { signer } => {
                let setting_id = self.engine.sign(signer)?;
                Ok(format!("{signer} signed {setting_id}"))
            }
            Op::Activate { app, collateral } => {
                let id = self.activate(app, collateral.clone())?;
                Ok(format!("{app} active under {id}"))
            }
            Op::Deactivate { app } => {
                let state = self.engine.deactivate(app)?;
                Ok(format!("{app} is {state}"))
            }
            Op::ChangeCollateral { app, collateral } => {
                self.tokens.insert(collateral.token.clone());
                let id = self
                    .engine
                    .change_collateral_requirement(app, collateral.clone())?;
                self.requirements.insert(app.clone(), collateral.clone());
                Ok(format!("{app} now requires {id}"))
            }
            Op::Stake {
                account,
                token,
                amount,
            } => {
                self.tokens.insert(token.clone());
                self.custody.stake(token, account, *amount)?;
                Ok(format!("{account} staked {amount} {token}"))
            }
            Op::Unstake {
                account,
                token,
                amount,
            } => {
                self.custody.unstake(token, account, *amount)?;
                Ok(format!("{account} unstaked {amount} {token}"))
            }
            Op::Submit {
                app,
                submitter,
                context,
            } => {
                let handle = self.generic_app(app)?;
                let action_id =
                    handle.submit(&mut self.engine, submitter, context.clone().into_bytes())?;
                Ok(format!("{submitter} submitted {action_id}"))
            }
            Op::Challenge {
                action,
                challenger,
                offer,
                context,
            } => {
                let challenge_id = self.engine.challenge(
                    *action,
                    challenger,
                    *offer,
                    context.clone().into_bytes(),
                )?;
                Ok(format!("{challenger} opened {challenge_id} on {action}"))
            }
            Op::Settle { action, caller } => {
                self.engine.settle(*action, caller)?;
                Ok(format!("{action} settled by {caller}"))
            }
            Op::Dispute { action, caller } => {
                let dispute_id = self.engine.dispute(*action, caller)?;
                Ok(format!("{action} raised as {dispute_id}"))
            }
            Op::Evidence {
                action,
                party,
                evidence,
                finished,
            } => {
                self.engine.submit_evidence(
                    *action,
                    party,
                    evidence.clone().into_bytes(),
                    *finished,
                )?;
                Ok(format!("{party} submitted evidence on {action} (finished: {finished})"))
            }
            Op::CloseEvidence {
                dispute,
                arbitrator,
            } => {
                let court = self.court(arbitrator.as_ref())?;
                court.close_evidence_period(*dispute)?;
                Ok(format!("evidence period of {dispute} closed"))
            }
            Op::Rule {
                dispute,
                ruling,
                arbitrator,
            } => {
                let court = self.court(arbitrator.as_ref())?;
                if let Some(ruling) = ruling {
                    court.decide(*dispute, *ruling)?;
                }
                let ruling = self.engine.rule(court.account(), *dispute)?;
                Ok(format!("{dispute} ruled {ruling}"))
            }
            Op::Close { app, action } => {
                match self.generic.get(app) {
                    Some(handle) => handle.close(&mut self.engine, *action)?,
                    None => self.engine.close(app, *action)?,
                }
                Ok(format!("{action} closed"))
            }
            Op::Advance { secs } => {
                let now = self.clock.advance_secs(*secs)?;
                Ok(format!("clock at {now}"))
            }
            Op::ChangeSetting {
                title,
                content,
                arbitrator,
            } => {
                let court = match arbitrator {
                    Some(config) => {
                        let court = self
                            .arbitrators
                            .entry(config.account.clone())
                            .or_insert_with(|| Arc::new(config.build()))
                            .clone();
                        self.track_arbitrator(&court);
                        court
                    }
                    None => self.court(None)?,
                };
                let setting_id =
                    self.engine
                        .change_setting(court, title.clone(), content.clone().into_bytes())?;
                Ok(format!("{setting_id} is current"))
            }
            Op::Schedule {
                app,
                submitter,
                payload,
                context,
            } => {
                let delay = self.delay_app(app)?;
                let id = delay.schedule(
                    &mut self.engine,
                    submitter,
                    payload.clone().into_bytes(),
                    context.clone().into_bytes(),
                )?;
                Ok(format!("{submitter} scheduled delayable {id} on {app}"))
            }
            Op::Execute { app, delayable } => {
                let delay = self.delay_app(app)?;
                let payload = delay.execute(&mut self.engine, *delayable)?;
                Ok(format!(
                    "delayable {delayable} executed: {}",
                    String::from_utf8_lossy(&payload)
                ))
            }
            Op::Stop {
                app,
                caller,
                delayable,
            } => {
                self.delay_app(app)?
                    .stop(&mut self.engine, caller, *delayable)?;
                Ok(format!("delayable {delayable} stopped by {caller}"))
            }
            Op::Pause {
                app,
                caller,
                delayable,
            } => {
                self.delay_app(app)?.pause(caller, *delayable)?;
                Ok(format!("delayable {delayable} paused"))
            }
            Op::Resume {
                app,
                caller,
                delayable,
            } => {
                self.delay_app(app)?.resume(caller, *delayable)?;
                Ok(format!("delayable {delayable} resumed"))
            }
        }
    }

    /// Current balances of every account and token the replay touched.
    /// Lines that are zero across the board are omitted.
    pub fn balances(&self) -> Vec<BalanceLine> {
        let mut lines = Vec::new();
        for account in &self.accounts {
            for token in &self.tokens {
                let stake = self.custody.stake_balance(token, account);
                let line = BalanceLine {
                    account: account.clone(),
                    token: token.clone(),
                    wallet: self.custody.token_balance(token, account),
                    available: stake.available,
                    locked: stake.locked,
                    challenged: self.engine.challenged_balance(token, account),
                };
                if !(line.wallet.is_zero() && line.available.is_zero() && line.locked.is_zero()) {
                    lines.push(line);
                }
            }
        }
        lines
    }

    pub fn check(&self, check: &BalanceCheck) -> CheckResult {
        let stake = self.custody.stake_balance(&check.token, &check.account);
        let wallet = self.custody.token_balance(&check.token, &check.account);
        let mismatches: Vec<String> = [
            ("wallet", check.wallet, wallet),
            ("available", check.available, stake.available),
            ("locked", check.locked, stake.locked),
        ]
        .into_iter()
        .filter_map(|(field, expected, actual)| match expected {
            Some(expected) if expected != actual => {
                Some(format!("{field}: expected {expected}, found {actual}"))
            }
            _ => None,
        })
        .collect();

        CheckResult {
            account: check.account.clone(),
            token: check.token.clone(),
            passed: mismatches.is_empty(),
            detail: if mismatches.is_empty() {
                "ok".to_string()
            } else {
                mismatches.join("; ")
            },
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn install_app(&mut self, declared: &AppSpec) -> Result<(), StepError> {
        if self.generic.contains_key(&declared.id) || self.delays.contains_key(&declared.id) {
            return Err(StepError::Scenario(format!("app {} declared twice", declared.id)));
        }
        let challengers = declared
            .challengers
            .as_ref()
            .map(|c| c.iter().cloned().collect::<BTreeSet<_>>());
        match declared.kind {
            AppKind::Generic => {
                let app = Arc::new(GenericDisputable::new(declared.id.clone(), self.engine.id()));
                app.set_challengers(challengers);
                self.generic.insert(declared.id.clone(), app);
            }
            AppKind::Delay => {
                let config = DelayConfig {
                    app_id: declared.id.clone(),
                    delay_secs: declared.delay_secs.ok_or_else(|| {
                        StepError::Scenario(format!("delay app {} needs delay_secs", declared.id))
                    })?,
                    challengers: declared.challengers.clone(),
                };
                config.validate()?;
                let delay = Arc::new(Delay::from_config(
                    &config,
                    self.engine.id(),
                    self.clock.clone(),
                ));
                self.delays.insert(declared.id.clone(), delay);
            }
        }
        if let Some(accounts) = &declared.challengers {
            self.accounts.extend(accounts.iter().cloned());
        }
        self.tokens.insert(declared.collateral.token.clone());
        self.requirements
            .insert(declared.id.clone(), declared.collateral.clone());
        Ok(())
    }

    fn activate(
        &mut self,
        app: &AppId,
        collateral: Option<CollateralRequirementInput>,
    ) -> Result<agr_core::CollateralRequirementId, StepError> {
        let handle: Arc<dyn DisputableApp> = match (self.generic.get(app), self.delays.get(app)) {
            (Some(generic), _) => generic.clone(),
            (None, Some(delay)) => delay.clone(),
            (None, None) => return Err(StepError::Scenario(format!("unknown app {app}"))),
        };
        let requirement = match collateral {
            Some(requirement) => requirement,
            None => self
                .requirements
                .get(app)
                .cloned()
                .ok_or_else(|| StepError::Scenario(format!("no collateral terms for {app}")))?,
        };
        self.tokens.insert(requirement.token.clone());
        let id = self.engine.activate(handle, requirement.clone())?;
        self.requirements.insert(app.clone(), requirement);
        Ok(id)
    }

    fn generic_app(&self, app: &AppId) -> Result<Arc<GenericDisputable>, StepError> {
        self.generic
            .get(app)
            .cloned()
            .ok_or_else(|| StepError::Scenario(format!("{app} is not a generic app")))
    }

    fn delay_app(&self, app: &AppId) -> Result<Arc<Delay>, StepError> {
        self.delays
            .get(app)
            .cloned()
            .ok_or_else(|| StepError::Scenario(format!("{app} is not a delay app")))
    }

    /// The named arbitrator, or the one bound to the current setting.
    fn court(&self, account: Option<&Account>) -> Result<Arc<InMemoryArbitrator>, StepError> {
        let account = match account {
            Some(account) => account.clone(),
            None => {
                self.engine
                    .setting(self.engine.current_setting_id())?
                    .arbitrator
                    .clone()
            }
        };
        self.arbitrators
            .get(&account)
            .cloned()
            .ok_or_else(|| StepError::Scenario(format!("unknown arbitrator {account}")))
    }

    fn track(&mut self, account: &Account, token: &TokenId) {
        self.accounts.insert(account.clone());
        self.tokens.insert(token.clone());
    }

    fn track_arbitrator(&mut self, court: &InMemoryArbitrator) {
        let fees = court.dispute_fees();
        self.track(court.account(), &fees.token);
    }
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("agreement", &self.engine.id())
            .field("generic_apps", &self.generic.len())
            .field("delay_apps", &self.delays.len())
            .field("arbitrators", &self.arbitrators.len())
            .finish()
    }
}
