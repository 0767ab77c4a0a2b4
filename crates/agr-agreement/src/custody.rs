//! # Collateral Custody Adapter
//!
//! The custody ledger holds three kinds of balances per token:
//!
//! - **wallets**: free token balances per account;
//! - **stakes**: `available` and `locked` staked balances per staker;
//! - **escrow**: tokens held on behalf of the engine (challenge collateral
//!   and challenger arbitration fees).
//!
//! The engine never touches balances directly. It describes the money
//! movements of one entry point as a [`CustodyBatch`] and hands the batch
//! to [`Custody::execute`], which applies every operation or none.
//! [`Custody::check`] is the same validation as a dry run.

use std::collections::BTreeMap;

use agr_core::{Account, Amount, TokenId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CustodyError;

/// A single money movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyOp {
    /// available → locked
    Lock {
        /// Token.
        token: TokenId,
        /// Staker.
        staker: Account,
        /// Amount to lock.
        amount: Amount,
    },
    /// locked → available
    Unlock {
        /// Token.
        token: TokenId,
        /// Staker.
        staker: Account,
        /// Amount to unlock.
        amount: Amount,
    },
    /// locked stake of `staker` → wallet of `to`
    Slash {
        /// Token.
        token: TokenId,
        /// Staker losing the stake.
        staker: Account,
        /// Amount to slash.
        amount: Amount,
        /// Recipient.
        to: Account,
    },
    /// wallet of `payer` → escrow
    TransferIn {
        /// Token.
        token: TokenId,
        /// Payer.
        payer: Account,
        /// Amount to deposit.
        amount: Amount,
    },
    /// escrow → wallet of `to`
    TransferOut {
        /// Token.
        token: TokenId,
        /// Amount to pay out.
        amount: Amount,
        /// Recipient.
        to: Account,
    },
}

/// An ordered, all-or-nothing set of custody operations.
///
/// Zero-amount operations are dropped when added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyBatch {
    ops: Vec<CustodyOp>,
}

impl CustodyBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `amount` of the staker's available stake.
    pub fn lock(self, token: &TokenId, staker: &Account, amount: Amount) -> Self {
        self.push(amount, CustodyOp::Lock {
            token: token.clone(),
            staker: staker.clone(),
            amount,
        })
    }

    /// Release `amount` of the staker's locked stake.
    pub fn unlock(self, token: &TokenId, staker: &Account, amount: Amount) -> Self {
        self.push(amount, CustodyOp::Unlock {
            token: token.clone(),
            staker: staker.clone(),
            amount,
        })
    }

    /// Move `amount` of the staker's locked stake to `to`'s wallet.
    pub fn slash(self, token: &TokenId, staker: &Account, amount: Amount, to: &Account) -> Self {
        self.push(amount, CustodyOp::Slash {
            token: token.clone(),
            staker: staker.clone(),
            amount,
            to: to.clone(),
        })
    }

    /// Deposit `amount` from the payer's wallet into escrow.
    pub fn transfer_in(self, token: &TokenId, payer: &Account, amount: Amount) -> Self {
        self.push(amount, CustodyOp::TransferIn {
            token: token.clone(),
            payer: payer.clone(),
            amount,
        })
    }

    /// Pay `amount` out of escrow to `to`.
    pub fn transfer_out(self, token: &TokenId, amount: Amount, to: &Account) -> Self {
        self.push(amount, CustodyOp::TransferOut {
            token: token.clone(),
            amount,
            to: to.clone(),
        })
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[CustodyOp] {
        &self.ops
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when every operation was zero.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn push(mut self, amount: Amount, op: CustodyOp) -> Self {
        if !amount.is_zero() {
            self.ops.push(op);
        }
        self
    }
}

/// Staked balance of one staker in one token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeBalance {
    /// Stake free to lock or unstake.
    pub available: Amount,
    /// Stake backing open actions.
    pub locked: Amount,
}

impl StakeBalance {
    /// Available plus locked.
    pub fn total(&self) -> Amount {
        Amount(self.available.0.saturating_add(self.locked.0))
    }
}

/// The engine's view of the custody ledger.
pub trait Custody: Send + Sync {
    /// The staker's stake in `token`.
    fn stake_balance(&self, token: &TokenId, staker: &Account) -> StakeBalance;

    /// Validate a batch without applying it.
    fn check(&self, batch: &CustodyBatch) -> Result<(), CustodyError>;

    /// Apply every operation of the batch, or none of them.
    fn execute(&self, batch: &CustodyBatch) -> Result<(), CustodyError>;

    /// Single-op [`lock`](CustodyBatch::lock).
    fn lock(&self, token: &TokenId, staker: &Account, amount: Amount) -> Result<(), CustodyError> {
        self.execute(&CustodyBatch::new().lock(token, staker, amount))
    }

    /// Single-op [`unlock`](CustodyBatch::unlock).
    fn unlock(&self, token: &TokenId, staker: &Account, amount: Amount) -> Result<(), CustodyError> {
        self.execute(&CustodyBatch::new().unlock(token, staker, amount))
    }

    /// Single-op [`slash`](CustodyBatch::slash).
    fn slash(&self, token: &TokenId, staker: &Account, amount: Amount, to: &Account) -> Result<(), CustodyError> {
        self.execute(&CustodyBatch::new().slash(token, staker, amount, to))
    }

    /// Single-op [`transfer_in`](CustodyBatch::transfer_in).
    fn transfer_in(&self, token: &TokenId, payer: &Account, amount: Amount) -> Result<(), CustodyError> {
        self.execute(&CustodyBatch::new().transfer_in(token, payer, amount))
    }

    /// Single-op [`transfer_out`](CustodyBatch::transfer_out).
    fn transfer_out(&self, token: &TokenId, amount: Amount, to: &Account) -> Result<(), CustodyError> {
        self.execute(&CustodyBatch::new().transfer_out(token, amount, to))
    }
}

// ── In-memory ledger ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Ledger {
    wallets: BTreeMap<(TokenId, Account), Amount>,
    stakes: BTreeMap<(TokenId, Account), StakeBalance>,
    escrow: BTreeMap<TokenId, Amount>,
}

impl Ledger {
    fn wallet(&self, token: &TokenId, account: &Account) -> Amount {
        self.wallets
            .get(&(token.clone(), account.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn stake(&self, token: &TokenId, staker: &Account) -> StakeBalance {
        self.stakes
            .get(&(token.clone(), staker.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn escrowed(&self, token: &TokenId) -> Amount {
        self.escrow.get(token).copied().unwrap_or_default()
    }

    fn credit_wallet(&mut self, token: &TokenId, account: &Account, amount: Amount) -> Result<(), CustodyError> {
        let balance = self.wallet(token, account).checked_add(amount)?;
        self.wallets.insert((token.clone(), account.clone()), balance);
        Ok(())
    }

    fn debit_wallet(&mut self, token: &TokenId, account: &Account, amount: Amount) -> Result<(), CustodyError> {
        let balance = self.wallet(token, account);
        if balance < amount {
            return Err(CustodyError::DepositFailed {
                token: token.clone(),
                payer: account.clone(),
                requested: amount,
                balance,
            });
        }
        self.wallets
            .insert((token.clone(), account.clone()), balance.saturating_sub(amount));
        Ok(())
    }

    fn take_locked(&mut self, token: &TokenId, staker: &Account, amount: Amount) -> Result<StakeBalance, CustodyError> {
        let mut stake = self.stake(token, staker);
        if stake.locked < amount {
            return Err(CustodyError::InsufficientLocked {
                token: token.clone(),
                staker: staker.clone(),
                requested: amount,
                locked: stake.locked,
            });
        }
        stake.locked = stake.locked.saturating_sub(amount);
        Ok(stake)
    }

    fn apply(&mut self, op: &CustodyOp) -> Result<(), CustodyError> {
        match op {
            CustodyOp::Lock { token, staker, amount } => {
                let mut stake = self.stake(token, staker);
                if stake.available < *amount {
                    return Err(CustodyError::InsufficientAvailable {
                        token: token.clone(),
                        staker: staker.clone(),
                        requested: *amount,
                        available: stake.available,
                    });
                }
                stake.available = stake.available.saturating_sub(*amount);
                stake.locked = stake.locked.checked_add(*amount)?;
                self.stakes.insert((token.clone(), staker.clone()), stake);
            }
            CustodyOp::Unlock { token, staker, amount } => {
                let mut stake = self.take_locked(token, staker, *amount)?;
                stake.available = stake.available.checked_add(*amount)?;
                self.stakes.insert((token.clone(), staker.clone()), stake);
            }
            CustodyOp::Slash { token, staker, amount, to } => {
                let stake = self.take_locked(token, staker, *amount)?;
                self.stakes.insert((token.clone(), staker.clone()), stake);
                self.credit_wallet(token, to, *amount)?;
            }
            CustodyOp::TransferIn { token, payer, amount } => {
                self.debit_wallet(token, payer, *amount)?;
                let escrowed = self.escrowed(token).checked_add(*amount)?;
                self.escrow.insert(token.clone(), escrowed);
            }
            CustodyOp::TransferOut { token, amount, to } => {
                let escrowed = self.escrowed(token);
                if escrowed < *amount {
                    return Err(CustodyError::TransferFailed {
                        token: token.clone(),
                        to: to.clone(),
                        requested: *amount,
                        escrowed,
                    });
                }
                self.escrow.insert(token.clone(), escrowed.saturating_sub(*amount));
                self.credit_wallet(token, to, *amount)?;
            }
        }
        Ok(())
    }

    fn apply_all(&mut self, batch: &CustodyBatch) -> Result<(), CustodyError> {
        batch.ops().iter().try_for_each(|op| self.apply(op))
    }
}

/// A token ledger, staking pool and escrow kept in memory.
///
/// Batches are applied to a staged copy of the ledger and swapped in only
/// when every operation succeeded.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    ledger: Mutex<Ledger>,
}

impl InMemoryCustody {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new tokens in `account`'s wallet.
    pub fn mint(&self, token: &TokenId, account: &Account, amount: Amount) -> Result<(), CustodyError> {
        self.ledger.lock().credit_wallet(token, account, amount)
    }

    /// Move tokens from the staker's wallet into their available stake.
    pub fn stake(&self, token: &TokenId, staker: &Account, amount: Amount) -> Result<(), CustodyError> {
        if amount.is_zero() {
            return Err(CustodyError::InvalidStakeAmount);
        }
        let mut ledger = self.ledger.lock();
        let mut staged = ledger.clone();
        staged.debit_wallet(token, staker, amount)?;
        let mut stake = staged.stake(token, staker);
        stake.available = stake.available.checked_add(amount)?;
        staged.stakes.insert((token.clone(), staker.clone()), stake);
        *ledger = staged;
        tracing::debug!(token = %token, staker = %staker, amount = %amount, "staked");
        Ok(())
    }

    /// Move tokens from the staker's available stake back to their wallet.
    pub fn unstake(&self, token: &TokenId, staker: &Account, amount: Amount) -> Result<(), CustodyError> {
        if amount.is_zero() {
            return Err(CustodyError::InvalidUnstakeAmount);
        }
        let mut ledger = self.ledger.lock();
        let mut stake = ledger.stake(token, staker);
        if stake.available < amount {
            return Err(CustodyError::InsufficientAvailable {
                token: token.clone(),
                staker: staker.clone(),
                requested: amount,
                available: stake.available,
            });
        }
        let mut staged = ledger.clone();
        stake.available = stake.available.saturating_sub(amount);
        staged.stakes.insert((token.clone(), staker.clone()), stake);
        staged.credit_wallet(token, staker, amount)?;
        *ledger = staged;
        tracing::debug!(token = %token, staker = %staker, amount = %amount, "unstaked");
        Ok(())
    }

    /// Wallet balance of `account`.
    pub fn token_balance(&self, token: &TokenId, account: &Account) -> Amount {
        self.ledger.lock().wallet(token, account)
    }

    /// Tokens currently held in escrow.
    pub fn escrow_balance(&self, token: &TokenId) -> Amount {
        self.ledger.lock().escrowed(token)
    }

    /// Every unit of `token` held anywhere in the ledger.
    pub fn total_supply(&self, token: &TokenId) -> Amount {
        let ledger = self.ledger.lock();
        let wallets: u64 = ledger
            .wallets
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, amount)| amount.0)
            .sum();
        let stakes: u64 = ledger
            .stakes
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, stake)| stake.total().0)
            .sum();
        Amount(wallets + stakes + ledger.escrowed(token).0)
    }
}

impl Custody for InMemoryCustody {
    fn stake_balance(&self, token: &TokenId, staker: &Account) -> StakeBalance {
        self.ledger.lock().stake(token, staker)
    }

    fn check(&self, batch: &CustodyBatch) -> Result<(), CustodyError> {
        let mut staged = self.ledger.lock().clone();
        staged.apply_all(batch)
    }

    fn execute(&self, batch: &CustodyBatch) -> Result<(), CustodyError> {
        let mut ledger = self.ledger.lock();
        let mut staged = ledger.clone();
        staged.apply_all(batch)?;
        *ledger = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ant() -> TokenId {
        TokenId::new("ANT")
    }

    fn funded(account: &str, amount: u64) -> InMemoryCustody {
        let custody = InMemoryCustody::new();
        custody.mint(&ant(), &Account::new(account), Amount(amount)).unwrap();
        custody
    }

    #[test]
    fn stake_moves_wallet_to_available() {
        let custody = funded("alice", 1_000);
        let alice = Account::new("alice");
        custody.stake(&ant(), &alice, Amount(400)).unwrap();
        assert_eq!(custody.token_balance(&ant(), &alice), Amount(600));
        assert_eq!(custody.stake_balance(&ant(), &alice).available, Amount(400));
    }

    #[test]
    fn zero_stake_and_unstake_are_rejected() {
        let custody = funded("alice", 10);
        let alice = Account::new("alice");
        assert!(matches!(
            custody.stake(&ant(), &alice, Amount::ZERO),
            Err(CustodyError::InvalidStakeAmount)
        ));
        assert!(matches!(
            custody.unstake(&ant(), &alice, Amount::ZERO),
            Err(CustodyError::InvalidUnstakeAmount)
        ));
    }

    #[test]
    fn unstake_cannot_touch_locked_balance() {
        let custody = funded("alice", 500);
        let alice = Account::new("alice");
        custody.stake(&ant(), &alice, Amount(500)).unwrap();
        custody.lock(&ant(), &alice, Amount(300)).unwrap();
        let err = custody.unstake(&ant(), &alice, Amount(300)).unwrap_err();
        assert_eq!(err.code(), "STAKING_NOT_ENOUGH_AVAILABLE_BAL");
        custody.unstake(&ant(), &alice, Amount(200)).unwrap();
        assert_eq!(custody.token_balance(&ant(), &alice), Amount(200));
    }

    #[test]
    fn lock_requires_available_stake() {
        let custody = funded("alice", 100);
        let alice = Account::new("alice");
        custody.stake(&ant(), &alice, Amount(100)).unwrap();
        let err = custody.lock(&ant(), &alice, Amount(101)).unwrap_err();
        assert!(matches!(err, CustodyError::InsufficientAvailable { .. }));
    }

    #[test]
    fn failed_batch_leaves_ledger_untouched() {
        let custody = funded("alice", 100);
        let alice = Account::new("alice");
        custody.stake(&ant(), &alice, Amount(100)).unwrap();
        let batch = CustodyBatch::new()
            .lock(&ant(), &alice, Amount(60))
            .transfer_in(&ant(), &alice, Amount(1));
        assert!(custody.check(&batch).is_err());
        assert!(custody.execute(&batch).is_err());
        assert_eq!(custody.stake_balance(&ant(), &alice).locked, Amount::ZERO);
        assert_eq!(custody.stake_balance(&ant(), &alice).available, Amount(100));
    }

    #[test]
    fn slash_moves_locked_stake_to_wallet() {
        let custody = funded("alice", 200);
        let alice = Account::new("alice");
        let bob = Account::new("bob");
        custody.stake(&ant(), &alice, Amount(200)).unwrap();
        custody.lock(&ant(), &alice, Amount(200)).unwrap();
        custody.slash(&ant(), &alice, Amount(50), &bob).unwrap();
        assert_eq!(custody.stake_balance(&ant(), &alice).locked, Amount(150));
        assert_eq!(custody.token_balance(&ant(), &bob), Amount(50));
    }

    #[test]
    fn transfers_go_through_escrow() {
        let custody = funded("bob", 100);
        let bob = Account::new("bob");
        custody.transfer_in(&ant(), &bob, Amount(100)).unwrap();
        assert_eq!(custody.escrow_balance(&ant()), Amount(100));
        let err = custody.transfer_out(&ant(), Amount(101), &bob).unwrap_err();
        assert_eq!(err.code(), "STAKING_TOKEN_TRANSFER_FAILED");
        custody.transfer_out(&ant(), Amount(100), &bob).unwrap();
        assert_eq!(custody.token_balance(&ant(), &bob), Amount(100));
    }

    #[test]
    fn deposit_without_funds_fails() {
        let custody = InMemoryCustody::new();
        let err = custody.transfer_in(&ant(), &Account::new("bob"), Amount(1)).unwrap_err();
        assert_eq!(err.code(), "STAKING_TOKEN_DEPOSIT_FAILED");
    }

    #[test]
    fn zero_amount_ops_are_dropped() {
        let batch = CustodyBatch::new()
            .lock(&ant(), &Account::new("alice"), Amount::ZERO)
            .transfer_out(&ant(), Amount(1), &Account::new("bob"));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn total_supply_is_conserved_by_batches() {
        let custody = funded("alice", 300);
        custody.mint(&ant(), &Account::new("bob"), Amount(100)).unwrap();
        let alice = Account::new("alice");
        let bob = Account::new("bob");
        custody.stake(&ant(), &alice, Amount(300)).unwrap();
        let before = custody.total_supply(&ant());
        let batch = CustodyBatch::new()
            .lock(&ant(), &alice, Amount(200))
            .transfer_in(&ant(), &bob, Amount(100))
            .slash(&ant(), &alice, Amount(50), &bob)
            .unlock(&ant(), &alice, Amount(150))
            .transfer_out(&ant(), Amount(100), &bob);
        custody.execute(&batch).unwrap();
        assert_eq!(custody.total_supply(&ant()), before);
        assert_eq!(custody.token_balance(&ant(), &bob), Amount(150));
    }
}
