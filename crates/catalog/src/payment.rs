//! Currency movement, supplied by the embedding environment.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use thiserror::Error;

use tally_core::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("insufficient funds: {available} available, {requested} requested")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("recipient {0} cannot accept funds")]
    Rejected(UserId),

    #[error("wallet balance overflow")]
    Overflow,

    #[error("payment backend unavailable: {0}")]
    Unavailable(String),
}

/// Gateway through which the ledger moves currency.
///
/// Both directions can fail. A failure aborts the ledger operation that asked
/// for the transfer; the ledger never retries.
pub trait PaymentGateway: Send + Sync {
    /// Take `amount` attached to a purchase from `from`.
    fn collect(&self, from: UserId, amount: u64) -> Result<(), PaymentError>;

    /// Push `amount` to `to`.
    fn payout(&self, to: UserId, amount: u64) -> Result<(), PaymentError>;
}

impl<G> PaymentGateway for std::sync::Arc<G>
where
    G: PaymentGateway + ?Sized,
{
    fn collect(&self, from: UserId, amount: u64) -> Result<(), PaymentError> {
        (**self).collect(from, amount)
    }

    fn payout(&self, to: UserId, amount: u64) -> Result<(), PaymentError> {
        (**self).payout(to, amount)
    }
}

/// In-memory wallets for tests/dev.
///
/// Each user holds a currency balance. Recipients marked as rejecting refuse
/// every payout.
#[derive(Debug, Default)]
pub struct InMemoryWallets {
    funds: RwLock<HashMap<UserId, u64>>,
    rejecting: RwLock<HashSet<UserId>>,
}

impl InMemoryWallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `user` outside of any ledger operation.
    pub fn deposit(&self, user: UserId, amount: u64) -> Result<(), PaymentError> {
        let mut funds = self.funds.write().map_err(|_| poisoned())?;
        let entry = funds.entry(user).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(PaymentError::Overflow)?;
        Ok(())
    }

    pub fn funds_of(&self, user: UserId) -> u64 {
        self.funds
            .read()
            .map(|funds| funds.get(&user).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Make every future payout to `user` fail.
    pub fn reject_payouts_to(&self, user: UserId) {
        if let Ok(mut rejecting) = self.rejecting.write() {
            rejecting.insert(user);
        }
    }
}

fn poisoned() -> PaymentError {
    PaymentError::Unavailable("wallet lock poisoned".to_string())
}

impl PaymentGateway for InMemoryWallets {
    fn collect(&self, from: UserId, amount: u64) -> Result<(), PaymentError> {
        let mut funds = self.funds.write().map_err(|_| poisoned())?;
        let available = funds.get(&from).copied().unwrap_or(0);
        if available < amount {
            return Err(PaymentError::InsufficientFunds {
                available,
                requested: amount,
            });
        }
        funds.insert(from, available - amount);
        Ok(())
    }

    fn payout(&self, to: UserId, amount: u64) -> Result<(), PaymentError> {
        if self.rejecting.read().map_err(|_| poisoned())?.contains(&to) {
            return Err(PaymentError::Rejected(to));
        }
        self.deposit(to, amount)
    }
}
