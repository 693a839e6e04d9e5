//! Ledger error model.

use thiserror::Error;

use crate::id::ItemId;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Caller-visible ledger failure.
///
/// Every variant is reported synchronously to the immediate caller and leaves
/// ledger state exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// An item already exists under the derived identifier.
    #[error("item {0} already exists")]
    AlreadyExists(ItemId),

    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error("item {0} is already disabled")]
    AlreadyDisabled(ItemId),

    #[error("item {0} is already enabled")]
    AlreadyEnabled(ItemId),

    /// The caller is not allowed to perform the operation.
    #[error("unauthorized")]
    Unauthorized,

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u64, requested: u64 },

    /// The item is disabled and cannot be bought.
    #[error("item {0} is disabled")]
    Disabled(ItemId),

    /// A points purchase carried a currency payment.
    #[error("unexpected payment of {0} on a points purchase")]
    UnexpectedPayment(u64),

    #[error("insufficient points: {available} available, {required} required")]
    InsufficientPoints { available: u64, required: u64 },

    /// A currency purchase was not paid exactly.
    #[error("bad payment: expected {expected}, got {paid}")]
    BadPayment { expected: u64, paid: u64 },

    /// The external currency transfer or payment collection failed.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// Arithmetic left the integer domain.
    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The ledger lock was poisoned by a panicking writer.
    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::TransferFailed(msg.into())
    }
}
