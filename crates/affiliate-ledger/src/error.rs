//! Ledger error types

use affiliate_types::{AccountId, Money, PayoutRequestId, Plan, ReferralCode, ReferralId};
use thiserror::Error;

/// Errors returned by ledger and payout operations.
///
/// Every variant except [`LedgerError::PayoutChannel`] means nothing was
/// applied. A channel failure is reported after its compensating transaction
/// has restored the pending balance.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("no account uses referral code {0}")]
    ReferralCodeNotFound(ReferralCode),

    #[error("referral code {0} is already taken")]
    DuplicateReferralCode(ReferralCode),

    #[error("unknown plan: {0}")]
    UnknownPlan(Plan),

    #[error("{referral_id} is already registered under {account_id}")]
    DuplicateReferral {
        account_id: AccountId,
        referral_id: ReferralId,
    },

    #[error("{referral_id} is not registered under {account_id}")]
    UnknownReferral {
        account_id: AccountId,
        referral_id: ReferralId,
    },

    #[error("insufficient balance: pending {pending} is below the minimum payout of {minimum}")]
    InsufficientBalance { pending: Money, minimum: Money },

    #[error("no payout channel connected to {0}")]
    PayoutChannelNotConnected(AccountId),

    #[error("invalid payout destination: {0:?}")]
    InvalidPayoutDestination(String),

    #[error("payout channel rejected {request_id}: {reason}")]
    PayoutChannel {
        request_id: PayoutRequestId,
        reason: String,
    },

    #[error("{0} is not an in-flight payout")]
    PayoutNotInFlight(PayoutRequestId),

    #[error("{0} not found")]
    PayoutNotFound(PayoutRequestId),

    #[error("arithmetic overflow while updating {0}")]
    Overflow(&'static str),

    #[error("invalid commission policy: {0}")]
    InvalidPolicy(String),

    #[error("ledger invariant violated for {account_id}: {message}")]
    InvariantViolation {
        account_id: AccountId,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from account store backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
