use thiserror::Error;

/// Errors raised when parsing ledger values from collaborator input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    #[error("invalid monetary amount: {0}")]
    InvalidAmount(String),

    #[error("invalid referral code: {0:?}")]
    InvalidReferralCode(String),
}
