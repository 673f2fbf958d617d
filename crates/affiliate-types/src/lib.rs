//! # affiliate-types
//!
//! Shared data types for the affiliate commission and payout ledger:
//!
//! - **Identifiers**: account, referral, billing-event and payout-request ids,
//!   plus the public referral code
//! - **Money**: fixed-point minor-unit amounts with basis-point rates and
//!   half-to-even rounding
//! - **Records**: affiliate accounts, referral records, subscription receipts
//!   and payout history entries

#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod money;
pub mod plan;
pub mod records;

pub use error::ParseError;
pub use ids::{AccountId, EventId, PayoutRequestId, ReferralCode, ReferralId};
pub use money::{Money, BPS_DENOMINATOR};
pub use plan::Plan;
pub use records::{
    AffiliateAccount, PayoutRecord, PayoutStatus, ReferralProfile, ReferralRecord, ReferralStatus,
    SubscriptionReceipt,
};
