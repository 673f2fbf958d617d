//! Affiliate commission and payout ledger.
//!
//! The [`LedgerEngine`] owns every balance mutation: clicks, registrations,
//! subscription commissions, cancellations, billing-period rollover and the
//! debit side of payouts. Each account is locked independently and every
//! operation either commits completely or leaves the account untouched.
//!
//! [`PayoutWorkflow`] drives the external payout channel around the engine:
//! debit first, call the channel with no lock held, then confirm or
//! compensate.
//!
//! # Example
//!
//! ```no_run
//! use affiliate_ledger::{CommissionPolicy, LedgerEngine, SubscriptionEvent};
//! use affiliate_types::{EventId, Money, Plan, ReferralId, ReferralProfile};
//!
//! # async fn demo() -> affiliate_ledger::LedgerResult<()> {
//! let engine = LedgerEngine::new(CommissionPolicy::default())?;
//! let account = engine.open_account("alice").await?;
//!
//! engine
//!     .record_registration(&account.id, ReferralId::new("r1"), ReferralProfile::named("Bob"))
//!     .await?;
//! let outcome = engine
//!     .record_subscription(
//!         &account.id,
//!         SubscriptionEvent {
//!             referral_id: ReferralId::new("r1"),
//!             plan: Plan::Pro,
//!             amount: Money::from_minor(2_000),
//!             event_id: EventId::new("evt_1"),
//!         },
//!     )
//!     .await?;
//! assert_eq!(outcome.commission(), Money::from_minor(600));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod payout;
pub mod policy;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use config::{LedgerConfig, LoggingConfig, PayoutConfig, StorageConfig};
pub use engine::{AccountSummary, LedgerEngine, SubscriptionEvent, SubscriptionOutcome};
pub use error::{LedgerError, LedgerResult, StorageError};
pub use payout::{
    ChannelError, ChannelReceipt, PayoutChannel, PayoutInstruction, PayoutOutcome,
    PayoutResolution, PayoutWorkflow,
};
pub use policy::CommissionPolicy;
pub use state::AccountState;
pub use storage::{AccountStore, FileStore, InMemoryStore};
pub use telemetry::init_tracing;
