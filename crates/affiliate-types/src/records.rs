//! Persisted ledger records.
//!
//! These are plain data. Every mutation goes through the ledger engine, which
//! hands out clones; collaborators never receive a mutable handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, EventId, PayoutRequestId, ReferralCode, ReferralId};
use crate::money::Money;
use crate::plan::Plan;

/// Top-level affiliate entity owning a referral code and aggregate balances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateAccount {
    pub id: AccountId,
    /// Display name of the affiliate
    pub owner: String,
    /// Immutable public token used in referral links
    pub referral_code: ReferralCode,

    pub clicks: u64,
    pub registrations: u64,
    /// Number of subscription events credited (monotonic)
    pub active_subscriptions: u64,

    pub pending_earnings: Money,
    pub paid_earnings: Money,
    /// Earnings within the current billing period
    pub monthly_earnings: Money,
    /// Always `pending_earnings + paid_earnings`
    pub total_earnings: Money,

    /// Recomputed on every subscription event; either direction
    pub volume_bonus_active: bool,
    /// One-way promotion; never cleared once set
    pub partner_status: bool,

    /// External payout account, absent until connected
    pub payout_channel: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AffiliateAccount {
    pub fn new(owner: impl Into<String>, referral_code: ReferralCode) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::generate(),
            owner: owner.into(),
            referral_code,
            clicks: 0,
            registrations: 0,
            active_subscriptions: 0,
            pending_earnings: Money::ZERO,
            paid_earnings: Money::ZERO,
            monthly_earnings: Money::ZERO,
            total_earnings: Money::ZERO,
            volume_bonus_active: false,
            partner_status: false,
            payout_channel: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Referral activity status. Only an explicit cancellation deactivates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Active,
    Inactive,
}

/// Display information captured at signup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralProfile {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ReferralProfile {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email: None,
        }
    }
}

/// Per-referred-user attribution and earnings entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub id: ReferralId,
    pub account_id: AccountId,
    pub profile: ReferralProfile,
    pub plan: Plan,
    pub status: ReferralStatus,
    pub joined_at: DateTime<Utc>,
    /// Lifetime commission credited for this referral
    pub earnings: Money,
    pub monthly_earnings: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl ReferralRecord {
    pub fn new(id: ReferralId, account_id: AccountId, profile: ReferralProfile) -> Self {
        Self {
            id,
            account_id,
            profile,
            plan: Plan::None,
            status: ReferralStatus::Active,
            joined_at: Utc::now(),
            earnings: Money::ZERO,
            monthly_earnings: Money::ZERO,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReferralStatus::Active
    }
}

/// Result of applying a subscription event, kept for idempotent replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionReceipt {
    pub event_id: EventId,
    pub referral_id: ReferralId,
    pub plan: Plan,
    pub amount: Money,
    pub commission: Money,
    /// Bonus flag the commission was computed with (state before the event)
    pub volume_bonus_applied: bool,
    /// Bonus flag after the recount
    pub volume_bonus_active: bool,
    pub partner_status: bool,
    pub applied_at: DateTime<Utc>,
}

/// Lifecycle of a payout after its debit committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Debit committed, channel call in progress. Owned by the request that
    /// made the call; it cannot be resolved externally.
    Dispatching,
    /// Channel did not answer in time; awaiting an external resolution
    InFlight,
    Completed,
    /// Channel failed; pending earnings were restored
    Failed,
}

impl PayoutStatus {
    /// Funds are debited but the outcome is not final.
    pub fn is_unresolved(self) -> bool {
        matches!(self, Self::Dispatching | Self::InFlight)
    }
}

/// A payout attempt as recorded in the account history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub request_id: PayoutRequestId,
    pub amount: Money,
    /// External payout account the funds were sent to
    pub destination: String,
    pub status: PayoutStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}
