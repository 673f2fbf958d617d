use std::collections::{BTreeMap, HashMap};

use affiliate_types::{
    AffiliateAccount, EventId, Money, PayoutRecord, PayoutRequestId, ReferralId, ReferralRecord,
    SubscriptionReceipt,
};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Everything persisted for one affiliate: the unit of locking and storage.
///
/// Referral records are keyed by referral id, which enforces the
/// (account, referral) uniqueness constraint. `applied_events` is the durable
/// dedup set for subscription events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountState {
    pub account: AffiliateAccount,
    #[serde(default)]
    pub referrals: BTreeMap<ReferralId, ReferralRecord>,
    #[serde(default)]
    pub applied_events: HashMap<EventId, SubscriptionReceipt>,
    #[serde(default)]
    pub payouts: Vec<PayoutRecord>,
}

impl AccountState {
    pub fn new(account: AffiliateAccount) -> Self {
        Self {
            account,
            referrals: BTreeMap::new(),
            applied_events: HashMap::new(),
            payouts: Vec::new(),
        }
    }

    pub fn active_referral_count(&self) -> usize {
        self.referrals.values().filter(|r| r.is_active()).count()
    }

    pub(crate) fn payout_mut(&mut self, request_id: &PayoutRequestId) -> Option<&mut PayoutRecord> {
        self.payouts.iter_mut().find(|p| &p.request_id == request_id)
    }

    /// Verify the conservation invariants:
    /// `sum(referral.earnings) == total == pending + paid`.
    pub fn check_invariants(&self) -> LedgerResult<()> {
        let account = &self.account;
        let violation = |message: String| LedgerError::InvariantViolation {
            account_id: account.id.clone(),
            message,
        };

        let balance = account
            .pending_earnings
            .checked_add(account.paid_earnings)
            .ok_or_else(|| violation("pending + paid overflows".into()))?;
        if balance != account.total_earnings {
            return Err(violation(format!(
                "total {} != pending {} + paid {}",
                account.total_earnings, account.pending_earnings, account.paid_earnings
            )));
        }

        let referral_sum = self
            .referrals
            .values()
            .try_fold(Money::ZERO, |acc, r| acc.checked_add(r.earnings))
            .ok_or_else(|| violation("referral earnings overflow".into()))?;
        if referral_sum != account.total_earnings {
            return Err(violation(format!(
                "referral earnings {} != total {}",
                referral_sum, account.total_earnings
            )));
        }

        Ok(())
    }
}
