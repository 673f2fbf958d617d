//! Ledger engine: the single mutator of affiliate balances.
//!
//! Each account's state sits behind its own async mutex, so operations on one
//! account are serialized while different accounts proceed independently.
//! A mutation works on a clone of the state, is persisted, and only then
//! replaces the in-memory copy. A failed step anywhere (policy, arithmetic,
//! storage) therefore leaves the account exactly as it was.

use std::sync::Arc;

use affiliate_types::{
    AccountId, AffiliateAccount, EventId, Money, PayoutRecord, PayoutRequestId, PayoutStatus, Plan,
    ReferralCode, ReferralId, ReferralProfile, ReferralRecord, ReferralStatus,
    SubscriptionReceipt,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::payout::PayoutInstruction;
use crate::policy::CommissionPolicy;
use crate::state::AccountState;
use crate::storage::{AccountStore, InMemoryStore};

/// Attempts at drawing an unused random referral code before giving up.
const CODE_ATTEMPTS: usize = 8;

/// A validated subscription event from the billing system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub referral_id: ReferralId,
    pub plan: Plan,
    pub amount: Money,
    /// Unique per billing event; replays of the same id are no-ops
    pub event_id: EventId,
}

/// Result of `record_subscription`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub receipt: SubscriptionReceipt,
    /// The event id had already been applied; nothing changed
    pub replayed: bool,
}

impl SubscriptionOutcome {
    pub fn commission(&self) -> Money {
        self.receipt.commission
    }
}

/// Read-only view for the affiliate-facing UI.
#[derive(Clone, Debug, Serialize)]
pub struct AccountSummary {
    pub account: AffiliateAccount,
    pub active_referrals: usize,
    pub total_referrals: usize,
    pub in_flight_payouts: usize,
}

enum Txn<T> {
    Commit(T),
    Unchanged(T),
}

pub struct LedgerEngine {
    policy: CommissionPolicy,
    store: Arc<dyn AccountStore>,
    accounts: DashMap<AccountId, Arc<Mutex<AccountState>>>,
    codes: DashMap<ReferralCode, AccountId>,
}

impl LedgerEngine {
    /// Engine over a fresh in-memory store.
    pub fn new(policy: CommissionPolicy) -> LedgerResult<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            store: Arc::new(InMemoryStore::new()),
            accounts: DashMap::new(),
            codes: DashMap::new(),
        })
    }

    /// Engine over an existing store; every stored account is loaded.
    pub async fn open(policy: CommissionPolicy, store: Arc<dyn AccountStore>) -> LedgerResult<Self> {
        policy.validate()?;
        let states = store.load_all().await?;

        let engine = Self {
            policy,
            store,
            accounts: DashMap::with_capacity(states.len()),
            codes: DashMap::with_capacity(states.len()),
        };

        for mut state in states {
            if recover_dispatching(&mut state) {
                engine.store.save(&state).await?;
            }
            let id = state.account.id.clone();
            let code = state.account.referral_code.clone();
            if let Some(other) = engine.codes.insert(code.clone(), id.clone()) {
                return Err(LedgerError::InvariantViolation {
                    account_id: id,
                    message: format!("referral code {code} also used by {other}"),
                });
            }
            engine.accounts.insert(id, Arc::new(Mutex::new(state)));
        }

        info!(accounts = engine.accounts.len(), "Ledger opened");
        Ok(engine)
    }

    fn slot(&self, account_id: &AccountId) -> LedgerResult<Arc<Mutex<AccountState>>> {
        self.accounts
            .get(account_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.clone()))
    }

    /// Run `f` against a draft of the account under its lock and persist the
    /// draft if `f` commits.
    ///
    /// The draft is a full clone and the store rewrites the whole document,
    /// so each commit costs O(referrals + applied events + payouts) for the
    /// account. Unchanged results skip the save.
    async fn transact<T, F>(&self, account_id: &AccountId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut AccountState) -> LedgerResult<Txn<T>>,
    {
        let slot = self.slot(account_id)?;
        let mut current = slot.lock().await;
        let mut draft = current.clone();

        match f(&mut draft)? {
            Txn::Unchanged(out) => Ok(out),
            Txn::Commit(out) => {
                draft.account.updated_at = Utc::now();
                draft.check_invariants()?;
                self.store.save(&draft).await?;
                *current = draft;
                Ok(out)
            }
        }
    }

    async fn read<T>(&self, account_id: &AccountId, f: impl FnOnce(&AccountState) -> T) -> LedgerResult<T> {
        let slot = self.slot(account_id)?;
        let state = slot.lock().await;
        Ok(f(&state))
    }

    // --- Accounts ---

    /// Create an account with a freshly generated referral code.
    pub async fn open_account(&self, owner: impl Into<String>) -> LedgerResult<AffiliateAccount> {
        let owner = owner.into();
        let mut last_err = None;

        for _ in 0..CODE_ATTEMPTS {
            match self
                .open_account_with_code(owner.clone(), ReferralCode::generate())
                .await
            {
                Err(LedgerError::DuplicateReferralCode(code)) => {
                    debug!(%code, "Generated referral code collided, retrying");
                    last_err = Some(LedgerError::DuplicateReferralCode(code));
                }
                other => return other,
            }
        }

        Err(last_err.unwrap_or(LedgerError::Overflow("referral code space")))
    }

    /// Create an account with a caller-chosen referral code.
    #[instrument(skip(self, owner), fields(code = %code))]
    pub async fn open_account_with_code(
        &self,
        owner: impl Into<String>,
        code: ReferralCode,
    ) -> LedgerResult<AffiliateAccount> {
        let account = AffiliateAccount::new(owner, code.clone());

        match self.codes.entry(code.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateReferralCode(code)),
            Entry::Vacant(slot) => {
                slot.insert(account.id.clone());
            }
        }

        let state = AccountState::new(account.clone());
        if let Err(e) = self.store.save(&state).await {
            self.codes.remove(&code);
            return Err(e.into());
        }
        self.accounts
            .insert(account.id.clone(), Arc::new(Mutex::new(state)));

        info!(account = %account.id, owner = %account.owner, "Affiliate account opened");
        Ok(account)
    }

    /// Resolve a referral code from an affiliate link.
    pub async fn account_by_code(&self, code: &ReferralCode) -> LedgerResult<AffiliateAccount> {
        let account_id = self
            .codes
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::ReferralCodeNotFound(code.clone()))?;
        self.account(&account_id).await
    }

    // --- Attribution ---

    #[instrument(skip(self), fields(account = %account_id))]
    pub async fn record_click(&self, account_id: &AccountId) -> LedgerResult<u64> {
        let clicks = self
            .transact(account_id, |state| {
                let clicks = state
                    .account
                    .clicks
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow("clicks"))?;
                state.account.clicks = clicks;
                Ok(Txn::Commit(clicks))
            })
            .await?;

        debug!(clicks, "Click recorded");
        Ok(clicks)
    }

    #[instrument(skip(self, profile), fields(account = %account_id, referral = %referral_id))]
    pub async fn record_registration(
        &self,
        account_id: &AccountId,
        referral_id: ReferralId,
        profile: ReferralProfile,
    ) -> LedgerResult<ReferralRecord> {
        let record = self
            .transact(account_id, |state| {
                if state.referrals.contains_key(&referral_id) {
                    return Err(LedgerError::DuplicateReferral {
                        account_id: account_id.clone(),
                        referral_id: referral_id.clone(),
                    });
                }
                state.account.registrations = state
                    .account
                    .registrations
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow("registrations"))?;

                let record = ReferralRecord::new(referral_id.clone(), account_id.clone(), profile);
                state.referrals.insert(referral_id.clone(), record.clone());
                Ok(Txn::Commit(record))
            })
            .await?;

        info!("Referral registered");
        Ok(record)
    }

    // --- Billing ---

    /// Credit the commission for a subscription event.
    ///
    /// The commission uses the volume-bonus flag as it stood before the event;
    /// the flag is recounted afterwards. Replaying an applied `event_id`
    /// returns the original receipt without touching balances.
    #[instrument(
        skip(self, event),
        fields(account = %account_id, referral = %event.referral_id, event = %event.event_id)
    )]
    pub async fn record_subscription(
        &self,
        account_id: &AccountId,
        event: SubscriptionEvent,
    ) -> LedgerResult<SubscriptionOutcome> {
        let policy = &self.policy;

        let outcome = self
            .transact(account_id, |state| {
                if let Some(prior) = state.applied_events.get(&event.event_id) {
                    if prior.referral_id != event.referral_id
                        || prior.plan != event.plan
                        || prior.amount != event.amount
                    {
                        warn!("Event id replayed with a different payload; keeping original");
                    }
                    return Ok(Txn::Unchanged(SubscriptionOutcome {
                        receipt: prior.clone(),
                        replayed: true,
                    }));
                }

                if !state.referrals.contains_key(&event.referral_id) {
                    return Err(LedgerError::UnknownReferral {
                        account_id: account_id.clone(),
                        referral_id: event.referral_id.clone(),
                    });
                }

                let bonus_applied = state.account.volume_bonus_active;
                let commission = policy.commission(event.plan, event.amount, bonus_applied)?;
                let add = |balance: Money, what: &'static str| {
                    balance
                        .checked_add(commission)
                        .ok_or(LedgerError::Overflow(what))
                };

                if let Some(referral) = state.referrals.get_mut(&event.referral_id) {
                    referral.plan = event.plan;
                    referral.earnings = add(referral.earnings, "referral earnings")?;
                    referral.monthly_earnings =
                        add(referral.monthly_earnings, "referral monthly earnings")?;
                    if referral.status == ReferralStatus::Inactive {
                        referral.status = ReferralStatus::Active;
                        referral.cancelled_at = None;
                    }
                }

                let account = &mut state.account;
                account.active_subscriptions = account
                    .active_subscriptions
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow("active subscriptions"))?;
                account.pending_earnings = add(account.pending_earnings, "pending earnings")?;
                account.monthly_earnings = add(account.monthly_earnings, "monthly earnings")?;
                account.total_earnings = add(account.total_earnings, "total earnings")?;

                let active_referrals = state.active_referral_count();
                let bonus_now = policy.volume_bonus_earned(active_referrals);
                if bonus_now != state.account.volume_bonus_active {
                    info!(active_referrals, active = bonus_now, "Volume bonus changed");
                }
                state.account.volume_bonus_active = bonus_now;

                if !state.account.partner_status
                    && policy.partner_earned(state.account.monthly_earnings)
                {
                    state.account.partner_status = true;
                    info!(monthly = %state.account.monthly_earnings, "Partner status granted");
                }

                let receipt = SubscriptionReceipt {
                    event_id: event.event_id.clone(),
                    referral_id: event.referral_id.clone(),
                    plan: event.plan,
                    amount: event.amount,
                    commission,
                    volume_bonus_applied: bonus_applied,
                    volume_bonus_active: state.account.volume_bonus_active,
                    partner_status: state.account.partner_status,
                    applied_at: Utc::now(),
                };
                state
                    .applied_events
                    .insert(event.event_id.clone(), receipt.clone());

                Ok(Txn::Commit(SubscriptionOutcome {
                    receipt,
                    replayed: false,
                }))
            })
            .await?;

        if outcome.replayed {
            debug!(commission = %outcome.commission(), "Duplicate subscription event ignored");
        } else {
            info!(
                plan = %event.plan,
                amount = %event.amount,
                commission = %outcome.commission(),
                "Subscription commission credited"
            );
        }
        Ok(outcome)
    }

    /// Mark a referral inactive after an external cancellation signal.
    ///
    /// Balances are untouched; the volume bonus is recounted on the next
    /// subscription event.
    #[instrument(skip(self), fields(account = %account_id, referral = %referral_id))]
    pub async fn record_cancellation(
        &self,
        account_id: &AccountId,
        referral_id: &ReferralId,
    ) -> LedgerResult<ReferralRecord> {
        self.transact(account_id, |state| {
            let referral = state.referrals.get_mut(referral_id).ok_or_else(|| {
                LedgerError::UnknownReferral {
                    account_id: account_id.clone(),
                    referral_id: referral_id.clone(),
                }
            })?;

            if referral.status == ReferralStatus::Inactive {
                return Ok(Txn::Unchanged(referral.clone()));
            }

            referral.status = ReferralStatus::Inactive;
            referral.cancelled_at = Some(Utc::now());
            info!("Referral cancelled");
            Ok(Txn::Commit(referral.clone()))
        })
        .await
    }

    /// Reset monthly earnings on the account and its referrals.
    ///
    /// Partner status is left as is. Returns the amount earned in the closed
    /// period.
    #[instrument(skip(self), fields(account = %account_id))]
    pub async fn close_billing_period(&self, account_id: &AccountId) -> LedgerResult<Money> {
        let closed = self
            .transact(account_id, |state| {
                let closed = state.account.monthly_earnings;
                state.account.monthly_earnings = Money::ZERO;
                for referral in state.referrals.values_mut() {
                    referral.monthly_earnings = Money::ZERO;
                }
                Ok(Txn::Commit(closed))
            })
            .await?;

        info!(closed = %closed, "Billing period closed");
        Ok(closed)
    }

    // --- Payout channel ---

    /// Attach an external payout account. Only the account row changes.
    #[instrument(skip(self, external_account), fields(account = %account_id))]
    pub async fn connect_payout_channel(
        &self,
        account_id: &AccountId,
        external_account: impl Into<String>,
    ) -> LedgerResult<AffiliateAccount> {
        let external_account = external_account.into().trim().to_string();
        if external_account.is_empty() {
            return Err(LedgerError::InvalidPayoutDestination(external_account));
        }

        self.transact(account_id, |state| {
            if state.account.payout_channel.as_deref() == Some(external_account.as_str()) {
                return Ok(Txn::Unchanged(state.account.clone()));
            }
            state.account.payout_channel = Some(external_account.clone());
            info!("Payout channel connected");
            Ok(Txn::Commit(state.account.clone()))
        })
        .await
    }

    /// Atomically move the whole pending balance to paid and record a
    /// dispatching payout owned by the caller.
    pub(crate) async fn begin_payout(
        &self,
        account_id: &AccountId,
        request_id: PayoutRequestId,
    ) -> LedgerResult<PayoutInstruction> {
        let minimum = self.policy.minimum_payout;

        self.transact(account_id, |state| {
            let pending = state.account.pending_earnings;
            if pending.is_zero() || pending < minimum {
                return Err(LedgerError::InsufficientBalance { pending, minimum });
            }
            let destination = state
                .account
                .payout_channel
                .clone()
                .ok_or_else(|| LedgerError::PayoutChannelNotConnected(account_id.clone()))?;

            state.account.paid_earnings = state
                .account
                .paid_earnings
                .checked_add(pending)
                .ok_or(LedgerError::Overflow("paid earnings"))?;
            state.account.pending_earnings = Money::ZERO;

            state.payouts.push(PayoutRecord {
                request_id: request_id.clone(),
                amount: pending,
                destination: destination.clone(),
                status: PayoutStatus::Dispatching,
                reference: None,
                failure_reason: None,
                requested_at: Utc::now(),
                resolved_at: None,
            });

            Ok(Txn::Commit(PayoutInstruction {
                request_id: request_id.clone(),
                account_id: account_id.clone(),
                amount: pending,
                destination,
            }))
        })
        .await
    }

    /// Hand a dispatching payout over to external resolution after the
    /// channel call timed out.
    pub(crate) async fn park_payout(
        &self,
        account_id: &AccountId,
        request_id: &PayoutRequestId,
    ) -> LedgerResult<PayoutRecord> {
        self.transact(account_id, |state| {
            let record = payout_in(state, request_id, PayoutStatus::Dispatching)?;
            record.status = PayoutStatus::InFlight;
            Ok(Txn::Commit(record.clone()))
        })
        .await
    }

    /// Confirm a payout currently in status `from`.
    pub(crate) async fn settle_payout(
        &self,
        account_id: &AccountId,
        request_id: &PayoutRequestId,
        from: PayoutStatus,
        reference: String,
    ) -> LedgerResult<PayoutRecord> {
        self.transact(account_id, |state| {
            let record = payout_in(state, request_id, from)?;
            record.status = PayoutStatus::Completed;
            record.reference = Some(reference);
            record.resolved_at = Some(Utc::now());
            Ok(Txn::Commit(record.clone()))
        })
        .await
    }

    /// Compensating transaction for a failed payout in status `from`:
    /// restore pending earnings.
    pub(crate) async fn compensate_payout(
        &self,
        account_id: &AccountId,
        request_id: &PayoutRequestId,
        from: PayoutStatus,
        reason: String,
    ) -> LedgerResult<PayoutRecord> {
        self.transact(account_id, |state| {
            let amount = payout_in(state, request_id, from)?.amount;

            let account = &mut state.account;
            account.paid_earnings = account
                .paid_earnings
                .checked_sub(amount)
                .ok_or(LedgerError::Overflow("paid earnings"))?;
            account.pending_earnings = account
                .pending_earnings
                .checked_add(amount)
                .ok_or(LedgerError::Overflow("pending earnings"))?;

            let record = payout_in(state, request_id, from)?;
            record.status = PayoutStatus::Failed;
            record.failure_reason = Some(reason);
            record.resolved_at = Some(Utc::now());
            Ok(Txn::Commit(record.clone()))
        })
        .await
    }

    // --- Queries ---

    pub async fn account(&self, account_id: &AccountId) -> LedgerResult<AffiliateAccount> {
        self.read(account_id, |state| state.account.clone()).await
    }

    pub async fn summary(&self, account_id: &AccountId) -> LedgerResult<AccountSummary> {
        self.read(account_id, |state| AccountSummary {
            account: state.account.clone(),
            active_referrals: state.active_referral_count(),
            total_referrals: state.referrals.len(),
            in_flight_payouts: state
                .payouts
                .iter()
                .filter(|p| p.status.is_unresolved())
                .count(),
        })
        .await
    }

    pub async fn referral(
        &self,
        account_id: &AccountId,
        referral_id: &ReferralId,
    ) -> LedgerResult<ReferralRecord> {
        self.read(account_id, |state| state.referrals.get(referral_id).cloned())
            .await?
            .ok_or_else(|| LedgerError::UnknownReferral {
                account_id: account_id.clone(),
                referral_id: referral_id.clone(),
            })
    }

    /// Referral records for display, newest first.
    pub async fn referrals(&self, account_id: &AccountId) -> LedgerResult<Vec<ReferralRecord>> {
        let mut referrals = self
            .read(account_id, |state| {
                state.referrals.values().cloned().collect::<Vec<_>>()
            })
            .await?;
        referrals.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(referrals)
    }

    /// Payout history, newest first.
    pub async fn payouts(&self, account_id: &AccountId) -> LedgerResult<Vec<PayoutRecord>> {
        let mut payouts = self.read(account_id, |state| state.payouts.clone()).await?;
        payouts.reverse();
        Ok(payouts)
    }

    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<_> = self.accounts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Verify the conservation invariants for one account.
    pub async fn audit(&self, account_id: &AccountId) -> LedgerResult<()> {
        self.read(account_id, |state| state.check_invariants()).await?
    }
}

fn payout_in<'a>(
    state: &'a mut AccountState,
    request_id: &PayoutRequestId,
    expected: PayoutStatus,
) -> LedgerResult<&'a mut PayoutRecord> {
    let record = state
        .payout_mut(request_id)
        .ok_or_else(|| LedgerError::PayoutNotFound(request_id.clone()))?;
    if record.status != expected {
        return Err(LedgerError::PayoutNotInFlight(request_id.clone()));
    }
    Ok(record)
}

/// A dispatching payout found at startup lost its caller; its channel outcome
/// is unknown, so it waits for external resolution like a timed-out one.
fn recover_dispatching(state: &mut AccountState) -> bool {
    let mut recovered = false;
    for record in &mut state.payouts {
        if record.status == PayoutStatus::Dispatching {
            warn!(
                account = %state.account.id,
                payout = %record.request_id,
                "Payout was dispatching at shutdown; marking in flight"
            );
            record.status = PayoutStatus::InFlight;
            recovered = true;
        }
    }
    recovered
}
