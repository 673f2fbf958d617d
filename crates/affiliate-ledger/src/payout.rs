//! Payout workflow.
//!
//! A payout is a two-phase operation around an external channel call:
//!
//! 1. Under the account lock, the whole pending balance moves to paid and a
//!    dispatching [`PayoutRecord`] is written.
//! 2. The channel is called with no lock held, bounded by a timeout.
//! 3. Success marks the record completed. Failure runs a compensating
//!    transaction that restores the pending balance. A timeout moves the
//!    record to in flight, where [`PayoutWorkflow::resolve_payout`] can
//!    settle it.
//!
//! Only the requester settles a dispatching payout, so an external
//! resolution can never race the channel answer it is waiting for.

use std::sync::Arc;
use std::time::Duration;

use affiliate_types::{AccountId, Money, PayoutRecord, PayoutRequestId, PayoutStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::PayoutConfig;
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, LedgerResult};

/// What the channel is asked to disburse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    /// Idempotency key for the channel
    pub request_id: PayoutRequestId,
    pub account_id: AccountId,
    pub amount: Money,
    /// External payout account
    pub destination: String,
}

/// Channel confirmation of a disbursement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReceipt {
    pub reference: String,
}

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// External money-movement provider.
///
/// Implementations should treat `request_id` as an idempotency key: the same
/// instruction may be retried after a timeout.
#[async_trait]
pub trait PayoutChannel: Send + Sync {
    async fn disburse(&self, instruction: &PayoutInstruction) -> Result<ChannelReceipt, ChannelError>;
}

/// Result of a payout request that did not fail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoutOutcome {
    Completed {
        request_id: PayoutRequestId,
        amount: Money,
        reference: String,
    },
    /// The channel did not answer in time. Funds stay debited until the
    /// payout is resolved.
    InFlight {
        request_id: PayoutRequestId,
        amount: Money,
    },
}

impl PayoutOutcome {
    pub fn request_id(&self) -> &PayoutRequestId {
        match self {
            Self::Completed { request_id, .. } | Self::InFlight { request_id, .. } => request_id,
        }
    }

    pub fn amount(&self) -> Money {
        match self {
            Self::Completed { amount, .. } | Self::InFlight { amount, .. } => *amount,
        }
    }
}

/// Late channel answer for an in-flight payout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoutResolution {
    Completed { reference: String },
    Failed { reason: String },
}

pub struct PayoutWorkflow {
    engine: Arc<LedgerEngine>,
    channel: Arc<dyn PayoutChannel>,
    timeout: Duration,
}

impl PayoutWorkflow {
    pub fn new(engine: Arc<LedgerEngine>, channel: Arc<dyn PayoutChannel>, config: &PayoutConfig) -> Self {
        Self {
            engine,
            channel,
            timeout: config.channel_timeout(),
        }
    }

    pub fn engine(&self) -> &Arc<LedgerEngine> {
        &self.engine
    }

    /// Pay out the whole pending balance.
    ///
    /// Fails with `InsufficientBalance` or `PayoutChannelNotConnected` without
    /// touching the ledger. A channel failure returns `PayoutChannel` after
    /// the pending balance has been restored.
    #[instrument(skip(self), fields(account = %account_id))]
    pub async fn request_payout(&self, account_id: &AccountId) -> LedgerResult<PayoutOutcome> {
        let instruction = self
            .engine
            .begin_payout(account_id, PayoutRequestId::generate())
            .await
            .inspect_err(|e| warn!(error = %e, "Payout rejected"))?;
        let request_id = instruction.request_id.clone();

        info!(
            payout = %request_id,
            amount = %instruction.amount,
            destination = %instruction.destination,
            "Payout debited, calling channel"
        );

        match tokio::time::timeout(self.timeout, self.channel.disburse(&instruction)).await {
            Ok(Ok(receipt)) => {
                self.engine
                    .settle_payout(
                        account_id,
                        &request_id,
                        PayoutStatus::Dispatching,
                        receipt.reference.clone(),
                    )
                    .await?;
                info!(payout = %request_id, reference = %receipt.reference, "Payout completed");
                Ok(PayoutOutcome::Completed {
                    request_id,
                    amount: instruction.amount,
                    reference: receipt.reference,
                })
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                warn!(payout = %request_id, %reason, "Payout channel failed, restoring balance");
                self.compensate(account_id, &request_id, PayoutStatus::Dispatching, reason.clone())
                    .await?;
                Err(LedgerError::PayoutChannel { request_id, reason })
            }
            Err(_) => {
                self.engine.park_payout(account_id, &request_id).await?;
                warn!(
                    payout = %request_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Payout channel timed out; payout left in flight"
                );
                Ok(PayoutOutcome::InFlight {
                    request_id,
                    amount: instruction.amount,
                })
            }
        }
    }

    /// Apply the channel's final answer to an in-flight payout.
    ///
    /// Only payouts whose channel call timed out can be resolved; one still
    /// being dispatched fails with `PayoutNotInFlight`.
    #[instrument(skip(self, resolution), fields(account = %account_id, payout = %request_id))]
    pub async fn resolve_payout(
        &self,
        account_id: &AccountId,
        request_id: &PayoutRequestId,
        resolution: PayoutResolution,
    ) -> LedgerResult<PayoutRecord> {
        match resolution {
            PayoutResolution::Completed { reference } => {
                let record = self
                    .engine
                    .settle_payout(account_id, request_id, PayoutStatus::InFlight, reference)
                    .await?;
                info!("In-flight payout completed");
                Ok(record)
            }
            PayoutResolution::Failed { reason } => {
                let record = self
                    .compensate(account_id, request_id, PayoutStatus::InFlight, reason)
                    .await?;
                info!(amount = %record.amount, "In-flight payout failed, balance restored");
                Ok(record)
            }
        }
    }

    async fn compensate(
        &self,
        account_id: &AccountId,
        request_id: &PayoutRequestId,
        from: PayoutStatus,
        reason: String,
    ) -> LedgerResult<PayoutRecord> {
        self.engine
            .compensate_payout(account_id, request_id, from, reason)
            .await
            .inspect_err(|e| {
                error!(payout = %request_id, error = %e, "Compensating transaction failed");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CommissionPolicy;
    use affiliate_types::{EventId, Plan, ReferralId, ReferralProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::engine::SubscriptionEvent;
    use crate::storage::{AccountStore, InMemoryStore};
    use proptest::prelude::*;
    use tokio::sync::Notify;

    enum Script {
        Accept,
        Reject,
        Hang,
    }

    struct ScriptedChannel {
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedChannel {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PayoutChannel for ScriptedChannel {
        async fn disburse(&self, instruction: &PayoutInstruction) -> Result<ChannelReceipt, ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Accept => Ok(ChannelReceipt {
                    reference: format!("tr_{}", instruction.request_id.as_uuid().simple()),
                }),
                Script::Reject => Err(ChannelError::Rejected("account closed".into())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Err(ChannelError::Unavailable("never answers".into()))
                }
            }
        }
    }

    /// Blocks inside `disburse` until released, then pays.
    #[derive(Default)]
    struct GatedChannel {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PayoutChannel for GatedChannel {
        async fn disburse(&self, _instruction: &PayoutInstruction) -> Result<ChannelReceipt, ChannelError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ChannelReceipt {
                reference: "tr_paid".into(),
            })
        }
    }

    /// Account with `amount` earned on a Business subscription (25%).
    async fn funded(engine: &LedgerEngine, amount: Money, connect: bool) -> AccountId {
        let id = engine.open_account("alice").await.unwrap().id;
        engine
            .record_registration(&id, ReferralId::new("r1"), ReferralProfile::named("Bob"))
            .await
            .unwrap();
        engine
            .record_subscription(
                &id,
                SubscriptionEvent {
                    referral_id: ReferralId::new("r1"),
                    plan: Plan::Business,
                    amount: Money::from_minor(amount.minor() * 4),
                    event_id: EventId::new("evt_1"),
                },
            )
            .await
            .unwrap();
        if connect {
            engine.connect_payout_channel(&id, "acct_123").await.unwrap();
        }
        assert_eq!(engine.account(&id).await.unwrap().pending_earnings, amount);
        id
    }

    fn workflow(channel: Arc<dyn PayoutChannel>) -> PayoutWorkflow {
        let engine = Arc::new(LedgerEngine::new(CommissionPolicy::default()).unwrap());
        PayoutWorkflow::new(engine, channel, &PayoutConfig { channel_timeout_ms: 1_000 })
    }

    #[tokio::test]
    async fn test_payout_below_minimum_is_rejected_unchanged() {
        let channel = ScriptedChannel::new(Script::Accept);
        let flow = workflow(channel.clone());
        let id = funded(flow.engine(), Money::from_minor(4_999), true).await;
        let before = flow.engine().account(&id).await.unwrap();

        let result = flow.request_payout(&id).await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(flow.engine().account(&id).await.unwrap(), before);
        assert_eq!(channel.calls.load(Ordering::SeqCst), 0);
        assert!(flow.engine().payouts(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payout_at_or_above_minimum_moves_whole_balance() {
        let flow = workflow(ScriptedChannel::new(Script::Accept));
        let id = funded(flow.engine(), Money::from_minor(5_500), true).await;

        let outcome = flow.request_payout(&id).await.unwrap();
        assert!(matches!(outcome, PayoutOutcome::Completed { .. }));
        assert_eq!(outcome.amount(), Money::from_minor(5_500));

        let account = flow.engine().account(&id).await.unwrap();
        assert_eq!(account.pending_earnings, Money::ZERO);
        assert_eq!(account.paid_earnings, Money::from_minor(5_500));
        assert_eq!(account.total_earnings, Money::from_minor(5_500));

        let payouts = flow.engine().payouts(&id).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].status, PayoutStatus::Completed);
        assert!(payouts[0].reference.is_some());
        flow.engine().audit(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_payout_without_channel_is_rejected() {
        let flow = workflow(ScriptedChannel::new(Script::Accept));
        let id = funded(flow.engine(), Money::from_minor(6_000), false).await;

        assert!(matches!(
            flow.request_payout(&id).await,
            Err(LedgerError::PayoutChannelNotConnected(_))
        ));
        assert_eq!(
            flow.engine().account(&id).await.unwrap().pending_earnings,
            Money::from_minor(6_000)
        );
    }

    #[tokio::test]
    async fn test_channel_failure_restores_pending() {
        let flow = workflow(ScriptedChannel::new(Script::Reject));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;

        let err = flow.request_payout(&id).await.unwrap_err();
        match err {
            LedgerError::PayoutChannel { reason, .. } => assert!(reason.contains("account closed")),
            other => panic!("unexpected error {other:?}"),
        }

        let account = flow.engine().account(&id).await.unwrap();
        assert_eq!(account.pending_earnings, Money::from_minor(6_000));
        assert_eq!(account.paid_earnings, Money::ZERO);

        let payouts = flow.engine().payouts(&id).await.unwrap();
        assert_eq!(payouts[0].status, PayoutStatus::Failed);
        assert_eq!(payouts[0].failure_reason.as_deref(), Some("rejected: account closed"));
        flow.engine().audit(&id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_timeout_leaves_payout_in_flight() {
        let flow = workflow(ScriptedChannel::new(Script::Hang));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;

        let outcome = flow.request_payout(&id).await.unwrap();
        let request_id = match &outcome {
            PayoutOutcome::InFlight { request_id, amount } => {
                assert_eq!(*amount, Money::from_minor(6_000));
                request_id.clone()
            }
            other => panic!("unexpected outcome {other:?}"),
        };

        let summary = flow.engine().summary(&id).await.unwrap();
        assert_eq!(summary.in_flight_payouts, 1);
        assert_eq!(summary.account.pending_earnings, Money::ZERO);

        // Nothing more to pay while the first payout is unresolved
        assert!(matches!(
            flow.request_payout(&id).await,
            Err(LedgerError::InsufficientBalance { .. })
        ));

        let record = flow
            .resolve_payout(
                &id,
                &request_id,
                PayoutResolution::Failed {
                    reason: "bank timeout".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(record.status, PayoutStatus::Failed);
        assert_eq!(
            flow.engine().account(&id).await.unwrap().pending_earnings,
            Money::from_minor(6_000)
        );

        // Resolved payouts cannot be resolved again
        assert!(matches!(
            flow.resolve_payout(
                &id,
                &request_id,
                PayoutResolution::Completed {
                    reference: "late".into()
                }
            )
            .await,
            Err(LedgerError::PayoutNotInFlight(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_payout_resolved_as_completed() {
        let flow = workflow(ScriptedChannel::new(Script::Hang));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;
        let outcome = flow.request_payout(&id).await.unwrap();

        let record = flow
            .resolve_payout(
                &id,
                outcome.request_id(),
                PayoutResolution::Completed {
                    reference: "tr_late".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(record.status, PayoutStatus::Completed);
        assert_eq!(record.reference.as_deref(), Some("tr_late"));

        let account = flow.engine().account(&id).await.unwrap();
        assert_eq!(account.paid_earnings, Money::from_minor(6_000));
        assert_eq!(flow.engine().summary(&id).await.unwrap().in_flight_payouts, 0);
    }

    #[tokio::test]
    async fn test_resolve_unknown_payout() {
        let flow = workflow(ScriptedChannel::new(Script::Accept));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;
        assert!(matches!(
            flow.resolve_payout(
                &id,
                &PayoutRequestId::generate(),
                PayoutResolution::Completed {
                    reference: "x".into()
                }
            )
            .await,
            Err(LedgerError::PayoutNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_payouts_pay_once() {
        let channel = ScriptedChannel::new(Script::Accept);
        let flow = Arc::new(workflow(channel.clone()));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;

        let a = {
            let flow = Arc::clone(&flow);
            let id = id.clone();
            tokio::spawn(async move { flow.request_payout(&id).await })
        };
        let b = {
            let flow = Arc::clone(&flow);
            let id = id.clone();
            tokio::spawn(async move { flow.request_payout(&id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let paid = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientBalance { .. })))
            .count();
        assert_eq!((paid, refused), (1, 1));
        assert_eq!(channel.calls.load(Ordering::SeqCst), 1);

        let account = flow.engine().account(&id).await.unwrap();
        assert_eq!(account.paid_earnings, Money::from_minor(6_000));
        assert_eq!(account.pending_earnings, Money::ZERO);
    }

    #[tokio::test]
    async fn test_dispatching_payout_cannot_be_resolved_externally() {
        let channel = Arc::new(GatedChannel::default());
        let flow = Arc::new(workflow(channel.clone()));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;

        let request = {
            let flow = Arc::clone(&flow);
            let id = id.clone();
            tokio::spawn(async move { flow.request_payout(&id).await })
        };
        channel.entered.notified().await;

        let payouts = flow.engine().payouts(&id).await.unwrap();
        assert_eq!(payouts[0].status, PayoutStatus::Dispatching);
        assert_eq!(flow.engine().summary(&id).await.unwrap().in_flight_payouts, 1);

        let resolution = flow
            .resolve_payout(
                &id,
                &payouts[0].request_id,
                PayoutResolution::Failed {
                    reason: "operator gave up".into(),
                },
            )
            .await;
        assert!(matches!(resolution, Err(LedgerError::PayoutNotInFlight(_))));
        assert_eq!(
            flow.engine().account(&id).await.unwrap().pending_earnings,
            Money::ZERO
        );

        channel.release.notify_one();
        let outcome = request.await.unwrap().unwrap();
        match outcome {
            PayoutOutcome::Completed { reference, amount, .. } => {
                assert_eq!(reference, "tr_paid");
                assert_eq!(amount, Money::from_minor(6_000));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let account = flow.engine().account(&id).await.unwrap();
        assert_eq!(account.pending_earnings, Money::ZERO);
        assert_eq!(account.paid_earnings, Money::from_minor(6_000));
        assert_eq!(
            flow.engine().payouts(&id).await.unwrap()[0].status,
            PayoutStatus::Completed
        );
        flow.engine().audit(&id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_payout_is_parked_in_flight() {
        let flow = workflow(ScriptedChannel::new(Script::Hang));
        let id = funded(flow.engine(), Money::from_minor(6_000), true).await;

        flow.request_payout(&id).await.unwrap();
        let payouts = flow.engine().payouts(&id).await.unwrap();
        assert_eq!(payouts[0].status, PayoutStatus::InFlight);
    }

    #[tokio::test]
    async fn test_dispatching_payout_recovered_as_in_flight_on_reopen() {
        let store: Arc<dyn AccountStore> = Arc::new(InMemoryStore::new());
        let (id, request_id) = {
            let engine = LedgerEngine::open(CommissionPolicy::default(), Arc::clone(&store))
                .await
                .unwrap();
            let id = funded(&engine, Money::from_minor(6_000), true).await;
            // Crash between the debit and the channel answer
            let instruction = engine
                .begin_payout(&id, PayoutRequestId::generate())
                .await
                .unwrap();
            (id, instruction.request_id)
        };

        let engine = Arc::new(
            LedgerEngine::open(CommissionPolicy::default(), Arc::clone(&store))
                .await
                .unwrap(),
        );
        let payouts = engine.payouts(&id).await.unwrap();
        assert_eq!(payouts[0].status, PayoutStatus::InFlight);

        let persisted = store.load_all().await.unwrap();
        assert_eq!(persisted[0].payouts[0].status, PayoutStatus::InFlight);

        let flow = PayoutWorkflow::new(
            engine,
            ScriptedChannel::new(Script::Accept),
            &PayoutConfig::default(),
        );
        flow.resolve_payout(
            &id,
            &request_id,
            PayoutResolution::Failed {
                reason: "never sent".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            flow.engine().account(&id).await.unwrap().pending_earnings,
            Money::from_minor(6_000)
        );
    }

    #[derive(Debug, Clone)]
    enum PayoutOp {
        Earn { referral: u8, cents: u32 },
        Cancel(u8),
        /// Index into accepting, rejecting and hanging channels
        Payout(u8),
        Resolve { pick: usize, complete: bool },
        ClosePeriod,
    }

    fn payout_ops() -> impl Strategy<Value = Vec<PayoutOp>> {
        proptest::collection::vec(
            prop_oneof![
                3 => (0u8..4, 0u32..40_000)
                    .prop_map(|(referral, cents)| PayoutOp::Earn { referral, cents }),
                1 => (0u8..4).prop_map(PayoutOp::Cancel),
                2 => (0u8..3).prop_map(PayoutOp::Payout),
                2 => (any::<usize>(), any::<bool>())
                    .prop_map(|(pick, complete)| PayoutOp::Resolve { pick, complete }),
                1 => Just(PayoutOp::ClosePeriod),
            ],
            0..40,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn property_payouts_conserve_balances(ops in payout_ops()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let engine = Arc::new(LedgerEngine::new(CommissionPolicy::default()).unwrap());
                let id = engine.open_account("prop").await.unwrap().id;
                for r in 0..4 {
                    engine
                        .record_registration(&id, ReferralId::new(format!("r{r}")), ReferralProfile::default())
                        .await
                        .unwrap();
                }
                engine.connect_payout_channel(&id, "acct_prop").await.unwrap();

                let config = PayoutConfig { channel_timeout_ms: 1_000 };
                let flows = [Script::Accept, Script::Reject, Script::Hang]
                    .map(|script| PayoutWorkflow::new(Arc::clone(&engine), ScriptedChannel::new(script), &config));

                for (n, op) in ops.into_iter().enumerate() {
                    match op {
                        PayoutOp::Earn { referral, cents } => {
                            engine
                                .record_subscription(&id, SubscriptionEvent {
                                    referral_id: ReferralId::new(format!("r{referral}")),
                                    plan: Plan::Pro,
                                    amount: Money::from_minor(u64::from(cents)),
                                    event_id: EventId::new(format!("e{n}")),
                                })
                                .await
                                .unwrap();
                        }
                        PayoutOp::Cancel(r) => {
                            engine
                                .record_cancellation(&id, &ReferralId::new(format!("r{r}")))
                                .await
                                .unwrap();
                        }
                        PayoutOp::Payout(k) => {
                            let _ = flows[usize::from(k) % flows.len()].request_payout(&id).await;
                        }
                        PayoutOp::Resolve { pick, complete } => {
                            let parked: Vec<_> = engine
                                .payouts(&id)
                                .await
                                .unwrap()
                                .into_iter()
                                .filter(|p| p.status == PayoutStatus::InFlight)
                                .collect();
                            if !parked.is_empty() {
                                let target = &parked[pick % parked.len()];
                                let resolution = if complete {
                                    PayoutResolution::Completed { reference: format!("late_{n}") }
                                } else {
                                    PayoutResolution::Failed { reason: "bounced".into() }
                                };
                                flows[0]
                                    .resolve_payout(&id, &target.request_id, resolution)
                                    .await
                                    .unwrap();
                            }
                        }
                        PayoutOp::ClosePeriod => {
                            engine.close_billing_period(&id).await.unwrap();
                        }
                    }

                    engine.audit(&id).await.expect("conservation");

                    let account = engine.account(&id).await.unwrap();
                    let payouts = engine.payouts(&id).await.unwrap();
                    assert!(payouts.iter().all(|p| p.status != PayoutStatus::Dispatching));
                    let debited = payouts
                        .iter()
                        .filter(|p| matches!(p.status, PayoutStatus::Completed | PayoutStatus::InFlight))
                        .fold(Money::ZERO, |acc, p| acc.checked_add(p.amount).unwrap());
                    assert_eq!(account.paid_earnings, debited);
                }
            });
        }
    }
}
