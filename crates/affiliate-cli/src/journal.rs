//! JSON-lines event journal.
//!
//! One event per line, tagged by `type`. Accounts are addressed by referral
//! code, amounts are decimal strings and plans are plan names, matching what
//! the billing and signup systems emit. Blank lines and lines starting with
//! `#` are skipped.
//!
//! ```text
//! {"type":"open_account","owner":"alice","code":"ABC123"}
//! {"type":"registration","code":"ABC123","referral":"R1","name":"Bob"}
//! {"type":"subscription","code":"ABC123","referral":"R1","plan":"pro","amount":"20.00","event_id":"evt_1"}
//! ```

use std::sync::Arc;

use affiliate_ledger::{LedgerEngine, PayoutWorkflow, SubscriptionEvent};
use affiliate_types::{AccountId, EventId, Money, Plan, ReferralCode, ReferralId, ReferralProfile};
use anyhow::{bail, Context};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEntry {
    OpenAccount {
        owner: String,
        /// Generated when absent
        #[serde(default)]
        code: Option<String>,
    },
    Click {
        code: String,
    },
    Registration {
        code: String,
        referral: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
    },
    Subscription {
        code: String,
        referral: String,
        plan: String,
        amount: String,
        event_id: String,
    },
    Cancellation {
        code: String,
        referral: String,
    },
    Connect {
        code: String,
        destination: String,
    },
    Payout {
        code: String,
    },
    ClosePeriod {
        code: String,
    },
}

/// Parse one journal line; `None` for blank and comment lines.
pub fn parse_line(line: &str) -> anyhow::Result<Option<JournalEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub applied: usize,
    /// Events the ledger refused (insufficient balance, unknown referral...)
    pub rejected: usize,
}

pub struct Replayer {
    engine: Arc<LedgerEngine>,
    payouts: PayoutWorkflow,
}

impl Replayer {
    pub fn new(payouts: PayoutWorkflow) -> Self {
        Self {
            engine: Arc::clone(payouts.engine()),
            payouts,
        }
    }

    /// Apply every entry from `reader` in order.
    ///
    /// Malformed lines always abort. Ledger rejections are counted and
    /// logged, or abort when `strict` is set.
    pub async fn replay<R>(&self, reader: R, strict: bool) -> anyhow::Result<ReplayReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut report = ReplayReport::default();
        let mut number = 0usize;

        while let Some(line) = lines.next_line().await? {
            number += 1;
            let Some(entry) = parse_line(&line).with_context(|| format!("line {number}"))? else {
                continue;
            };

            match self.apply(&entry).await {
                Ok(()) => report.applied += 1,
                Err(e) if strict => return Err(e.context(format!("line {number}"))),
                Err(e) => {
                    warn!(line = number, error = %format!("{e:#}"), "Journal entry rejected");
                    report.rejected += 1;
                }
            }
        }

        info!(applied = report.applied, rejected = report.rejected, "Journal replayed");
        Ok(report)
    }

    pub async fn apply(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        let engine = &self.engine;

        match entry {
            JournalEntry::OpenAccount { owner, code } => {
                match code {
                    Some(code) => engine.open_account_with_code(owner.clone(), code.parse()?).await?,
                    None => engine.open_account(owner.clone()).await?,
                };
            }
            JournalEntry::Click { code } => {
                engine.record_click(&self.resolve(code).await?).await?;
            }
            JournalEntry::Registration {
                code,
                referral,
                name,
                email,
            } => {
                let profile = ReferralProfile {
                    display_name: name.clone().unwrap_or_else(|| referral.clone()),
                    email: email.clone(),
                };
                engine
                    .record_registration(&self.resolve(code).await?, ReferralId::new(referral), profile)
                    .await?;
            }
            JournalEntry::Subscription {
                code,
                referral,
                plan,
                amount,
                event_id,
            } => {
                let event = SubscriptionEvent {
                    referral_id: ReferralId::new(referral),
                    plan: plan.parse::<Plan>()?,
                    amount: amount.parse::<Money>()?,
                    event_id: EventId::new(event_id),
                };
                engine
                    .record_subscription(&self.resolve(code).await?, event)
                    .await?;
            }
            JournalEntry::Cancellation { code, referral } => {
                engine
                    .record_cancellation(&self.resolve(code).await?, &ReferralId::new(referral))
                    .await?;
            }
            JournalEntry::Connect { code, destination } => {
                engine
                    .connect_payout_channel(&self.resolve(code).await?, destination.clone())
                    .await?;
            }
            JournalEntry::Payout { code } => {
                let outcome = self.payouts.request_payout(&self.resolve(code).await?).await?;
                info!(payout = %outcome.request_id(), amount = %outcome.amount(), "Payout requested");
            }
            JournalEntry::ClosePeriod { code } => {
                engine.close_billing_period(&self.resolve(code).await?).await?;
            }
        }
        Ok(())
    }

    async fn resolve(&self, code: &str) -> anyhow::Result<AccountId> {
        let code: ReferralCode = code.parse()?;
        Ok(self.engine.account_by_code(&code).await?.id)
    }
}

/// Check that a file looks like a journal before touching the ledger.
pub fn validate(contents: &str) -> anyhow::Result<usize> {
    let mut entries = 0;
    for (index, line) in contents.lines().enumerate() {
        if parse_line(line)
            .with_context(|| format!("line {}", index + 1))?
            .is_some()
        {
            entries += 1;
        }
    }
    if entries == 0 {
        bail!("journal contains no entries");
    }
    Ok(entries)
}
