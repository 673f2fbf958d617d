//! Affiliate ledger command-line driver
//!
//! Replays JSON-lines event journals into the ledger and inspects the
//! resulting accounts. `show` and `audit` read whatever the configured store
//! holds, so they are only useful with `storage.type = "file"`.

use std::path::PathBuf;
use std::sync::Arc;

use affiliate_ledger::{init_tracing, storage, LedgerConfig, LedgerEngine, PayoutWorkflow};
use affiliate_types::ReferralCode;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::BufReader;
use tracing::{error, info};

mod channel;
mod journal;

use channel::DryRunChannel;
use journal::Replayer;

#[derive(Parser)]
#[command(name = "affiliate-ledger")]
#[command(about = "Affiliate commission ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AFFILIATE_CONFIG")]
    config: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSON-lines event journal
    Replay {
        /// Journal file
        journal: PathBuf,

        /// Stop at the first entry the ledger rejects
        #[arg(long)]
        strict: bool,

        /// Make the dry-run payout channel refuse every payout
        #[arg(long, value_name = "REASON")]
        reject_payouts: Option<String>,
    },

    /// Parse a journal without applying it
    Check {
        /// Journal file
        journal: PathBuf,
    },

    /// Print an account with its referrals and payouts
    Show {
        /// Referral code of the account
        #[arg(long)]
        code: ReferralCode,
    },

    /// Verify balance conservation for every stored account
    Audit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = LedgerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.verbose {
        config.logging.level = "debug".into();
    }
    config.logging.json |= cli.json;
    init_tracing(&config.logging).context("initializing logging")?;

    match cli.command {
        Commands::Check { journal } => {
            let contents = tokio::fs::read_to_string(&journal)
                .await
                .with_context(|| format!("reading {}", journal.display()))?;
            let entries = journal::validate(&contents)?;
            println!("{}: {entries} entries", journal.display());
        }
        Commands::Replay {
            journal,
            strict,
            reject_payouts,
        } => {
            let engine = open_engine(&config).await?;
            let workflow = PayoutWorkflow::new(
                Arc::clone(&engine),
                Arc::new(DryRunChannel::new(reject_payouts)),
                &config.payout,
            );

            let file = tokio::fs::File::open(&journal)
                .await
                .with_context(|| format!("opening {}", journal.display()))?;
            let report = Replayer::new(workflow)
                .replay(BufReader::new(file), strict)
                .await?;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "applied": report.applied,
                    "rejected": report.rejected,
                    "accounts": engine.account_ids().len(),
                }))?
            );
        }
        Commands::Show { code } => {
            let engine = open_engine(&config).await?;
            let account = engine.account_by_code(&code).await?;
            let summary = engine.summary(&account.id).await?;
            let referrals = engine.referrals(&account.id).await?;
            let payouts = engine.payouts(&account.id).await?;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "summary": summary,
                    "referrals": referrals,
                    "payouts": payouts,
                }))?
            );
        }
        Commands::Audit => {
            let engine = open_engine(&config).await?;
            let ids = engine.account_ids();
            let mut violations = 0usize;

            for id in &ids {
                if let Err(e) = engine.audit(id).await {
                    error!(account = %id, error = %e, "Audit failed");
                    violations += 1;
                }
            }

            if violations > 0 {
                bail!("{violations} of {} accounts failed the audit", ids.len());
            }
            println!("{} accounts audited, no violations", ids.len());
        }
    }

    Ok(())
}

async fn open_engine(config: &LedgerConfig) -> anyhow::Result<Arc<LedgerEngine>> {
    let store = storage::from_config(&config.storage)
        .await
        .context("opening account store")?;
    let engine = LedgerEngine::open(config.policy.clone(), store).await?;
    info!(storage = ?config.storage, "Ledger ready");
    Ok(Arc::new(engine))
}
