//! Offline payout channel used during journal replay

use affiliate_ledger::{ChannelError, ChannelReceipt, PayoutChannel, PayoutInstruction};
use async_trait::async_trait;
use tracing::info;

/// Records disbursements in the log instead of moving money.
///
/// With `reject` set, every disbursement fails with that reason, which
/// exercises the compensating path.
#[derive(Debug, Default)]
pub struct DryRunChannel {
    reject: Option<String>,
}

impl DryRunChannel {
    pub fn new(reject: Option<String>) -> Self {
        Self { reject }
    }
}

#[async_trait]
impl PayoutChannel for DryRunChannel {
    async fn disburse(&self, instruction: &PayoutInstruction) -> Result<ChannelReceipt, ChannelError> {
        if let Some(reason) = &self.reject {
            return Err(ChannelError::Rejected(reason.clone()));
        }

        info!(
            payout = %instruction.request_id,
            amount = %instruction.amount,
            destination = %instruction.destination,
            "Dry-run disbursement"
        );
        Ok(ChannelReceipt {
            reference: format!("dry_{}", instruction.request_id.as_uuid().simple()),
        })
    }
}
