//! Commission policy: pure rate lookup and commission calculation.

use std::collections::BTreeMap;

use affiliate_types::{Money, Plan, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Tiered-rate-plus-bonus commission rules.
///
/// Rates are basis points of the subscription amount; thresholds and the
/// payout minimum are minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionPolicy {
    /// Base rate per sellable plan. A plan missing here is unknown.
    #[serde(default = "default_base_rates")]
    pub base_rates_bps: BTreeMap<Plan, u32>,

    /// Added to the base rate while the volume bonus is active
    #[serde(default = "default_volume_bonus_bps")]
    pub volume_bonus_bps: u32,

    /// Active referrals required to activate the volume bonus
    #[serde(default = "default_volume_bonus_threshold")]
    pub volume_bonus_threshold: usize,

    /// Monthly earnings required for partner status
    #[serde(default = "default_partner_threshold")]
    pub partner_threshold: Money,

    /// Smallest pending balance eligible for payout
    #[serde(default = "default_minimum_payout")]
    pub minimum_payout: Money,
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self {
            base_rates_bps: default_base_rates(),
            volume_bonus_bps: default_volume_bonus_bps(),
            volume_bonus_threshold: default_volume_bonus_threshold(),
            partner_threshold: default_partner_threshold(),
            minimum_payout: default_minimum_payout(),
        }
    }
}

fn default_base_rates() -> BTreeMap<Plan, u32> {
    BTreeMap::from([(Plan::Basic, 0), (Plan::Pro, 3_000), (Plan::Business, 2_500)])
}

fn default_volume_bonus_bps() -> u32 {
    500
}

fn default_volume_bonus_threshold() -> usize {
    10
}

fn default_partner_threshold() -> Money {
    Money::from_minor(100_000)
}

fn default_minimum_payout() -> Money {
    Money::from_minor(5_000)
}

impl CommissionPolicy {
    /// Check that every configured rate, bonus included, stays within 100%.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.base_rates_bps.contains_key(&Plan::None) {
            return Err(LedgerError::InvalidPolicy(
                "plan `none` cannot carry a commission rate".into(),
            ));
        }
        for (plan, base) in &self.base_rates_bps {
            let combined = base.saturating_add(self.volume_bonus_bps);
            if combined > BPS_DENOMINATOR {
                return Err(LedgerError::InvalidPolicy(format!(
                    "rate for {plan} with bonus is {combined} bps, above {BPS_DENOMINATOR}"
                )));
            }
        }
        Ok(())
    }

    /// Effective rate for a plan, in basis points.
    pub fn rate_bps(&self, plan: Plan, volume_bonus_active: bool) -> LedgerResult<u32> {
        let base = self
            .base_rates_bps
            .get(&plan)
            .copied()
            .ok_or(LedgerError::UnknownPlan(plan))?;
        let bonus = if volume_bonus_active {
            self.volume_bonus_bps
        } else {
            0
        };
        Ok(base.saturating_add(bonus))
    }

    /// `amount * (base_rate[plan] + bonus)`, rounded half to even.
    pub fn commission(
        &self,
        plan: Plan,
        amount: Money,
        volume_bonus_active: bool,
    ) -> LedgerResult<Money> {
        let rate = self.rate_bps(plan, volume_bonus_active)?;
        amount
            .apply_rate_bps(rate)
            .ok_or(LedgerError::Overflow("commission"))
    }

    pub fn volume_bonus_earned(&self, active_referrals: usize) -> bool {
        active_referrals >= self.volume_bonus_threshold
    }

    pub fn partner_earned(&self, monthly_earnings: Money) -> bool {
        monthly_earnings >= self.partner_threshold
    }
}
