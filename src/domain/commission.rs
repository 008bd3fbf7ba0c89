//! Tiered commission distribution with per-transaction compression.
//!
//! Structural levels `1..=max_levels` are filled from an upline chain
//! snapshot. An inactive partner never receives a payout; its level goes
//! to the next active partner further up the chain, who receives it at
//! the level being filled. Levels that find no active partner are dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::{
    CommissionId, CommissionRecord, CommissionStatus, PartnerId, UplineChainEntry,
};

/// Default number of structural levels paid per purchase.
pub const MAX_LEVELS: usize = 5;

/// Fractional digits used when amounts leave the engine.
pub const DISPLAY_DECIMAL_PLACES: u32 = 2;

pub const COMPRESSED_NOTE: &str = "compressed upward";

/// Round an amount for reporting: 2 digits, ties to even.
pub fn round_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DISPLAY_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven)
}

/// Commission plan: how many levels are paid and at which percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionPlan {
    pub max_levels: u8,
    /// Percentage per structural level
    pub rates: BTreeMap<u8, Decimal>,
}

impl Default for CommissionPlan {
    fn default() -> Self {
        let rates = [(1, 20), (2, 10), (3, 5), (4, 5), (5, 5)]
            .into_iter()
            .map(|(level, pct)| (level, Decimal::from(pct)))
            .collect();
        Self {
            max_levels: MAX_LEVELS as u8,
            rates,
        }
    }
}

impl CommissionPlan {
    pub fn new(max_levels: u8, rates: BTreeMap<u8, Decimal>) -> DomainResult<Self> {
        let plan = Self { max_levels, rates };
        plan.validate()?;
        Ok(plan)
    }

    pub fn rate_for(&self, level: u8) -> Option<Decimal> {
        self.rates.get(&level).copied()
    }

    /// Sum of the rates of all payable levels.
    pub fn total_rate(&self) -> Decimal {
        self.rates
            .iter()
            .filter(|(level, _)| (1..=self.max_levels).contains(*level))
            .map(|(_, rate)| *rate)
            .sum()
    }

    pub fn validate(&self) -> DomainResult<()> {
        let invalid = |message: String| Err(DomainError::InvalidPlan { message });

        if self.max_levels == 0 {
            return invalid("max_levels must be at least 1".into());
        }
        for (&level, &rate) in &self.rates {
            if level == 0 || level > self.max_levels {
                return invalid(format!(
                    "rate for level {} outside 1..={}",
                    level, self.max_levels
                ));
            }
            if rate.is_sign_negative() {
                return invalid(format!("negative rate {} for level {}", rate, level));
            }
        }
        if self.total_rate() > Decimal::ONE_HUNDRED {
            return invalid(format!("total rate {} exceeds 100", self.total_rate()));
        }
        Ok(())
    }
}

/// A purchase with the upline chain snapshot taken for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEvent {
    pub buyer: PartnerId,
    pub amount: Decimal,
    pub chain: Vec<UplineChainEntry>,
}

/// Turns purchases into commission records.
///
/// Holds no partner state; only the id counter is shared, and it is atomic,
/// so one calculator can serve many threads.
#[derive(Debug)]
pub struct CommissionCalculator {
    plan: CommissionPlan,
    next_commission_id: AtomicU64,
}

impl Default for CommissionCalculator {
    fn default() -> Self {
        Self::new(CommissionPlan::default())
    }
}

impl CommissionCalculator {
    pub fn new(plan: CommissionPlan) -> Self {
        Self::with_next_id(plan, 1)
    }

    /// Resume id assignment at `next_id`, e.g. after loading persisted records.
    pub fn with_next_id(plan: CommissionPlan, next_id: CommissionId) -> Self {
        Self {
            plan,
            next_commission_id: AtomicU64::new(next_id),
        }
    }

    pub fn plan(&self) -> &CommissionPlan {
        &self.plan
    }

    /// Calculate commissions for one purchase, stamped with the current time.
    pub fn calculate_purchase_commissions(
        &self,
        purchase_amount: Decimal,
        buying_partner_id: PartnerId,
        upline_chain: &[UplineChainEntry],
    ) -> Vec<CommissionRecord> {
        self.calculate_at(purchase_amount, buying_partner_id, upline_chain, Utc::now())
    }

    /// Calculate commissions for one purchase with an explicit timestamp.
    pub fn calculate_at(
        &self,
        purchase_amount: Decimal,
        buying_partner_id: PartnerId,
        upline_chain: &[UplineChainEntry],
        timestamp: DateTime<Utc>,
    ) -> Vec<CommissionRecord> {
        info!(
            "purchase commissions: amount={}, buyer={}, chain={}",
            purchase_amount,
            buying_partner_id,
            upline_chain.len()
        );
        if purchase_amount <= Decimal::ZERO {
            warn!(
                "purchase amount {} for buyer {} is not positive, no commissions",
                purchase_amount, buying_partner_id
            );
            return Vec::new();
        }

        let mut calculated = Vec::new();
        let mut chain_index = 0;

        for structural_level in 1..=self.plan.max_levels {
            if chain_index >= upline_chain.len() {
                break;
            }
            let entry = upline_chain[chain_index];
            chain_index += 1;

            let payee = if entry.is_active {
                Some((entry.partner_id, false))
            } else {
                debug!(
                    "level {}: partner {} is inactive, compressing upward",
                    structural_level, entry.partner_id
                );
                let found = upline_chain[chain_index..]
                    .iter()
                    .position(|e| e.is_active);
                match found {
                    Some(offset) => {
                        let next = upline_chain[chain_index + offset];
                        chain_index += offset + 1;
                        Some((next.partner_id, true))
                    }
                    None => {
                        chain_index = upline_chain.len();
                        info!(
                            "level {}: no active upline left after compression, commission not issued",
                            structural_level
                        );
                        None
                    }
                }
            };

            if let Some((partner_id, compressed)) = payee {
                if let Some(record) = self.make_record(
                    purchase_amount,
                    partner_id,
                    buying_partner_id,
                    structural_level,
                    compressed,
                    timestamp,
                ) {
                    calculated.push(record);
                }
            }
        }

        calculated
    }

    /// Calculate many purchases in parallel; output order follows input order.
    pub fn calculate_batch(
        &self,
        purchases: &[PurchaseEvent],
        timestamp: DateTime<Utc>,
    ) -> Vec<Vec<CommissionRecord>> {
        purchases
            .par_iter()
            .map(|p| self.calculate_at(p.amount, p.buyer, &p.chain, timestamp))
            .collect()
    }

    fn make_record(
        &self,
        base: Decimal,
        partner_id: PartnerId,
        source_partner_id: PartnerId,
        level: u8,
        compressed: bool,
        timestamp: DateTime<Utc>,
    ) -> Option<CommissionRecord> {
        let Some(rate) = self.plan.rate_for(level) else {
            warn!("no commission rate for level {}, level skipped", level);
            return None;
        };
        let Some(amount) = (rate / Decimal::ONE_HUNDRED).checked_mul(base) else {
            warn!(
                "level {}: commission on {} at {}% overflows, level skipped",
                level, base, rate
            );
            return None;
        };
        let commission_id = self.next_commission_id.fetch_add(1, Ordering::Relaxed);

        info!(
            "level {}: partner {} earns {} ({}%){}",
            level,
            partner_id,
            round_for_display(amount),
            rate,
            if compressed { " [compressed]" } else { "" }
        );

        Some(CommissionRecord {
            commission_id,
            partner_id,
            source_partner_id,
            level,
            amount,
            base_amount: base,
            rate,
            timestamp,
            status: CommissionStatus::Pending,
            compressed,
            notes: compressed.then(|| COMPRESSED_NOTE.to_string()),
        })
    }
}
