//! Purchase processing service
//!
//! Per purchase: snapshot the upline chain under the network read lock,
//! release it, calculate commissions without locking, then store records
//! and bump partner totals.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::services::ledger::CommissionLedger;
use crate::application::services::partner::{read_network, PartnerManager, SharedNetwork};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    CommissionCalculator, CommissionRecord, DomainError, PartnerId, PurchaseEvent,
    UplineChainEntry,
};
use crate::infrastructure::traits::Clock;

/// Result of processing one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOutcome {
    pub buyer: PartnerId,
    pub amount: Decimal,
    pub chain: Vec<UplineChainEntry>,
    pub commissions: Vec<CommissionRecord>,
}

impl PurchaseOutcome {
    pub fn total_paid(&self) -> Decimal {
        self.commissions.iter().map(|c| c.amount).sum()
    }
}

/// Orchestrates network snapshot, calculation and bookkeeping.
pub struct PurchaseService {
    network: SharedNetwork,
    calculator: Arc<CommissionCalculator>,
    ledger: Arc<CommissionLedger>,
    partners: Arc<PartnerManager>,
    clock: Arc<dyn Clock>,
}

impl PurchaseService {
    pub fn new(
        network: SharedNetwork,
        calculator: Arc<CommissionCalculator>,
        ledger: Arc<CommissionLedger>,
        partners: Arc<PartnerManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            network,
            calculator,
            ledger,
            partners,
            clock,
        }
    }

    fn validate(buyer: PartnerId, amount: Decimal) -> ApplicationResult<()> {
        if amount <= Decimal::ZERO {
            return Err(ApplicationError::InvalidPurchase { buyer, amount });
        }
        Ok(())
    }

    /// Point-in-time chain snapshot for a buyer, extended past inactive
    /// partners until every payable level can be filled.
    pub fn snapshot_chain(&self, buyer: PartnerId) -> ApplicationResult<Vec<UplineChainEntry>> {
        let network = read_network(&self.network)?;
        if !network.contains(buyer) {
            return Err(DomainError::PartnerNotFound(buyer).into());
        }
        let levels = usize::from(self.calculator.plan().max_levels);
        Ok(network.get_payout_chain(buyer, levels))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn process_purchase(
        &self,
        buyer: PartnerId,
        amount: Decimal,
    ) -> ApplicationResult<PurchaseOutcome> {
        Self::validate(buyer, amount)?;
        let chain = self.snapshot_chain(buyer)?;

        let commissions = self
            .calculator
            .calculate_at(amount, buyer, &chain, self.clock.now());
        self.book(buyer, amount, &commissions);

        Ok(PurchaseOutcome {
            buyer,
            amount,
            chain,
            commissions,
        })
    }

    /// Process several purchases; chains come from one consistent snapshot
    /// and calculation runs in parallel.
    pub fn process_batch(
        &self,
        purchases: &[(PartnerId, Decimal)],
    ) -> ApplicationResult<Vec<PurchaseOutcome>> {
        let events: Vec<PurchaseEvent> = {
            let network = read_network(&self.network)?;
            let levels = usize::from(self.calculator.plan().max_levels);
            purchases
                .iter()
                .map(|&(buyer, amount)| -> ApplicationResult<PurchaseEvent> {
                    Self::validate(buyer, amount)?;
                    if !network.contains(buyer) {
                        return Err(DomainError::PartnerNotFound(buyer).into());
                    }
                    Ok(PurchaseEvent {
                        buyer,
                        amount,
                        chain: network.get_payout_chain(buyer, levels),
                    })
                })
                .collect::<ApplicationResult<Vec<_>>>()?
        };

        let results = self.calculator.calculate_batch(&events, self.clock.now());
        debug!("process_batch: calculated {} purchases", results.len());

        Ok(events
            .into_iter()
            .zip(results)
            .map(|(event, commissions)| {
                self.book(event.buyer, event.amount, &commissions);
                PurchaseOutcome {
                    buyer: event.buyer,
                    amount: event.amount,
                    chain: event.chain,
                    commissions,
                }
            })
            .collect())
    }

    fn book(&self, buyer: PartnerId, amount: Decimal, commissions: &[CommissionRecord]) {
        self.ledger.record(commissions.iter().cloned());
        self.partners.add_procurement_volume(buyer, amount);
        self.partners.record_activity(buyer);
        for c in commissions {
            self.partners.add_commission_earned(c.partner_id, c.amount);
        }
    }
}
