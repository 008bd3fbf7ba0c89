//! Commission ledger service
//!
//! In-process store for issued commission records: status transitions and
//! read-only reporting queries. Persistence proper belongs to the caller.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
    CommissionId, CommissionPlan, CommissionRecord, CommissionStatus, DomainError, DomainResult,
    PartnerId,
};

/// Aggregate for one structural level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub count: usize,
    pub total: Decimal,
    pub rate: Decimal,
}

/// Commission totals for one partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommissionSummary {
    pub partner_id: PartnerId,
    pub total_commissions: Decimal,
    pub pending: Decimal,
    pub approved: Decimal,
    pub paid: Decimal,
    pub cancelled: Decimal,
    pub by_level: BTreeMap<u8, LevelSummary>,
    pub commission_count: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<CommissionRecord>,
    by_id: HashMap<CommissionId, usize>,
}

/// Store of commission records.
#[derive(Debug)]
pub struct CommissionLedger {
    plan: CommissionPlan,
    state: RwLock<LedgerState>,
}

impl Default for CommissionLedger {
    fn default() -> Self {
        Self::new(CommissionPlan::default())
    }
}

fn within(ts: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e)
}

impl CommissionLedger {
    /// Create a ledger; the plan supplies the rates reported in summaries.
    pub fn new(plan: CommissionPlan) -> Self {
        Self {
            plan,
            state: RwLock::new(LedgerState::default()),
        }
    }

    // Records are plain data, a panic elsewhere cannot leave them half-written.
    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store freshly calculated records. Records whose id is already present are ignored.
    pub fn record(&self, records: impl IntoIterator<Item = CommissionRecord>) -> usize {
        let mut state = self.write();
        let mut stored = 0;
        for record in records {
            if state.by_id.contains_key(&record.commission_id) {
                warn!("commission {} already recorded", record.commission_id);
                continue;
            }
            let pos = state.records.len();
            state.by_id.insert(record.commission_id, pos);
            state.records.push(record);
            stored += 1;
        }
        debug!("record: stored {} commissions", stored);
        stored
    }

    pub fn get(&self, commission_id: CommissionId) -> Option<CommissionRecord> {
        let state = self.read();
        state
            .by_id
            .get(&commission_id)
            .map(|&pos| state.records[pos].clone())
    }

    pub fn records(&self) -> Vec<CommissionRecord> {
        self.read().records.clone()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    /// Largest commission id stored, for resuming id assignment.
    pub fn max_commission_id(&self) -> Option<CommissionId> {
        self.read().by_id.keys().max().copied()
    }

    // ============================================================
    // Status management
    // ============================================================

    fn try_transition(
        &self,
        commission_id: CommissionId,
        target: CommissionStatus,
        note: Option<&str>,
    ) -> DomainResult<()> {
        let mut state = self.write();
        let pos = *state
            .by_id
            .get(&commission_id)
            .ok_or(DomainError::CommissionNotFound(commission_id))?;
        let record = &mut state.records[pos];
        record.status = record.status.transition(target)?;
        if let Some(note) = note {
            record.notes = Some(match record.notes.take() {
                Some(existing) => format!("{}; {}", existing, note),
                None => note.to_string(),
            });
        }
        Ok(())
    }

    fn transition(&self, commission_id: CommissionId, target: CommissionStatus, note: Option<&str>) -> bool {
        match self.try_transition(commission_id, target, note) {
            Ok(()) => {
                info!("commission {} {}", commission_id, target);
                true
            }
            Err(e) => {
                warn!("commission {}: {}", commission_id, e);
                false
            }
        }
    }

    /// Approve a pending commission for payment.
    pub fn approve_commission(&self, commission_id: CommissionId) -> bool {
        self.transition(commission_id, CommissionStatus::Approved, None)
    }

    /// Mark a pending or approved commission as paid.
    pub fn mark_as_paid(&self, commission_id: CommissionId) -> bool {
        self.transition(commission_id, CommissionStatus::Paid, None)
    }

    /// Cancel a commission that has not been paid yet.
    pub fn cancel_commission(&self, commission_id: CommissionId, reason: &str) -> bool {
        let note = format!("cancelled: {}", reason);
        self.transition(commission_id, CommissionStatus::Cancelled, Some(&note))
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Sum of a partner's commissions, optionally within `[start, end]` and of one status.
    pub fn get_total_commissions(
        &self,
        partner_id: PartnerId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        status: Option<CommissionStatus>,
    ) -> Decimal {
        self.read()
            .records
            .iter()
            .filter(|c| c.partner_id == partner_id)
            .filter(|c| within(c.timestamp, start, end))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .map(|c| c.amount)
            .sum()
    }

    pub fn get_commissions_by_level(&self, partner_id: PartnerId, level: u8) -> Vec<CommissionRecord> {
        self.read()
            .records
            .iter()
            .filter(|c| c.partner_id == partner_id && c.level == level)
            .cloned()
            .collect()
    }

    /// Totals by status and by level for a partner.
    pub fn get_commission_summary(
        &self,
        partner_id: PartnerId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CommissionSummary {
        let state = self.read();
        let filtered: Vec<&CommissionRecord> = state
            .records
            .iter()
            .filter(|c| c.partner_id == partner_id && within(c.timestamp, start, end))
            .collect();

        let sum_status = |status: CommissionStatus| -> Decimal {
            filtered
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.amount)
                .sum()
        };

        let mut by_level: BTreeMap<u8, LevelSummary> = BTreeMap::new();
        for c in &filtered {
            let entry = by_level.entry(c.level).or_insert_with(|| LevelSummary {
                count: 0,
                total: Decimal::ZERO,
                rate: self.plan.rate_for(c.level).unwrap_or(Decimal::ZERO),
            });
            entry.count += 1;
            entry.total += c.amount;
        }

        CommissionSummary {
            partner_id,
            total_commissions: filtered.iter().map(|c| c.amount).sum(),
            pending: sum_status(CommissionStatus::Pending),
            approved: sum_status(CommissionStatus::Approved),
            paid: sum_status(CommissionStatus::Paid),
            cancelled: sum_status(CommissionStatus::Cancelled),
            by_level,
            commission_count: filtered.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommissionCalculator, UplineChainEntry};

    fn ledger_with_one_purchase() -> CommissionLedger {
        let calc = CommissionCalculator::default();
        let chain = [1, 2].map(UplineChainEntry::active);
        let ledger = CommissionLedger::default();
        ledger.record(calc.calculate_purchase_commissions(Decimal::from(100), 9, &chain));
        ledger
    }

    #[test]
    fn test_record_ignores_duplicate_ids() {
        let ledger = ledger_with_one_purchase();
        let again = ledger.records();
        assert_eq!(ledger.record(again), 0);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.max_commission_id(), Some(2));
    }

    #[test]
    fn test_paid_is_terminal() {
        let ledger = ledger_with_one_purchase();
        assert!(ledger.mark_as_paid(1));
        assert!(!ledger.approve_commission(1));
        assert!(!ledger.cancel_commission(1, "late"));
        assert_eq!(ledger.get(1).unwrap().status, CommissionStatus::Paid);
    }

    #[test]
    fn test_cancel_appends_reason() {
        let ledger = ledger_with_one_purchase();
        assert!(ledger.cancel_commission(2, "refund"));
        let record = ledger.get(2).unwrap();
        assert_eq!(record.status, CommissionStatus::Cancelled);
        assert_eq!(record.notes.as_deref(), Some("cancelled: refund"));
    }
}
