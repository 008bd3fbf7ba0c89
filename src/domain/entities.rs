//! Domain entities: core data structures

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Externally assigned, stable partner identifier.
pub type PartnerId = u64;

/// Monotonically assigned commission identifier.
pub type CommissionId = u64;

/// Read snapshot of one partner in the network forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerNode {
    pub partner_id: PartnerId,
    /// Direct sponsor, None for roots
    pub upline_id: Option<PartnerId>,
    pub is_active: bool,
    /// Direct children in insertion order
    pub downline_ids: Vec<PartnerId>,
}

/// One step of an upline chain, as consumed by the commission calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UplineChainEntry {
    pub partner_id: PartnerId,
    pub is_active: bool,
}

impl UplineChainEntry {
    pub fn new(partner_id: PartnerId, is_active: bool) -> Self {
        Self {
            partner_id,
            is_active,
        }
    }

    pub fn active(partner_id: PartnerId) -> Self {
        Self::new(partner_id, true)
    }

    pub fn inactive(partner_id: PartnerId) -> Self {
        Self::new(partner_id, false)
    }
}

impl From<(PartnerId, bool)> for UplineChainEntry {
    fn from((partner_id, is_active): (PartnerId, bool)) -> Self {
        Self::new(partner_id, is_active)
    }
}

/// Lifecycle of a commission record.
///
/// `Pending → Approved → Paid`, with `Pending → Paid` allowed directly.
/// `Cancelled` is reachable from `Pending` and `Approved`. `Paid` and
/// `Cancelled` are terminal and nothing ever returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    /// Check whether moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: CommissionStatus) -> bool {
        use CommissionStatus::*;
        match (self, target) {
            (Pending, Approved) | (Pending, Paid) | (Approved, Paid) => true,
            (Pending, Cancelled) | (Approved, Cancelled) => true,
            (Pending, Pending) | (Approved, Pending) | (Paid, Pending) | (Cancelled, Pending) => {
                false
            }
            (Approved, Approved) | (Paid, Approved) | (Cancelled, Approved) => false,
            (Paid, Paid) | (Cancelled, Paid) => false,
            (Paid, Cancelled) | (Cancelled, Cancelled) => false,
        }
    }

    /// Return the target status if the transition is allowed.
    pub fn transition(self, target: CommissionStatus) -> DomainResult<CommissionStatus> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One commission paid to one beneficiary for one structural level of one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub commission_id: CommissionId,
    /// Beneficiary
    pub partner_id: PartnerId,
    /// Buyer whose purchase generated this commission
    pub source_partner_id: PartnerId,
    /// Structural level (1..=max_levels), not necessarily graph depth
    pub level: u8,
    pub amount: Decimal,
    pub base_amount: Decimal,
    /// Percentage applied to `base_amount`
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: CommissionStatus,
    /// True if the beneficiary got this level through chain compression
    pub compressed: bool,
    pub notes: Option<String>,
}

impl CommissionRecord {
    /// Compare two records ignoring identity and creation time.
    pub fn same_payout(&self, other: &CommissionRecord) -> bool {
        self.partner_id == other.partner_id
            && self.source_partner_id == other.source_partner_id
            && self.level == other.level
            && self.amount == other.amount
            && self.base_amount == other.base_amount
            && self.rate == other.rate
            && self.status == other.status
            && self.compressed == other.compressed
            && self.notes == other.notes
    }
}

/// Partner subscription status as managed by the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    /// Subscription paid up
    #[default]
    Active,
    /// Subscription lapsed; triggers compression
    Inactive,
    /// Manual hold; network position untouched
    Suspended,
    /// Removed after long inactivity; triggers compression
    Terminated,
}

impl PartnerStatus {
    pub fn is_active(self) -> bool {
        matches!(self, PartnerStatus::Active)
    }

    /// Whether entering this status must deactivate the partner in the network.
    pub fn deactivates(self) -> bool {
        match self {
            PartnerStatus::Inactive | PartnerStatus::Terminated => true,
            PartnerStatus::Active | PartnerStatus::Suspended => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PartnerStatus::Active => "active",
            PartnerStatus::Inactive => "inactive",
            PartnerStatus::Suspended => "suspended",
            PartnerStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CommissionStatus::Pending, CommissionStatus::Approved, true)]
    #[case(CommissionStatus::Approved, CommissionStatus::Paid, true)]
    #[case(CommissionStatus::Pending, CommissionStatus::Paid, true)]
    #[case(CommissionStatus::Pending, CommissionStatus::Cancelled, true)]
    #[case(CommissionStatus::Approved, CommissionStatus::Cancelled, true)]
    #[case(CommissionStatus::Approved, CommissionStatus::Pending, false)]
    #[case(CommissionStatus::Paid, CommissionStatus::Pending, false)]
    #[case(CommissionStatus::Paid, CommissionStatus::Approved, false)]
    #[case(CommissionStatus::Paid, CommissionStatus::Cancelled, false)]
    #[case(CommissionStatus::Cancelled, CommissionStatus::Paid, false)]
    #[case(CommissionStatus::Approved, CommissionStatus::Approved, false)]
    fn test_commission_transitions(
        #[case] from: CommissionStatus,
        #[case] to: CommissionStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
        assert_eq!(from.transition(to).is_ok(), allowed);
    }

    #[test]
    fn test_invalid_transition_error_names_both_states() {
        let err = CommissionStatus::Paid
            .transition(CommissionStatus::Pending)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid commission transition: paid -> pending");
    }

    #[test]
    fn test_partner_status_deactivation() {
        assert!(PartnerStatus::Inactive.deactivates());
        assert!(PartnerStatus::Terminated.deactivates());
        assert!(!PartnerStatus::Suspended.deactivates());
        assert!(!PartnerStatus::Suspended.is_active());
        assert!(PartnerStatus::Active.is_active());
    }

    #[test]
    fn test_chain_entry_from_tuple() {
        let entry: UplineChainEntry = (7, false).into();
        assert_eq!(entry, UplineChainEntry::inactive(7));
    }
}
