//! Partner profile management
//!
//! Keeps partner profiles and cumulative totals, and forwards every status
//! change that affects network activity to the shared `NetworkManager` so
//! structural compression stays consistent.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{NetworkManager, PartnerId, PartnerStatus};
use crate::infrastructure::traits::Clock;

/// Network shared between services: one writer, many readers.
pub type SharedNetwork = Arc<RwLock<NetworkManager>>;

pub fn shared_network(network: NetworkManager) -> SharedNetwork {
    Arc::new(RwLock::new(network))
}

pub(crate) fn read_network(
    network: &SharedNetwork,
) -> ApplicationResult<RwLockReadGuard<'_, NetworkManager>> {
    network
        .read()
        .map_err(|_| ApplicationError::LockPoisoned("network"))
}

pub(crate) fn write_network(
    network: &SharedNetwork,
) -> ApplicationResult<RwLockWriteGuard<'_, NetworkManager>> {
    network
        .write()
        .map_err(|_| ApplicationError::LockPoisoned("network"))
}

/// Contact details captured at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Partner profile with accumulated figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partner {
    pub partner_id: PartnerId,
    pub contact: ContactDetails,
    pub upline_id: Option<PartnerId>,
    pub status: PartnerStatus,
    pub registration_date: DateTime<Utc>,
    pub last_activity_date: DateTime<Utc>,
    /// Total purchase volume
    pub total_procurement: Decimal,
    /// Total commissions earned
    pub total_commissions: Decimal,
}

impl Partner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.contact.first_name, self.contact.last_name)
            .trim()
            .to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Reporting view of a partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerSummary {
    pub id: PartnerId,
    pub name: String,
    pub status: PartnerStatus,
    pub upline: Option<PartnerId>,
    pub total_procurement: Decimal,
    pub total_commissions: Decimal,
    pub registered: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Partner registration, status tracking and totals.
pub struct PartnerManager {
    partners: RwLock<HashMap<PartnerId, Partner>>,
    network: SharedNetwork,
    clock: Arc<dyn Clock>,
}

impl PartnerManager {
    pub fn new(network: SharedNetwork, clock: Arc<dyn Clock>) -> Self {
        Self {
            partners: RwLock::new(HashMap::new()),
            network,
            clock,
        }
    }

    pub fn network(&self) -> &SharedNetwork {
        &self.network
    }

    fn profiles(&self) -> RwLockReadGuard<'_, HashMap<PartnerId, Partner>> {
        self.partners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn profiles_mut(&self) -> RwLockWriteGuard<'_, HashMap<PartnerId, Partner>> {
        self.partners.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, partner_id: PartnerId, f: F) -> bool
    where
        F: FnOnce(&mut Partner),
    {
        match self.profiles_mut().get_mut(&partner_id) {
            Some(partner) => {
                f(partner);
                true
            }
            None => {
                debug!("partner {} has no profile", partner_id);
                false
            }
        }
    }

    // ============================================================
    // Registration & lookup
    // ============================================================

    /// Register a partner and add it to the network.
    ///
    /// Registering an existing id returns the stored profile unchanged. A
    /// partner first seen as someone's upline is placed below its sponsor.
    pub fn register_partner(
        &self,
        partner_id: PartnerId,
        contact: ContactDetails,
        upline_id: Option<PartnerId>,
    ) -> ApplicationResult<Partner> {
        if let Some(existing) = self.get_partner(partner_id) {
            warn!("partner {} already registered", partner_id);
            return Ok(existing);
        }

        let now = self.clock.now();
        let partner = Partner {
            partner_id,
            contact,
            upline_id,
            status: PartnerStatus::Active,
            registration_date: now,
            last_activity_date: now,
            total_procurement: Decimal::ZERO,
            total_commissions: Decimal::ZERO,
        };

        {
            let mut network = write_network(&self.network)?;
            // A partner auto-registered earlier as someone's upline already has a root node.
            if !network.contains(partner_id) {
                network.try_add_partner(partner_id, upline_id)?;
            } else if let Some(uid) = upline_id {
                network.attach_to_upline(partner_id, uid)?;
            }
        }

        self.profiles_mut().insert(partner_id, partner.clone());
        info!("partner {} registered", partner_id);
        Ok(partner)
    }

    pub fn get_partner(&self, partner_id: PartnerId) -> Option<Partner> {
        self.profiles().get(&partner_id).cloned()
    }

    // ============================================================
    // Status & activity
    // ============================================================

    /// Change a partner's status and sync network activity.
    ///
    /// Inactive and Terminated deactivate with compression; entering Active
    /// from any other status reactivates. Suspended only changes the profile.
    pub fn update_status(&self, partner_id: PartnerId, new_status: PartnerStatus) -> bool {
        // Network first: a failed lock must leave the profile untouched.
        let mut network = match write_network(&self.network) {
            Ok(network) => network,
            Err(e) => {
                warn!("update_status: {}", e);
                return false;
            }
        };
        let old_status = {
            let mut profiles = self.profiles_mut();
            let Some(partner) = profiles.get_mut(&partner_id) else {
                warn!("update_status: partner {} not found", partner_id);
                return false;
            };
            std::mem::replace(&mut partner.status, new_status)
        };
        info!(
            "partner {} status changed: {} -> {}",
            partner_id, old_status, new_status
        );

        if new_status.deactivates() {
            network.deactivate_partner(partner_id, true)
        } else if new_status.is_active() && !old_status.is_active() {
            network.reactivate_partner(partner_id)
        } else {
            true
        }
    }

    pub fn record_activity(&self, partner_id: PartnerId) -> bool {
        let now = self.clock.now();
        self.update(partner_id, |p| p.last_activity_date = now)
    }

    // ============================================================
    // Financial updates
    // ============================================================

    pub fn add_procurement_volume(&self, partner_id: PartnerId, amount: Decimal) -> bool {
        self.update(partner_id, |p| {
            p.total_procurement = p.total_procurement.saturating_add(amount)
        })
    }

    pub fn add_commission_earned(&self, partner_id: PartnerId, amount: Decimal) -> bool {
        self.update(partner_id, |p| {
            p.total_commissions = p.total_commissions.saturating_add(amount)
        })
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn get_active_partners(&self) -> Vec<Partner> {
        let mut active: Vec<Partner> = self
            .profiles()
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|p| p.partner_id);
        active
    }

    pub fn get_partner_summary(&self, partner_id: PartnerId) -> Option<PartnerSummary> {
        self.get_partner(partner_id).map(|p| PartnerSummary {
            id: p.partner_id,
            name: p.full_name(),
            status: p.status,
            upline: p.upline_id,
            total_procurement: p.total_procurement,
            total_commissions: p.total_commissions,
            registered: p.registration_date,
            last_activity: p.last_activity_date,
        })
    }
}
