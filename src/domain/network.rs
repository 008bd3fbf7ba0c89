//! Partner hierarchy management with structural compression.
//!
//! The network is a forest: every partner has at most one upline and
//! following uplines always terminates. Deactivating a partner re-parents
//! its direct children to the nearest active ancestor, so later upline
//! walks from those children skip the deactivated partner entirely.

use std::collections::{BTreeSet, HashMap};

use generational_arena::Index;
use serde::{Deserialize, Serialize};
use termtree::Tree;
use tracing::{debug, info, instrument, warn};

use crate::domain::arena::PartnerArena;
use crate::domain::commission::MAX_LEVELS;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::{PartnerId, PartnerNode, UplineChainEntry};

/// Nested view of a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTree {
    pub partner_id: PartnerId,
    pub is_active: bool,
    pub children: Vec<NetworkTree>,
}

impl NetworkTree {
    fn leaf(partner_id: PartnerId, is_active: bool) -> Self {
        Self {
            partner_id,
            is_active,
            children: Vec::new(),
        }
    }

    /// Convert into a printable tree, marking inactive partners.
    pub fn to_tree_string(&self) -> Tree<String> {
        let label = |t: &NetworkTree| {
            if t.is_active {
                t.partner_id.to_string()
            } else {
                format!("{} (inactive)", t.partner_id)
            }
        };
        // Post-order assembly with an explicit stack
        let mut stack: Vec<(&NetworkTree, bool)> = vec![(self, false)];
        let mut built: Vec<Tree<String>> = Vec::new();
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                let leaves = built.split_off(built.len() - node.children.len());
                built.push(Tree::new(label(node)).with_leaves(leaves));
            } else {
                stack.push((node, true));
                for child in node.children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        built
            .pop()
            .unwrap_or_else(|| Tree::new(label(self)))
    }
}

/// Owner of the partner forest.
#[derive(Debug)]
pub struct NetworkManager {
    nodes: PartnerArena,
    max_levels: usize,
}

impl Default for NetworkManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkManager {
    pub fn new() -> Self {
        Self::with_max_levels(MAX_LEVELS)
    }

    /// Create a manager whose default upline chain length is `max_levels`.
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            nodes: PartnerArena::new(),
            max_levels,
        }
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    fn index_of(&self, partner_id: PartnerId) -> DomainResult<Index> {
        self.nodes
            .lookup(partner_id)
            .ok_or(DomainError::PartnerNotFound(partner_id))
    }

    // ============================================================
    // Partner lifecycle
    // ============================================================

    /// Register a new active partner below `upline_id`.
    ///
    /// An unknown upline is registered as an active root first.
    /// Returns false without mutation if the partner already exists.
    #[instrument(level = "debug", skip(self))]
    pub fn add_partner(&mut self, partner_id: PartnerId, upline_id: Option<PartnerId>) -> bool {
        match self.try_add_partner(partner_id, upline_id) {
            Ok(()) => true,
            Err(e) => {
                warn!("add_partner: {}", e);
                false
            }
        }
    }

    pub fn try_add_partner(
        &mut self,
        partner_id: PartnerId,
        upline_id: Option<PartnerId>,
    ) -> DomainResult<()> {
        if self.nodes.contains(partner_id) {
            return Err(DomainError::DuplicatePartner(partner_id));
        }
        if upline_id == Some(partner_id) {
            return Err(DomainError::InvalidUpline {
                partner_id,
                upline_id: partner_id,
            });
        }

        let upline = match upline_id {
            Some(uid) => Some(match self.nodes.lookup(uid) {
                Some(idx) => idx,
                None => {
                    warn!("upline {} not found, auto-registering as root", uid);
                    self.nodes.insert_node(uid, None)
                }
            }),
            None => None,
        };

        self.nodes.insert_node(partner_id, upline);
        info!("added partner {} under {:?}", partner_id, upline_id);
        Ok(())
    }

    /// Place an existing root partner below `upline_id`.
    ///
    /// Used when a partner first seen as someone's upline registers with its
    /// own sponsor. Attaching to the current upline again is a no-op. An
    /// unknown upline is registered as an active root first. Fails if the
    /// partner already has a different upline or if `upline_id` lies in its
    /// own downline.
    #[instrument(level = "debug", skip(self))]
    pub fn attach_to_upline(
        &mut self,
        partner_id: PartnerId,
        upline_id: PartnerId,
    ) -> DomainResult<()> {
        let idx = self.index_of(partner_id)?;
        let current = self
            .nodes
            .get_node(idx)
            .and_then(|node| node.upline)
            .and_then(|u| self.nodes.partner_id(u));
        match current {
            Some(current) if current == upline_id => return Ok(()),
            Some(current) => {
                return Err(DomainError::UplineConflict {
                    partner_id,
                    current,
                    requested: upline_id,
                })
            }
            None => {}
        }

        let upline_idx = match self.nodes.lookup(upline_id) {
            Some(upline_idx) => {
                let below_partner = upline_idx == idx
                    || self.nodes.iter_upline(upline_idx).any(|(i, _)| i == idx);
                if below_partner {
                    return Err(DomainError::InvalidUpline {
                        partner_id,
                        upline_id,
                    });
                }
                upline_idx
            }
            None => {
                warn!("upline {} not found, auto-registering as root", upline_id);
                self.nodes.insert_node(upline_id, None)
            }
        };

        if let Some(node) = self.nodes.get_node_mut(idx) {
            node.upline = Some(upline_idx);
        }
        if let Some(parent) = self.nodes.get_node_mut(upline_idx) {
            parent.downline.push(idx);
        }
        info!("partner {} attached under {}", partner_id, upline_id);
        Ok(())
    }

    /// Mark a partner inactive and, if `compress`, move its children up.
    #[instrument(level = "debug", skip(self))]
    pub fn deactivate_partner(&mut self, partner_id: PartnerId, compress: bool) -> bool {
        let idx = match self.index_of(partner_id) {
            Ok(idx) => idx,
            Err(e) => {
                warn!("deactivate_partner: {}", e);
                return false;
            }
        };

        let has_children = match self.nodes.get_node_mut(idx) {
            Some(node) => {
                node.is_active = false;
                !node.downline.is_empty()
            }
            None => return false,
        };
        info!("partner {} deactivated", partner_id);

        if compress && has_children {
            self.compress_upward(idx);
        }
        true
    }

    /// Mark a partner active again.
    ///
    /// Children moved away by an earlier compression stay where they are.
    #[instrument(level = "debug", skip(self))]
    pub fn reactivate_partner(&mut self, partner_id: PartnerId) -> bool {
        let idx = match self.index_of(partner_id) {
            Ok(idx) => idx,
            Err(e) => {
                warn!("reactivate_partner: {}", e);
                return false;
            }
        };
        match self.nodes.get_node_mut(idx) {
            Some(node) => {
                node.is_active = true;
                info!("partner {} reactivated", partner_id);
                true
            }
            None => false,
        }
    }

    // ============================================================
    // Structural compression
    // ============================================================

    fn compress_upward(&mut self, inactive_idx: Index) {
        let inactive_id = self.nodes.partner_id(inactive_idx);
        let new_upline = self.find_nearest_active_upline(inactive_idx);
        let new_upline_id = new_upline.and_then(|u| self.nodes.partner_id(u));

        let children = match self.nodes.get_node_mut(inactive_idx) {
            Some(node) => std::mem::take(&mut node.downline),
            None => return,
        };

        for &child_idx in &children {
            if let Some(child) = self.nodes.get_node_mut(child_idx) {
                child.upline = new_upline;
                match new_upline_id {
                    Some(uid) => info!(
                        "compression: partner {} re-parented from {:?} to {}",
                        child.partner_id, inactive_id, uid
                    ),
                    None => info!(
                        "compression: partner {} became root (no active ancestor above {:?})",
                        child.partner_id, inactive_id
                    ),
                }
            }
        }

        if let Some(parent) = new_upline.and_then(|u| self.nodes.get_node_mut(u)) {
            parent.downline.extend(children);
        }
    }

    fn find_nearest_active_upline(&self, idx: Index) -> Option<Index> {
        self.nodes
            .iter_upline(idx)
            .find(|(_, node)| node.is_active)
            .map(|(upline_idx, _)| upline_idx)
    }

    // ============================================================
    // Commission chain
    // ============================================================

    /// Upline chain with the configured default length.
    pub fn upline_chain(&self, partner_id: PartnerId) -> Vec<UplineChainEntry> {
        self.get_upline_chain(partner_id, self.max_levels)
    }

    /// Upline chain starting at the direct upline, at most `max_levels` long.
    ///
    /// Returns an empty chain for unknown partners.
    #[instrument(level = "debug", skip(self))]
    pub fn get_upline_chain(
        &self,
        partner_id: PartnerId,
        max_levels: usize,
    ) -> Vec<UplineChainEntry> {
        let idx = match self.index_of(partner_id) {
            Ok(idx) => idx,
            Err(e) => {
                warn!("get_upline_chain: {}", e);
                return Vec::new();
            }
        };

        let chain: Vec<UplineChainEntry> = self
            .nodes
            .iter_upline(idx)
            .take(max_levels)
            .map(|(_, node)| UplineChainEntry::new(node.partner_id, node.is_active))
            .collect();
        debug!("get_upline_chain: {} -> {} entries", partner_id, chain.len());
        chain
    }

    /// Upline chain long enough to fill `levels` payout levels.
    ///
    /// Walks up until `levels` active partners are collected or a root is
    /// reached, keeping the inactive partners in between, so compression
    /// can move a level past them instead of losing the top level.
    #[instrument(level = "debug", skip(self))]
    pub fn get_payout_chain(&self, partner_id: PartnerId, levels: usize) -> Vec<UplineChainEntry> {
        let Some(idx) = self.nodes.lookup(partner_id) else {
            warn!("get_payout_chain: partner {} not found", partner_id);
            return Vec::new();
        };

        let mut chain = Vec::new();
        let mut active = 0;
        for (_, node) in self.nodes.iter_upline(idx) {
            if active == levels {
                break;
            }
            chain.push(UplineChainEntry::new(node.partner_id, node.is_active));
            if node.is_active {
                active += 1;
            }
        }
        debug!(
            "get_payout_chain: {} -> {} entries, {} active",
            partner_id,
            chain.len(),
            active
        );
        chain
    }

    // ============================================================
    // Network queries
    // ============================================================

    pub fn get_partner(&self, partner_id: PartnerId) -> Option<PartnerNode> {
        self.nodes
            .lookup(partner_id)
            .and_then(|idx| self.nodes.snapshot(idx))
    }

    pub fn is_active(&self, partner_id: PartnerId) -> bool {
        self.nodes
            .lookup(partner_id)
            .and_then(|idx| self.nodes.get_node(idx))
            .map(|node| node.is_active)
            .unwrap_or(false)
    }

    pub fn contains(&self, partner_id: PartnerId) -> bool {
        self.nodes.contains(partner_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct downline, or every descendant in breadth-first order.
    pub fn get_downline(&self, partner_id: PartnerId, recursive: bool) -> Vec<PartnerId> {
        let Some(idx) = self.nodes.lookup(partner_id) else {
            return Vec::new();
        };
        if recursive {
            self.nodes
                .iter_descendants(idx)
                .map(|(_, node, _)| node.partner_id)
                .collect()
        } else {
            self.nodes
                .snapshot(idx)
                .map(|node| node.downline_ids)
                .unwrap_or_default()
        }
    }

    /// Partners exactly `level` steps below `partner_id`; level 0 is the partner itself.
    pub fn get_level_partners(&self, partner_id: PartnerId, level: usize) -> Vec<PartnerId> {
        if level == 0 {
            return vec![partner_id];
        }
        let Some(idx) = self.nodes.lookup(partner_id) else {
            return Vec::new();
        };
        self.nodes
            .iter_descendants(idx)
            .take_while(|(_, _, depth)| *depth <= level)
            .filter(|(_, _, depth)| *depth == level)
            .map(|(_, node, _)| node.partner_id)
            .collect()
    }

    /// Depth of the deepest branch below a partner, 0 without downline.
    pub fn get_network_depth(&self, partner_id: PartnerId) -> usize {
        self.nodes
            .lookup(partner_id)
            .map(|idx| {
                self.nodes
                    .iter_descendants(idx)
                    .map(|(_, _, depth)| depth)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Number of partners below a partner.
    pub fn get_network_size(&self, partner_id: PartnerId) -> usize {
        self.nodes
            .lookup(partner_id)
            .map(|idx| self.nodes.iter_descendants(idx).count())
            .unwrap_or(0)
    }

    /// Nested subtree, optionally limited to `max_depth` levels below the root.
    ///
    /// Unknown partners produce an inactive leaf.
    pub fn get_network_tree(&self, partner_id: PartnerId, max_depth: Option<usize>) -> NetworkTree {
        let Some(root_idx) = self.nodes.lookup(partner_id) else {
            return NetworkTree::leaf(partner_id, false);
        };
        let is_active = self.is_active(partner_id);

        // Collect nodes breadth-first, then attach children bottom-up.
        let mut order: Vec<(Index, usize)> = vec![(root_idx, 0)];
        order.extend(
            self.nodes
                .iter_descendants(root_idx)
                .take_while(|(_, _, depth)| max_depth.map_or(true, |m| *depth <= m))
                .map(|(idx, _, depth)| (idx, depth)),
        );

        let mut subtrees: HashMap<Index, NetworkTree> = HashMap::new();
        for &(idx, depth) in order.iter().rev() {
            let Some(node) = self.nodes.get_node(idx) else {
                continue;
            };
            let expand = max_depth.map_or(true, |m| depth < m);
            let children = if expand {
                node.downline
                    .iter()
                    .filter_map(|child| subtrees.remove(child))
                    .collect()
            } else {
                Vec::new()
            };
            subtrees.insert(
                idx,
                NetworkTree {
                    partner_id: node.partner_id,
                    is_active: node.is_active,
                    children,
                },
            );
        }

        subtrees
            .remove(&root_idx)
            .unwrap_or_else(|| NetworkTree::leaf(partner_id, is_active))
    }

    pub fn get_all_partner_ids(&self) -> BTreeSet<PartnerId> {
        self.nodes.nodes().map(|n| n.partner_id).collect()
    }

    pub fn get_active_partner_ids(&self) -> BTreeSet<PartnerId> {
        self.nodes
            .nodes()
            .filter(|n| n.is_active)
            .map(|n| n.partner_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 -> 2 -> 3 -> {4, 5}
    fn sample() -> NetworkManager {
        let mut net = NetworkManager::new();
        net.add_partner(1, None);
        net.add_partner(2, Some(1));
        net.add_partner(3, Some(2));
        net.add_partner(4, Some(3));
        net.add_partner(5, Some(3));
        net
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let mut net = sample();
        assert!(!net.add_partner(3, Some(1)));
        assert_eq!(net.get_partner(3).unwrap().upline_id, Some(2));
        assert_eq!(
            net.try_add_partner(3, None),
            Err(DomainError::DuplicatePartner(3))
        );
    }

    #[test]
    fn test_self_upline_is_rejected() {
        let mut net = NetworkManager::new();
        assert_eq!(
            net.try_add_partner(5, Some(5)),
            Err(DomainError::InvalidUpline {
                partner_id: 5,
                upline_id: 5
            })
        );
        assert!(!net.add_partner(5, Some(5)));
        assert!(net.is_empty());
    }

    #[test]
    fn test_attach_rejects_upline_from_own_downline() {
        let mut net = sample();
        assert_eq!(
            net.attach_to_upline(1, 4),
            Err(DomainError::InvalidUpline {
                partner_id: 1,
                upline_id: 4
            })
        );
        assert_eq!(net.get_partner(1).unwrap().upline_id, None);
        assert!(matches!(
            net.attach_to_upline(3, 1),
            Err(DomainError::UplineConflict { current: 2, .. })
        ));
        assert_eq!(net.attach_to_upline(3, 2), Ok(()));
    }

    #[test]
    fn test_unknown_upline_is_auto_registered_as_root() {
        let mut net = NetworkManager::new();
        assert!(net.add_partner(10, Some(99)));
        let upline = net.get_partner(99).unwrap();
        assert_eq!(upline.upline_id, None);
        assert!(upline.is_active);
        assert_eq!(upline.downline_ids, vec![10]);
    }

    #[test]
    fn test_chain_truncates_at_max_levels() {
        let net = sample();
        let chain = net.get_upline_chain(4, 2);
        assert_eq!(
            chain,
            vec![UplineChainEntry::active(3), UplineChainEntry::active(2)]
        );
        assert!(net.get_upline_chain(42, 5).is_empty());
        assert!(net.get_upline_chain(1, 5).is_empty());
    }

    #[test]
    fn test_deactivate_without_compress_keeps_structure() {
        let mut net = sample();
        assert!(net.deactivate_partner(3, false));
        assert_eq!(net.get_partner(4).unwrap().upline_id, Some(3));
        assert_eq!(
            net.upline_chain(4)[0],
            UplineChainEntry::inactive(3)
        );
    }

    #[test]
    fn test_tree_respects_max_depth() {
        let net = sample();
        let tree = net.get_network_tree(1, Some(2));
        assert_eq!(tree.partner_id, 1);
        assert_eq!(tree.children.len(), 1);
        let level2 = &tree.children[0].children[0];
        assert_eq!(level2.partner_id, 3);
        assert!(level2.children.is_empty());

        let leaf = net.get_network_tree(1, Some(0));
        assert!(leaf.children.is_empty());
    }

    #[test]
    fn test_tree_string_marks_inactive() {
        let mut net = sample();
        net.deactivate_partner(5, true);
        let rendered = net.get_network_tree(3, None).to_tree_string().to_string();
        assert!(rendered.contains("5 (inactive)"));
        assert!(rendered.starts_with("3"));
    }
}
