//! Arena storage for the partner forest and its guarded walks.

use std::collections::{HashMap, HashSet, VecDeque};

use generational_arena::{Arena, Index};
use tracing::{error, instrument};

use crate::domain::{PartnerId, PartnerNode};

/// Forest node in the arena-based partner hierarchy.
///
/// Parent and child links are arena indices, never owning pointers, so
/// re-parenting is an index rewrite.
#[derive(Debug, Clone)]
pub struct NetworkNode {
    pub partner_id: PartnerId,
    pub is_active: bool,
    /// Index of the direct upline, None for roots
    pub upline: Option<Index>,
    /// Indices of direct downline partners in insertion order
    pub downline: Vec<Index>,
}

/// Arena-based forest of partners with an id lookup table.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// Nodes are never removed.
#[derive(Debug, Default)]
pub struct PartnerArena {
    arena: Arena<NetworkNode>,
    by_id: HashMap<PartnerId, Index>,
}

impl PartnerArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an active node and link it below `upline` if given.
    ///
    /// The caller guarantees `partner_id` is not yet present.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, partner_id: PartnerId, upline: Option<Index>) -> Index {
        let node = NetworkNode {
            partner_id,
            is_active: true,
            upline,
            downline: Vec::new(),
        };
        let node_idx = self.arena.insert(node);
        self.by_id.insert(partner_id, node_idx);

        if let Some(parent_idx) = upline {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.downline.push(node_idx);
            }
        }

        node_idx
    }

    #[instrument(level = "trace", skip(self))]
    pub fn lookup(&self, partner_id: PartnerId) -> Option<Index> {
        self.by_id.get(&partner_id).copied()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_node(&self, idx: Index) -> Option<&NetworkNode> {
        self.arena.get(idx)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut NetworkNode> {
        self.arena.get_mut(idx)
    }

    pub fn partner_id(&self, idx: Index) -> Option<PartnerId> {
        self.arena.get(idx).map(|n| n.partner_id)
    }

    pub fn contains(&self, partner_id: PartnerId) -> bool {
        self.by_id.contains_key(&partner_id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.arena.iter().map(|(_, node)| node)
    }

    /// Build the id-based snapshot of a node.
    pub fn snapshot(&self, idx: Index) -> Option<PartnerNode> {
        let node = self.arena.get(idx)?;
        Some(PartnerNode {
            partner_id: node.partner_id,
            upline_id: node.upline.and_then(|u| self.partner_id(u)),
            is_active: node.is_active,
            downline_ids: node
                .downline
                .iter()
                .filter_map(|&c| self.partner_id(c))
                .collect(),
        })
    }

    /// Iterate the upline links starting above `idx`.
    #[instrument(level = "trace", skip(self))]
    pub fn iter_upline(&self, idx: Index) -> UplineIterator<'_> {
        UplineIterator::new(self, idx)
    }

    /// Iterate all descendants of `idx` breadth-first, with their depth below `idx`.
    #[instrument(level = "trace", skip(self))]
    pub fn iter_descendants(&self, idx: Index) -> DescendantIterator<'_> {
        DescendantIterator::new(self, idx)
    }
}

/// Walks upline links, stopping at a root or when a link revisits a node.
pub struct UplineIterator<'a> {
    arena: &'a PartnerArena,
    next: Option<Index>,
    visited: HashSet<Index>,
}

impl<'a> UplineIterator<'a> {
    fn new(arena: &'a PartnerArena, start: Index) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start);
        let next = arena.get_node(start).and_then(|n| n.upline);
        Self {
            arena,
            next,
            visited,
        }
    }
}

impl<'a> Iterator for UplineIterator<'a> {
    type Item = (Index, &'a NetworkNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current_idx = self.next.take()?;
        if !self.visited.insert(current_idx) {
            error!(
                partner_id = ?self.arena.partner_id(current_idx),
                "cycle detected in upline chain, stopping walk"
            );
            return None;
        }
        let node = self.arena.get_node(current_idx)?;
        self.next = node.upline;
        Some((current_idx, node))
    }
}

/// Breadth-first walk over a subtree, excluding its root.
pub struct DescendantIterator<'a> {
    arena: &'a PartnerArena,
    queue: VecDeque<(Index, usize)>,
    visited: HashSet<Index>,
}

impl<'a> DescendantIterator<'a> {
    fn new(arena: &'a PartnerArena, start: Index) -> Self {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        visited.insert(start);
        if let Some(node) = arena.get_node(start) {
            queue.extend(node.downline.iter().map(|&c| (c, 1)));
        }
        Self {
            arena,
            queue,
            visited,
        }
    }
}

impl<'a> Iterator for DescendantIterator<'a> {
    /// (index, node, depth below the start node)
    type Item = (Index, &'a NetworkNode, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, depth)) = self.queue.pop_front() {
            if !self.visited.insert(current_idx) {
                error!(
                    partner_id = ?self.arena.partner_id(current_idx),
                    "cycle detected in downline, skipping node"
                );
                continue;
            }
            if let Some(node) = self.arena.get_node(current_idx) {
                self.queue
                    .extend(node.downline.iter().map(|&c| (c, depth + 1)));
                return Some((current_idx, node, depth));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_of_three() -> (PartnerArena, Index, Index, Index) {
        let mut arena = PartnerArena::new();
        let a = arena.insert_node(1, None);
        let b = arena.insert_node(2, Some(a));
        let c = arena.insert_node(3, Some(b));
        (arena, a, b, c)
    }

    #[test]
    fn test_insert_links_parent_and_child() {
        let (arena, a, b, _) = line_of_three();
        assert_eq!(arena.get_node(a).unwrap().downline, vec![b]);
        assert_eq!(arena.get_node(b).unwrap().upline, Some(a));
        assert_eq!(arena.lookup(2), Some(b));
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_upline_iterator_walks_to_root() {
        let (arena, _, _, c) = line_of_three();
        let ids: Vec<_> = arena.iter_upline(c).map(|(_, n)| n.partner_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_upline_iterator_stops_on_cycle() {
        let (mut arena, a, _, c) = line_of_three();
        arena.get_node_mut(a).unwrap().upline = Some(c);
        let ids: Vec<_> = arena.iter_upline(c).map(|(_, n)| n.partner_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_descendant_iterator_is_breadth_first_with_depth() {
        let mut arena = PartnerArena::new();
        let root = arena.insert_node(1, None);
        let left = arena.insert_node(2, Some(root));
        let _right = arena.insert_node(3, Some(root));
        let _deep = arena.insert_node(4, Some(left));

        let walk: Vec<_> = arena
            .iter_descendants(root)
            .map(|(_, n, d)| (n.partner_id, d))
            .collect();
        assert_eq!(walk, vec![(2, 1), (3, 1), (4, 2)]);
    }

    #[test]
    fn test_snapshot_translates_indices_to_ids() {
        let (arena, _, b, _) = line_of_three();
        let node = arena.snapshot(b).unwrap();
        assert_eq!(node.upline_id, Some(1));
        assert_eq!(node.downline_ids, vec![3]);
        assert!(node.is_active);
    }
}
