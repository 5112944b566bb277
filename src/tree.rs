use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::TreeError;

/// Slot index into the arena. Stable for the lifetime of a node, reused after removal.
pub type NodeId = usize;

/// A node stored in the arena. Links are slots, never references, so the
/// tree can be walked in any direction without fighting the borrow checker.
#[derive(Debug, Clone)]
pub struct TreeNode<T> {
    id: String,
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<T> TreeNode<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// How `set_node` applied its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The id already existed, only its data changed
    Updated,
    /// New node under a parent that had no children
    Appended,
    /// New node under a parent that already had a different child
    Forked,
}

/// Arena-based multi-child tree
/// Stores all nodes in a flat vector and references them by slot, with an
/// id -> slot side index kept in lockstep with the shape of the tree.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Option<TreeNode<T>>>,
    /// Slots freed by removals, reused before the arena grows
    free: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    root: Option<NodeId>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            root: None,
        }
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<&TreeNode<T>> {
        self.root.and_then(|slot| self.slot(slot))
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root().map(TreeNode::id)
    }

    /// Discard the whole tree and start a new one from a single node
    pub fn set_root(&mut self, id: impl Into<String>, data: T) -> &TreeNode<T> {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();

        let id = id.into();
        debug!("set_root: id={}", id);
        let slot = self.next_slot();
        self.root = Some(slot);
        self.fill(
            slot,
            TreeNode {
                id,
                data,
                parent: None,
                children: Vec::new(),
            },
        )
    }

    /// Update `id` in place if it exists, otherwise insert it as the last
    /// child of `parent_id`.
    ///
    /// An update never touches `parent` or `children`. An insertion under a
    /// parent that already has children is a fork and is reported as such.
    pub fn set_node(
        &mut self,
        id: &str,
        data: T,
        parent_id: Option<&str>,
    ) -> Result<Insertion, TreeError> {
        if let Some(&slot) = self.index.get(id) {
            if let Some(node) = self.nodes.get_mut(slot).and_then(Option::as_mut) {
                node.data = data;
            }
            return Ok(Insertion::Updated);
        }

        let parent_id = parent_id.ok_or_else(|| TreeError::MissingParentId { id: id.to_string() })?;
        let parent_slot = self.parent_slot(parent_id, id)?;
        let has_children = self
            .slot(parent_slot)
            .map(|parent| !parent.children.is_empty())
            .unwrap_or(false);

        if has_children {
            self.fork_node(parent_id, id, data)?;
            Ok(Insertion::Forked)
        } else {
            self.append_child(parent_id, id, data)?;
            Ok(Insertion::Appended)
        }
    }

    /// Insert `id` as the first child of a parent that has none yet
    pub fn append_child(
        &mut self,
        parent_id: &str,
        id: impl Into<String>,
        data: T,
    ) -> Result<&TreeNode<T>, TreeError> {
        let id = id.into();
        let parent_slot = self.parent_slot(parent_id, &id)?;
        if self.slot(parent_slot).is_some_and(|parent| !parent.is_leaf()) {
            return Err(TreeError::WouldFork {
                parent_id: parent_id.to_string(),
                id,
            });
        }
        self.insert_under(parent_slot, id, data)
    }

    /// Insert `id` as an additional child next to the existing ones, creating a branch
    pub fn fork_node(
        &mut self,
        parent_id: &str,
        id: impl Into<String>,
        data: T,
    ) -> Result<&TreeNode<T>, TreeError> {
        let id = id.into();
        let parent_slot = self.parent_slot(parent_id, &id)?;
        if self.slot(parent_slot).is_some_and(TreeNode::is_leaf) {
            return Err(TreeError::NothingToFork {
                parent_id: parent_id.to_string(),
                id,
            });
        }
        self.insert_under(parent_slot, id, data)
    }

    /// Remove `id` and its whole subtree. Returns `false` when `id` is unknown.
    pub fn remove_node(&mut self, id: &str) -> Result<bool, TreeError> {
        let Some(&slot) = self.index.get(id) else {
            return Ok(false);
        };
        if Some(slot) == self.root {
            return Err(TreeError::RootRemoval { id: id.to_string() });
        }

        if let Some(parent_slot) = self.slot(slot).and_then(|node| node.parent) {
            if let Some(parent) = self.nodes.get_mut(parent_slot).and_then(Option::as_mut) {
                parent.children.retain(|child| *child != slot);
            }
        }
        let purged = self.purge(slot);
        debug!("remove_node: id={} purged={}", id, purged);
        Ok(true)
    }

    pub fn get_node(&self, id: &str) -> Option<&TreeNode<T>> {
        self.index.get(id).and_then(|&slot| self.slot(slot))
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn children_of(&self, id: &str) -> Vec<&TreeNode<T>> {
        self.get_node(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|&child| self.slot(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: &str) -> Option<&TreeNode<T>> {
        self.get_node(id)
            .and_then(|node| node.parent)
            .and_then(|slot| self.slot(slot))
    }

    /// Distance from the root, the root itself being 0
    pub fn depth_of(&self, id: &str) -> Option<usize> {
        let mut slot = *self.index.get(id)?;
        let mut depth = 0;
        while let Some(parent) = self.slot(slot).and_then(|node| node.parent) {
            slot = parent;
            depth += 1;
        }
        Some(depth)
    }

    /// Root first, `id` last. Empty if `id` is unknown.
    pub fn get_path_to_node(&self, id: &str) -> Vec<&TreeNode<T>> {
        let mut path = Vec::new();
        let mut current = self.index.get(id).copied();
        while let Some(node) = current.and_then(|slot| self.slot(slot)) {
            path.push(node);
            current = node.parent;
        }
        path.reverse();
        path
    }

    /// Follow the first child from `id` down to a leaf
    pub fn first_leaf(&self, id: &str) -> Option<&TreeNode<T>> {
        let mut node = self.get_node(id)?;
        while let Some(&first) = node.children.first() {
            node = self.slot(first)?;
        }
        Some(node)
    }

    /// Leaves in preorder, i.e. left to right
    pub fn leaves(&self) -> Vec<&TreeNode<T>> {
        let mut leaves = Vec::new();
        self.preorder(|node, _| {
            if node.is_leaf() {
                leaves.push(node);
            }
            true
        });
        leaves
    }

    /// Drop every sibling subtree along the path to `id`. Descendants of `id` are kept.
    pub fn prune_to_path(&mut self, id: &str) -> bool {
        let Some(&target) = self.index.get(id) else {
            return false;
        };

        let mut keep = target;
        let mut pruned = 0;
        while let Some(parent_slot) = self.slot(keep).and_then(|node| node.parent) {
            let siblings: Vec<NodeId> = self
                .slot(parent_slot)
                .map(|parent| {
                    parent
                        .children
                        .iter()
                        .copied()
                        .filter(|&child| child != keep)
                        .collect()
                })
                .unwrap_or_default();
            for sibling in siblings {
                pruned += self.purge(sibling);
            }
            if let Some(parent) = self.nodes.get_mut(parent_slot).and_then(Option::as_mut) {
                parent.children.retain(|&child| child == keep);
            }
            keep = parent_slot;
        }
        debug!("prune_to_path: id={} pruned={}", id, pruned);
        true
    }

    /// Depth-first, parent before children. Stops as soon as `visit` returns `false`.
    pub fn preorder<'t, F>(&'t self, mut visit: F)
    where
        F: FnMut(&'t TreeNode<T>, usize) -> bool,
    {
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|slot| (slot, 0)).into_iter().collect();
        while let Some((slot, depth)) = stack.pop() {
            let Some(node) = self.slot(slot) else {
                continue;
            };
            if !visit(node, depth) {
                return;
            }
            // reversed so the first child is popped first
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
    }

    /// Depth-first, children before parent. Stops as soon as `visit` returns `false`.
    pub fn postorder<'t, F>(&'t self, mut visit: F)
    where
        F: FnMut(&'t TreeNode<T>, usize) -> bool,
    {
        // (slot, depth, children already pushed)
        let mut stack: Vec<(NodeId, usize, bool)> =
            self.root.map(|slot| (slot, 0, false)).into_iter().collect();
        while let Some((slot, depth, expanded)) = stack.pop() {
            let Some(node) = self.slot(slot) else {
                continue;
            };
            if expanded || node.children.is_empty() {
                if !visit(node, depth) {
                    return;
                }
                continue;
            }
            stack.push((slot, depth, true));
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .map(|&child| (child, depth + 1, false)),
            );
        }
    }

    /// Breadth-first. Nodes of the same depth are visited contiguously, left to right.
    pub fn level_order<'t, F>(&'t self, mut visit: F)
    where
        F: FnMut(&'t TreeNode<T>, usize) -> bool,
    {
        let mut queue: VecDeque<(NodeId, usize)> = self.root.map(|slot| (slot, 0)).into_iter().collect();
        while let Some((slot, depth)) = queue.pop_front() {
            let Some(node) = self.slot(slot) else {
                continue;
            };
            if !visit(node, depth) {
                return;
            }
            queue.extend(node.children.iter().map(|&child| (child, depth + 1)));
        }
    }

    /// Deepest node shared by the root paths of `a` and `b`
    pub fn get_lowest_common_ancestor(&self, a: &str, b: &str) -> Option<&TreeNode<T>> {
        let path_a = self.get_path_to_node(a);
        let path_b = self.get_path_to_node(b);
        path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(left, right)| left.id == right.id)
            .last()
            .map(|(node, _)| *node)
    }

    fn slot(&self, slot: NodeId) -> Option<&TreeNode<T>> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn parent_slot(&self, parent_id: &str, id: &str) -> Result<NodeId, TreeError> {
        if self.index.contains_key(id) {
            return Err(TreeError::Duplicate { id: id.to_string() });
        }
        self.index
            .get(parent_id)
            .copied()
            .ok_or_else(|| TreeError::MissingParent {
                id: id.to_string(),
                parent_id: parent_id.to_string(),
            })
    }

    fn next_slot(&mut self) -> NodeId {
        match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.nodes.push(None);
                self.nodes.len() - 1
            }
        }
    }

    fn fill(&mut self, slot: NodeId, node: TreeNode<T>) -> &TreeNode<T> {
        self.index.insert(node.id.clone(), slot);
        self.nodes[slot].insert(node)
    }

    fn insert_under(
        &mut self,
        parent_slot: NodeId,
        id: String,
        data: T,
    ) -> Result<&TreeNode<T>, TreeError> {
        let slot = self.next_slot();
        if let Some(parent) = self.nodes.get_mut(parent_slot).and_then(Option::as_mut) {
            parent.children.push(slot);
        }
        Ok(self.fill(
            slot,
            TreeNode {
                id,
                data,
                parent: Some(parent_slot),
                children: Vec::new(),
            },
        ))
    }

    /// Free `slot` and everything below it, purging the side index entry by entry.
    /// Does not unlink `slot` from its parent.
    fn purge(&mut self, slot: NodeId) -> usize {
        let mut purged = 0;
        let mut pending = vec![slot];
        while let Some(slot) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(slot).and_then(Option::take) {
                self.index.remove(&node.id);
                self.free.push(slot);
                pending.extend(node.children);
                purged += 1;
            }
        }
        purged
    }
}
