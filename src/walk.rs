//! Pre-order traversal and searches.

use fdt_raw::Phandle;

use crate::{DeviceTree, NodeId};

impl DeviceTree {
    /// First child of `node`.
    pub fn first(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).children.first().copied()
    }

    /// The node after `prev` in a pre-order walk of the subtree under
    /// `root`: children first, then siblings, then the siblings of the
    /// ancestors. `None` once the walk is back at `root`.
    pub fn next(&self, root: NodeId, prev: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first(prev) {
            return Some(child);
        }
        let mut cur = prev;
        while cur != root {
            let n = self.node(cur);
            let parent = n.parent?;
            if let Some(&sibling) = self.node(parent).children.get(n.sibling + 1) {
                return Some(sibling);
            }
            cur = parent;
        }
        None
    }

    /// All nodes below `root` in pre-order, `root` excluded.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root,
            next: self.first(root),
        }
    }

    /// The node carrying `phandle`, searching `root` and its subtree.
    pub fn find_by_phandle(&self, root: NodeId, phandle: impl Into<Phandle>) -> Option<NodeId> {
        let id = self.phandle_owner(phandle.into().raw())?;
        self.is_ancestor(root, id).then_some(id)
    }

    /// The next node after `prev` whose `compatible` lists `compat`. With
    /// no `prev` the search starts at `root` itself.
    pub fn find_compatible_node(
        &self,
        root: NodeId,
        prev: Option<NodeId>,
        compat: &str,
    ) -> Option<NodeId> {
        let mut cur = match prev {
            Some(prev) => self.next(root, prev),
            None => Some(root),
        };
        while let Some(id) = cur {
            if self.node(id).is_compatible(compat) {
                return Some(id);
            }
            cur = self.next(root, id);
        }
        None
    }

    /// Every node compatible with `compat`, in the order
    /// [`DeviceTree::find_compatible_node`] visits them.
    pub fn compatible_nodes<'a>(&'a self, root: NodeId, compat: &'a str) -> CompatibleNodes<'a> {
        CompatibleNodes {
            tree: self,
            root,
            compat,
            prev: None,
            done: false,
        }
    }
}

/// Iterator returned by [`DeviceTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a DeviceTree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.tree.next(self.root, cur);
        Some(cur)
    }
}

/// Iterator returned by [`DeviceTree::compatible_nodes`].
pub struct CompatibleNodes<'a> {
    tree: &'a DeviceTree,
    root: NodeId,
    compat: &'a str,
    prev: Option<NodeId>,
    done: bool,
}

impl Iterator for CompatibleNodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .tree
            .find_compatible_node(self.root, self.prev, self.compat)
        {
            Some(id) => {
                self.prev = Some(id);
                Some(id)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    fn sample() -> (DeviceTree, [NodeId; 5]) {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        let a = tree.new_child(root, "a").unwrap();
        let a1 = tree.new_child(a, "a1").unwrap();
        let a2 = tree.new_child(a, "a2").unwrap();
        let b = tree.new_child(root, "b").unwrap();
        (tree, [root, a, a1, a2, b])
    }

    #[test]
    fn test_preorder() {
        let (tree, [root, a, a1, a2, b]) = sample();
        let order: Vec<_> = tree.descendants(root).collect();
        assert_eq!(order, [a, a1, a2, b]);
        let sub: Vec<_> = tree.descendants(a).collect();
        assert_eq!(sub, [a1, a2]);
        assert_eq!(tree.next(a, a2), None);
    }

    #[test]
    fn test_childless_root_walk_ends() {
        let tree = DeviceTree::new();
        let root = tree.root_id();
        assert_eq!(tree.next(root, root), None);
        assert_eq!(tree.descendants(root).count(), 0);
    }

    #[test]
    fn test_find_by_phandle_includes_root() {
        let (tree, [root, _, a1, _, _]) = sample();
        let ph = tree.node(a1).phandle();
        assert_eq!(tree.find_by_phandle(root, ph), Some(a1));
        assert_eq!(tree.find_by_phandle(root, tree.node(root).phandle()), Some(root));
        assert_eq!(tree.find_by_phandle(root, 0x1000u32), None);
    }
}
