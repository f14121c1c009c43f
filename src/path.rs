use alloc::{string::String, vec::Vec};

use crate::{DeviceTree, NodeId, name::split_unit_address};

impl DeviceTree {
    /// Absolute path of `node`; the root renders as `/`.
    ///
    /// Each node with a parent contributes `/name`; the top node of a
    /// detached subtree contributes just its name, unless it is `node`
    /// itself.
    pub fn path_of(&self, node: NodeId) -> String {
        let mut chain = Vec::new();
        let mut cur = Some(node);
        while let Some(id) = cur {
            chain.push(id);
            cur = self.node(id).parent;
        }

        let mut path = String::new();
        for &id in chain.iter().rev() {
            let n = self.node(id);
            if n.parent.is_some() || id == node {
                path.push('/');
            }
            path.push_str(n.name());
        }
        path
    }

    /// Like [`DeviceTree::path_of`], rendering a missing node as `<NULL>`.
    pub fn path_of_opt(&self, node: Option<NodeId>) -> String {
        match node {
            Some(node) => self.path_of(node),
            None => String::from("<NULL>"),
        }
    }

    /// The child of `parent` named exactly `name`.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent).child_names.get(name).copied()
    }

    /// Resolves `path` relative to `root`.
    ///
    /// Components are matched as `name@address`. An empty name or a missing
    /// address matches any child, so `/cpus` finds `cpus@0` and `/@10`
    /// finds the first child at address `10`. The first match wins. A bare
    /// `@` component ends the walk at the node reached so far.
    pub fn find_by_path(&self, root: NodeId, path: &str) -> Option<NodeId> {
        let mut cur = root;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let (name, addr) = split_unit_address(component);
            if name.is_empty() && addr.is_empty() {
                break;
            }
            cur = self.node(cur).children.iter().copied().find(|&c| {
                let (cn, ca) = split_unit_address(self.node(c).name());
                (name.is_empty() || name == cn) && (addr.is_empty() || addr == ca)
            })?;
        }
        Some(cur)
    }
}
