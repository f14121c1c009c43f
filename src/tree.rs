//! The in-memory tree.
//!
//! [`DeviceTree`] owns every node in an arena of slots addressed by
//! [`NodeId`]. A node is created detached (`new_root`) and later attached, or
//! created directly under a parent. Removing a node frees its slot and those
//! of its whole subtree; slots are never handed out again.

use alloc::{collections::BTreeMap, format, string::String, vec, vec::Vec};

use fdt_raw::Phandle;
use log::{error, warn};

use crate::{
    DtError, DtResult, Name, Node, NodeId, Property,
    error::fatal,
};

/// Property names that carry a node's phandle.
pub const PHANDLE_PROPS: [&str; 2] = ["phandle", "linux,phandle"];

/// A device tree and the state tied to it: the phandle allocator and the
/// `/chosen` node.
pub struct DeviceTree {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    chosen: Option<NodeId>,
    last_phandle: u32,
    phandles: BTreeMap<u32, NodeId>,
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

#[track_caller]
fn stale(id: NodeId) -> ! {
    error!("DT: use of removed node #{}", id.0);
    panic!("use of removed node #{}", id.0)
}

impl DeviceTree {
    /// Creates a tree holding only the root node.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            chosen: None,
            last_phandle: 0,
            phandles: BTreeMap::new(),
        };
        tree.root = tree.new_root("");
        tree
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// The `/chosen` node recorded by [`DeviceTree::init_chosen`].
    pub fn chosen(&self) -> Option<NodeId> {
        self.chosen
    }

    /// Largest phandle handed out or seen so far.
    pub fn last_phandle(&self) -> u32 {
        self.last_phandle
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    /// The node behind `id`. A removed id is fatal.
    #[track_caller]
    pub fn node(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => stale(id),
        }
    }

    #[track_caller]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            Some(node) => node,
            None => stale(id),
        }
    }

    /// Number of live nodes, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Ids of all live nodes in creation order.
    pub fn iter_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i))
    }

    fn alloc_phandle(&mut self) -> Phandle {
        self.last_phandle += 1;
        Phandle::from(self.last_phandle)
    }

    /// Live node, attached or not, holding `phandle`.
    pub(crate) fn phandle_owner(&self, phandle: u32) -> Option<NodeId> {
        self.phandles.get(&phandle).copied()
    }

    /// Creates a detached node with a fresh phandle.
    pub fn new_root(&mut self, name: impl Into<Name>) -> NodeId {
        let phandle = self.alloc_phandle();
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new(name.into(), phandle)));
        self.phandles.insert(phandle.raw(), id);
        id
    }

    /// Whether `ancestor` is `node` or one of its parents.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.node(id).parent;
        }
        false
    }

    /// Appends the detached `node` to the children of `parent`.
    ///
    /// Fails without touching either node when `parent` already has a child
    /// of the same name.
    pub fn attach(&mut self, parent: NodeId, node: NodeId) -> DtResult {
        let child = self.node(node);
        if node == self.root || child.parent.is_some() {
            return Err(DtError::AlreadyAttached(self.path_of(node)));
        }
        if self.is_ancestor(node, parent) {
            return Err(DtError::Cycle(self.path_of(node)));
        }
        if self.find_child(parent, child.name()).is_some() {
            let err = DtError::DuplicateNode {
                parent: self.path_of(parent),
                name: String::from(child.name()),
            };
            error!("DT: {}", err);
            return Err(err);
        }
        let name = String::from(child.name());
        let sibling = self.node(parent).children.len();
        let n = self.node_mut(node);
        n.parent = Some(parent);
        n.sibling = sibling;
        let p = self.node_mut(parent);
        p.children.push(node);
        p.child_names.insert(name, node);
        Ok(())
    }

    /// Creates `name` under `parent`. On a name clash the new node is
    /// discarded.
    pub fn new_child(&mut self, parent: NodeId, name: impl Into<Name>) -> DtResult<NodeId> {
        let node = self.new_root(name);
        if let Err(e) = self.attach(parent, node) {
            self.free_subtree(node);
            return Err(e);
        }
        Ok(node)
    }

    /// Creates `base@addr`, the address in lowercase hex.
    pub fn new_child_addr(&mut self, parent: NodeId, base: &str, addr: u64) -> DtResult<NodeId> {
        self.new_child(parent, format!("{}@{:x}", base, addr))
    }

    /// Creates `base@addr0,addr1`.
    pub fn new_child_2addr(
        &mut self,
        parent: NodeId,
        base: &str,
        addr0: u64,
        addr1: u64,
    ) -> DtResult<NodeId> {
        self.new_child(parent, format!("{}@{:x},{:x}", base, addr0, addr1))
    }

    /// Destroys `node` and its subtree and detaches it from its parent.
    ///
    /// The root slot itself survives: removing it only empties it.
    #[track_caller]
    pub fn remove_node(&mut self, node: NodeId) {
        if node == self.root {
            let root = self.node_mut(node);
            let children = core::mem::take(&mut root.children);
            root.child_names.clear();
            root.properties.clear();
            root.take_private();
            for child in children {
                self.free_subtree(child);
            }
            return;
        }
        let n = self.node(node);
        if let Some(parent) = n.parent {
            let pos = n.sibling;
            let name = String::from(n.name());
            let p = self.node_mut(parent);
            p.child_names.remove(&name);
            p.children.remove(pos);
            let later = p.children[pos..].to_vec();
            for (i, c) in later.into_iter().enumerate() {
                self.node_mut(c).sibling = pos + i;
            }
        }
        self.free_subtree(node);
    }

    fn free_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get_mut(id.0).and_then(Option::take) {
                if self.phandles.get(&n.phandle.raw()) == Some(&id) {
                    self.phandles.remove(&n.phandle.raw());
                }
                stack.extend(n.children);
            }
            if self.chosen == Some(id) {
                self.chosen = None;
            }
        }
    }

    /// Makes sure `/chosen` exists and records it.
    pub fn init_chosen(&mut self) -> NodeId {
        if let Some(id) = self.chosen {
            return id;
        }
        let root = self.root;
        let id = match self.find_child(root, "chosen") {
            Some(id) => id,
            None => match self.new_child(root, "chosen") {
                Ok(id) => id,
                Err(e) => fatal(e),
            },
        };
        self.chosen = Some(id);
        id
    }

    /// Adds a property to `node`.
    ///
    /// `phandle` and `linux,phandle` are not stored: they set the node's
    /// phandle and `None` is returned. A duplicate name is fatal.
    #[track_caller]
    pub fn add_property(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        value: impl Into<Vec<u8>>,
    ) -> Option<&mut Property> {
        self.add(node, Property::new(name, value))
    }

    /// Like [`DeviceTree::add_property`], handing back the error instead.
    pub fn try_add_property(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        value: impl Into<Vec<u8>>,
    ) -> DtResult<Option<&mut Property>> {
        self.insert_property(node, Property::new(name, value))
    }

    #[track_caller]
    pub fn add_property_string(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        value: &str,
    ) -> Option<&mut Property> {
        self.add(node, Property::from_string(name, value))
    }

    /// Copies at most `max_len` bytes of `value`, stopping at a NUL.
    #[track_caller]
    pub fn add_property_nstr(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        value: &[u8],
        max_len: usize,
    ) -> Option<&mut Property> {
        self.add(node, Property::from_nstr(name, value, max_len))
    }

    #[track_caller]
    pub fn add_property_cell(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        value: u32,
    ) -> Option<&mut Property> {
        self.add(node, Property::from_cells(name, &[value]))
    }

    #[track_caller]
    pub fn add_property_cells(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        cells: &[u32],
    ) -> Option<&mut Property> {
        self.add(node, Property::from_cells(name, cells))
    }

    #[track_caller]
    pub fn add_property_strings(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        strings: &[&str],
    ) -> Option<&mut Property> {
        self.add(node, Property::from_strings(name, strings))
    }

    #[track_caller]
    pub fn add_property_u64(
        &mut self,
        node: NodeId,
        name: impl Into<Name>,
        value: u64,
    ) -> Option<&mut Property> {
        self.add(node, Property::from_u64(name, value))
    }

    #[track_caller]
    fn add(&mut self, node: NodeId, prop: Property) -> Option<&mut Property> {
        match self.insert_property(node, prop) {
            Ok(prop) => prop,
            Err(e) => fatal(e),
        }
    }

    fn insert_property(&mut self, node: NodeId, prop: Property) -> DtResult<Option<&mut Property>> {
        if PHANDLE_PROPS.contains(&prop.name()) {
            self.set_phandle(node, &prop)?;
            return Ok(None);
        }
        if self.node(node).find_property(prop.name()).is_some() {
            return Err(DtError::DuplicateProperty {
                path: self.path_of(node),
                name: String::from(prop.name()),
            });
        }
        let props = &mut self.node_mut(node).properties;
        props.push(prop);
        Ok(props.last_mut())
    }

    fn set_phandle(&mut self, node: NodeId, prop: &Property) -> DtResult {
        let value = match prop.as_u32() {
            Some(v) if Phandle::from(v).is_valid() => v,
            _ => {
                return Err(DtError::InvalidPhandle {
                    path: self.path_of(node),
                });
            }
        };

        let clash = self.phandle_owner(value).filter(|&id| id != node);
        if let Some(other) = clash {
            if self.node(other).phandle_fixed {
                return Err(DtError::DuplicatePhandle {
                    phandle: value,
                    path: self.path_of(node),
                    other: self.path_of(other),
                });
            }
        }

        self.last_phandle = self.last_phandle.max(value);
        let n = self.node_mut(node);
        let old = core::mem::replace(&mut n.phandle, Phandle::from(value));
        n.phandle_fixed = true;
        if self.phandles.get(&old.raw()) == Some(&node) {
            self.phandles.remove(&old.raw());
        }
        self.phandles.insert(value, node);

        if let Some(other) = clash {
            let fresh = self.alloc_phandle();
            warn!(
                "DT: phandle {:#x} of {} moves to {}, reassigned {:#x}",
                value,
                self.path_of(other),
                self.path_of(node),
                fresh.raw()
            );
            self.node_mut(other).phandle = fresh;
            self.phandles.insert(fresh.raw(), other);
        }
        Ok(())
    }

    /// Removes and returns the property `name` of `node`.
    pub fn delete_property(&mut self, node: NodeId, name: &str) -> Option<Property> {
        let props = &mut self.node_mut(node).properties;
        let pos = props.iter().position(|p| p.name() == name)?;
        Some(props.remove(pos))
    }

    pub fn find_property(&self, node: NodeId, name: &str) -> Option<&Property> {
        self.node(node).find_property(name)
    }

    /// The property `name`, which must exist and, when `len` is given, be
    /// exactly that many bytes long. Fatal otherwise.
    #[track_caller]
    pub fn require_property(&self, node: NodeId, name: &str, len: Option<usize>) -> &Property {
        match self.try_require_property(node, name, len) {
            Ok(prop) => prop,
            Err(e) => fatal(e),
        }
    }

    pub fn try_require_property(
        &self,
        node: NodeId,
        name: &str,
        len: Option<usize>,
    ) -> DtResult<&Property> {
        let prop = self
            .find_property(node, name)
            .ok_or_else(|| DtError::MissingProperty {
                path: self.path_of(node),
                name: String::from(name),
            })?;
        match len {
            Some(expected) if prop.len() != expected => Err(DtError::PropertyLength {
                path: self.path_of(node),
                name: String::from(name),
                expected,
                actual: prop.len(),
            }),
            _ => Ok(prop),
        }
    }

    /// Whether `node` has `name`, and when `value` is given, whether the
    /// property holds exactly that string.
    pub fn has_node_property(&self, node: NodeId, name: &str, value: Option<&str>) -> bool {
        let Some(prop) = self.find_property(node, name) else {
            return false;
        };
        match value {
            None => true,
            Some(v) => prop.data().strip_suffix(&[0]) == Some(v.as_bytes()),
        }
    }

    #[track_caller]
    pub fn prop_get_u32(&self, node: NodeId, name: &str) -> u32 {
        self.require_property(node, name, Some(4)).cell(0)
    }

    #[track_caller]
    pub fn prop_get_u32_def(&self, node: NodeId, name: &str, def: u32) -> u32 {
        self.find_property(node, name).map_or(def, |p| p.cell(0))
    }

    #[track_caller]
    pub fn prop_get_u64(&self, node: NodeId, name: &str) -> u64 {
        let prop = self.require_property(node, name, Some(8));
        ((prop.cell(0) as u64) << 32) | prop.cell(1) as u64
    }

    #[track_caller]
    pub fn prop_get_u64_def(&self, node: NodeId, name: &str, def: u64) -> u64 {
        self.find_property(node, name)
            .map_or(def, |p| ((p.cell(0) as u64) << 32) | p.cell(1) as u64)
    }

    #[track_caller]
    pub fn prop_get(&self, node: NodeId, name: &str) -> &[u8] {
        self.require_property(node, name, None).data()
    }

    pub fn prop_get_def<'a>(&'a self, node: NodeId, name: &str, def: &'a [u8]) -> &'a [u8] {
        self.find_property(node, name).map_or(def, |p| p.data())
    }
}
