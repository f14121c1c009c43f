use alloc::{boxed::Box, collections::BTreeMap, string::String, vec::Vec};
use core::{any::Any, fmt};

use fdt_raw::Phandle;

use crate::{Name, Property};

/// Index of a node inside its [`crate::DeviceTree`].
///
/// Slots are never reused, so an id of a removed node never names a
/// different node later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A node of the in-memory tree.
pub struct Node {
    pub(crate) name: Name,
    pub(crate) phandle: Phandle,
    /// Set once the phandle came from a `phandle` property rather than the
    /// tree's allocator.
    pub(crate) phandle_fixed: bool,
    pub(crate) parent: Option<NodeId>,
    /// Position in the parent's `children`.
    pub(crate) sibling: usize,
    pub(crate) children: Vec<NodeId>,
    /// `children` keyed by name.
    pub(crate) child_names: BTreeMap<String, NodeId>,
    pub(crate) properties: Vec<Property>,
    private: Option<Box<dyn Any + Send>>,
}

impl Node {
    pub(crate) fn new(name: Name, phandle: Phandle) -> Self {
        Self {
            name,
            phandle,
            phandle_fixed: false,
            parent: None,
            sibling: 0,
            children: Vec::new(),
            child_names: BTreeMap::new(),
            properties: Vec::new(),
            private: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Name without the `@unit-address` suffix.
    pub fn base_name(&self) -> &str {
        self.name.split_unit_address().0
    }

    /// The unit address, empty when the name has none.
    pub fn unit_address(&self) -> &str {
        self.name.split_unit_address().1
    }

    pub fn phandle(&self) -> Phandle {
        self.phandle
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn find_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    /// Whether `compatible` lists `compat` as one of its entries.
    pub fn is_compatible(&self, compat: &str) -> bool {
        self.find_property("compatible")
            .is_some_and(|p| p.contains_str(compat))
    }

    /// Attaches collaborator data to the node, replacing any previous value.
    pub fn set_private<T: Any + Send>(&mut self, value: T) {
        self.private = Some(Box::new(value));
    }

    pub fn private<T: Any + Send>(&self) -> Option<&T> {
        self.private.as_ref()?.downcast_ref()
    }

    pub fn private_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.private.as_mut()?.downcast_mut()
    }

    pub fn take_private(&mut self) -> Option<Box<dyn Any + Send>> {
        self.private.take()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name.as_str())
            .field("phandle", &self.phandle.raw())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("properties", &self.properties.len())
            .field("private", &self.private.is_some())
            .finish()
    }
}
