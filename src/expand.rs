//! Building a tree from a stream of structure items.
//!
//! Any parser that can describe a tree as [`StructItem`]s (begin node,
//! property, end node) can feed it into a [`DeviceTree`]; `from_fdt` does so
//! for a flattened blob.

use alloc::{string::String, vec::Vec};

use fdt_raw::{Fdt, FdtError, StructItem};
use log::{debug, warn};

use crate::{DeviceTree, DtResult, NodeId};

impl DeviceTree {
    /// Parses `data` and expands its structure block into a new tree.
    ///
    /// Properties of the blob's root node land on the tree root.
    pub fn from_fdt(data: &[u8]) -> DtResult<Self> {
        let fdt = Fdt::from_bytes(data)?;
        debug!(
            "DT: expanding blob v{} of {} bytes",
            fdt.header().version,
            fdt.header().totalsize
        );
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        let mut items = fdt.walk();
        match items.next() {
            Some(Ok(StructItem::BeginNode(_))) => {}
            Some(Err(e)) => return Err(e.into()),
            _ => return Err(FdtError::InvalidInput.into()),
        }
        tree.expand_into(root, &mut items)?;
        Ok(tree)
    }

    /// Fills `parent` from `items` until the `EndNode` that closes it or the
    /// end of the stream.
    ///
    /// Properties go through [`DeviceTree::try_add_property`], so parsed
    /// phandles are honoured. A child whose name is already taken is dropped
    /// with its whole subtree.
    pub fn expand_into<'a, I>(&mut self, parent: NodeId, items: I) -> DtResult
    where
        I: IntoIterator<Item = Result<StructItem<'a>, FdtError>>,
    {
        // Innermost open node; `None` while skipping a dropped subtree.
        let mut stack: Vec<Option<NodeId>> = Vec::new();
        let mut skipping = 0usize;

        for item in items {
            match item? {
                StructItem::BeginNode(name) => {
                    if skipping > 0 {
                        skipping += 1;
                        continue;
                    }
                    let at = stack.last().copied().flatten().unwrap_or(parent);
                    let node = self.new_root(String::from(name));
                    if self.attach(at, node).is_err() {
                        warn!(
                            "DT: dropping duplicate node {} under {}",
                            name,
                            self.path_of(at)
                        );
                        self.remove_node(node);
                        skipping = 1;
                        stack.push(None);
                        continue;
                    }
                    stack.push(Some(node));
                }
                StructItem::Property { name, data } => {
                    if skipping > 0 {
                        continue;
                    }
                    let at = stack.last().copied().flatten().unwrap_or(parent);
                    self.try_add_property(at, String::from(name), data)?;
                }
                StructItem::EndNode => {
                    if skipping > 1 {
                        skipping -= 1;
                        continue;
                    }
                    skipping = 0;
                    if stack.pop().is_none() {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
}
