use alloc::{string::String, vec::Vec};

use fdt_raw::{FdtError, FdtWriter, Phandle};
use log::trace;

use crate::{DeviceTree, DtError, DtResult};

const MAX_INDENT: usize = 32;

/// Source of nodes that live outside the tree and are appended to the blob
/// under the root, after the tree's own children.
///
/// `write_nodes` may run several times for one blob: every retry of
/// [`crate::create_dtb`] starts from scratch.
pub trait ExtraNodes {
    fn write_nodes(&self, w: &mut NodeWriter<'_>) -> DtResult;
}

/// Emits nodes into the blob being built.
///
/// Every node opened through [`NodeWriter::begin_node`] gets a phandle
/// property from a counter that starts above every phandle of the tree.
pub struct NodeWriter<'a> {
    fdt: FdtWriter,
    pub(crate) tree: &'a DeviceTree,
    phandle_name: &'static str,
    last_phandle: u32,
    extra_names: Vec<String>,
    depth: usize,
    indent: heapless::String<MAX_INDENT>,
}

impl<'a> NodeWriter<'a> {
    pub(crate) fn new(fdt: FdtWriter, tree: &'a DeviceTree, phandle_name: &'static str) -> Self {
        Self {
            fdt,
            tree,
            phandle_name,
            last_phandle: tree.last_phandle(),
            extra_names: Vec::new(),
            depth: 0,
            indent: heapless::String::new(),
        }
    }

    pub(crate) fn into_inner(self) -> FdtWriter {
        self.fdt
    }

    /// Open nodes, the root included.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn begin(&mut self, name: &str, phandle: Phandle) -> DtResult {
        self.fdt.begin_node(name)?;
        trace!("{}{}:", self.indent, name);
        self.depth += 1;
        // The trace indent stops growing past MAX_INDENT levels.
        self.indent.push(' ').ok();
        let phandle_name = self.phandle_name;
        self.property_u32(phandle_name, phandle.raw())
    }

    pub(crate) fn end(&mut self) -> DtResult {
        self.fdt.end_node()?;
        self.depth -= 1;
        while self.indent.len() > self.depth {
            self.indent.pop();
        }
        Ok(())
    }

    /// Opens a node and returns the phandle written for it.
    ///
    /// A node directly under the root may not reuse the name of a root child
    /// or of another appended node.
    pub fn begin_node(&mut self, name: &str) -> DtResult<Phandle> {
        if self.depth == 1 {
            let root = self.tree.root_id();
            if self.tree.find_child(root, name).is_some()
                || self.extra_names.iter().any(|n| n == name)
            {
                return Err(DtError::DuplicateNode {
                    parent: String::from("/"),
                    name: String::from(name),
                });
            }
            self.extra_names.push(String::from(name));
        }
        self.last_phandle += 1;
        let phandle = Phandle::from(self.last_phandle);
        self.begin(name, phandle)?;
        Ok(phandle)
    }

    /// Closes the innermost node opened with [`NodeWriter::begin_node`].
    pub fn end_node(&mut self) -> DtResult {
        if self.depth <= 1 {
            return Err(FdtError::BadState("end node without open node").into());
        }
        self.end()
    }

    pub fn property(&mut self, name: &str, data: &[u8]) -> DtResult {
        trace!("{}{}=[{}]", self.indent, name, data.len());
        self.fdt.property(name, data)?;
        Ok(())
    }

    pub fn property_u32(&mut self, name: &str, value: u32) -> DtResult {
        trace!("{}{}={}", self.indent, name, value);
        self.fdt.property_u32(name, value)?;
        Ok(())
    }

    pub fn property_cells(&mut self, name: &str, cells: &[u32]) -> DtResult {
        trace!("{}{}={}...", self.indent, name, cells.len());
        self.fdt.property_cells(name, cells)?;
        Ok(())
    }

    pub fn property_string(&mut self, name: &str, value: &str) -> DtResult {
        trace!("{}{}={}", self.indent, name, value);
        self.fdt.property_string(name, value)?;
        Ok(())
    }
}
