//! Serialization of a [`DeviceTree`] into an FDT blob.
//!
//! [`create_dtb`] walks the tree depth first and writes it through a bounded
//! [`FdtWriter`]. When the blob does not fit, the whole walk is repeated with
//! twice the capacity.

mod config;
mod writer;

use alloc::vec::Vec;
use core::ops::Deref;

use fdt_raw::{FDT_HEADER_SIZE, Fdt, FdtError, FdtWriter, StructItem};
use log::{Level, debug, error, log_enabled};

use crate::{DeviceTree, DtError, DtResult, NodeId};

pub use config::{DEFAULT_INITIAL_SIZE, DEFAULT_PRIVATE_PREFIX, FlattenConfig, PhandleStyle};
pub use writer::{ExtraNodes, NodeWriter};

/// Name of the property that points the OS at its console.
pub const STDOUT_PATH_PROP: &str = "linux,stdout-path";

/// A finished, validated blob.
#[derive(Clone, PartialEq, Eq)]
pub struct FdtData(Vec<u8>);

impl FdtData {
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// A read view of the blob.
    pub fn fdt(&self) -> Result<Fdt<'_>, FdtError> {
        Fdt::from_bytes(&self.0)
    }
}

impl Deref for FdtData {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for FdtData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for FdtData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FdtData").field("len", &self.0.len()).finish()
    }
}

/// Flattens `tree` into a blob.
///
/// Nodes from `extras` are appended under the root after the tree's
/// children, followed by a `chosen` node when `config.stdout_path` is set
/// and the tree has no `chosen` of its own.
pub fn create_dtb(
    tree: &DeviceTree,
    config: &FlattenConfig,
    extras: &[&dyn ExtraNodes],
) -> DtResult<FdtData> {
    let mut capacity = config.initial_size.max(FDT_HEADER_SIZE);
    let blob = loop {
        match flatten(tree, config, extras, capacity) {
            Ok(blob) => break blob,
            Err(DtError::Fdt(FdtError::NoSpace { .. })) => {
                let Some(next) = capacity.checked_mul(2) else {
                    error!("dtb: cannot grow beyond {} bytes", capacity);
                    return Err(FdtError::NoSpace { capacity }.into());
                };
                debug!("dtb: {} bytes is not enough, retrying with {}", capacity, next);
                capacity = next;
            }
            Err(e) => {
                error!("dtb: error {}", e);
                return Err(e);
            }
        }
    };

    let fdt = Fdt::from_bytes(&blob).inspect_err(|e| error!("dtb: bad header: {}", e))?;
    if fdt.header().totalsize as usize != blob.len() {
        error!(
            "dtb: totalsize {} does not match blob length {}",
            fdt.header().totalsize,
            blob.len()
        );
        return Err(FdtError::BadOffset("totalsize").into());
    }
    dump_fdt(&fdt);
    Ok(FdtData(blob))
}

fn flatten(
    tree: &DeviceTree,
    config: &FlattenConfig,
    extras: &[&dyn ExtraNodes],
    capacity: usize,
) -> DtResult<Vec<u8>> {
    let mut fdt = FdtWriter::new(capacity);
    fdt.set_boot_cpuid_phys(config.boot_cpuid_phys);
    for rsv in &config.reservations {
        fdt.add_reservation(*rsv)?;
    }
    fdt.finish_reservations()?;

    let mut w = NodeWriter::new(fdt, tree, config.phandle_style.property_name());
    let root = tree.root_id();
    let root_node = tree.node(root);
    w.begin(root_node.name(), root_node.phandle())?;
    write_contents(&mut w, config, root)?;

    for extra in extras {
        extra.write_nodes(&mut w)?;
        if w.depth() != 1 {
            return Err(FdtError::BadState("unclosed node").into());
        }
    }

    if let Some(path) = &config.stdout_path {
        if tree.find_child(root, "chosen").is_none() {
            w.begin_node("chosen")?;
            w.property_string(STDOUT_PATH_PROP, path)?;
            w.end_node()?;
        }
    }

    w.end()?;
    Ok(w.into_inner().finish()?)
}

/// Writes the stored properties of `node`, then its children.
fn write_contents(w: &mut NodeWriter<'_>, config: &FlattenConfig, node: NodeId) -> DtResult {
    let tree = w.tree;
    let n = tree.node(node);
    for prop in n.properties() {
        if config.is_private(prop.name()) {
            continue;
        }
        w.property(prop.name(), prop.data())?;
    }

    if let Some(path) = &config.stdout_path {
        let is_chosen = n.name() == "chosen" && n.parent() == Some(tree.root_id());
        if is_chosen && n.find_property(STDOUT_PATH_PROP).is_none() {
            w.property_string(STDOUT_PATH_PROP, path)?;
        }
    }

    for &child in n.children() {
        let c = tree.node(child);
        w.begin(c.name(), c.phandle())?;
        write_contents(w, config, child)?;
        w.end()?;
    }
    Ok(())
}

fn dump_fdt(fdt: &Fdt<'_>) {
    if !log_enabled!(Level::Debug) {
        return;
    }
    debug!("Device tree {} bytes", fdt.header().totalsize);
    debug!("fdt_num_mem_rsv = {}", fdt.memory_reservations().count());
    for (i, rsv) in fdt.memory_reservations().enumerate() {
        debug!("  mem_rsv[{}] = {:#x}@{:#x}", i, rsv.size, rsv.address);
    }
    let mut walk = fdt.walk();
    while let Some(item) = walk.next() {
        match item {
            Ok(StructItem::BeginNode(name)) => debug!("name: {} [depth {}]", name, walk.depth()),
            Ok(_) => {}
            Err(e) => {
                debug!("walk stopped: {}", e);
                break;
            }
        }
    }
}
