//! In-memory device tree builder and FDT flattener for boot firmware.
//!
//! Discovery code builds a [`DeviceTree`] node by node, other code queries
//! it, and [`create_dtb`] finally turns it into a Flattened Device Tree blob
//! for the next boot stage. A blob can also be read back into a tree with
//! [`DeviceTree::from_fdt`].
//!
//! # Example
//!
//! ```
//! use devtree::{DeviceTree, FlattenConfig, create_dtb};
//!
//! let mut tree = DeviceTree::new();
//! let root = tree.root_id();
//! tree.add_property_string(root, "compatible", "ibm,powernv");
//! let mem = tree.new_child_addr(root, "memory", 0)?;
//! tree.add_property_string(mem, "device_type", "memory");
//! tree.add_property_cells(mem, "reg", &[0, 0, 0x4000_0000]);
//!
//! let config = FlattenConfig::new().reserve(0x3000_0000, 0x0100_0000);
//! let blob = create_dtb(&tree, &config, &[])?;
//!
//! let copy = DeviceTree::from_fdt(&blob)?;
//! let mem = copy.find_by_path(copy.root_id(), "/memory@0").unwrap();
//! assert_eq!(copy.get_address(mem, 0), (0, 0x4000_0000));
//! # Ok::<(), devtree::DtError>(())
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod addr;
mod display;
mod error;
mod expand;
pub mod flatten;
mod name;
mod node;
mod path;
mod prop;
mod tree;
mod walk;

pub use addr::{DEFAULT_ADDRESS_CELLS, DEFAULT_SIZE_CELLS};
pub use display::DisplayNode;
pub use error::{DtError, DtResult};
pub use flatten::{ExtraNodes, FdtData, FlattenConfig, NodeWriter, PhandleStyle, create_dtb};
pub use name::Name;
pub use node::{Node, NodeId};
pub use prop::{Property, read_number};
pub use tree::{DeviceTree, PHANDLE_PROPS};
pub use walk::{CompatibleNodes, Descendants};

pub use fdt_raw::{FdtError, MemoryReservation, Phandle, StructItem};
