//! `reg` decoding and bus address translation.

use log::{error, trace};

use crate::{DeviceTree, DtError, DtResult, NodeId, Property, read_number};

/// Cell counts used when a bus does not state them.
pub const DEFAULT_ADDRESS_CELLS: u32 = 2;
pub const DEFAULT_SIZE_CELLS: u32 = 1;

impl DeviceTree {
    /// `#address-cells` of the bus `node` sits on.
    pub fn n_address_cells(&self, node: NodeId) -> u32 {
        match self.node(node).parent {
            Some(parent) => self.prop_get_u32_def(parent, "#address-cells", DEFAULT_ADDRESS_CELLS),
            None => DEFAULT_ADDRESS_CELLS,
        }
    }

    /// `#size-cells` of the bus `node` sits on.
    pub fn n_size_cells(&self, node: NodeId) -> u32 {
        match self.node(node).parent {
            Some(parent) => self.prop_get_u32_def(parent, "#size-cells", DEFAULT_SIZE_CELLS),
            None => DEFAULT_SIZE_CELLS,
        }
    }

    fn reg_entry_cells(&self, node: NodeId) -> (usize, usize) {
        (
            self.n_address_cells(node) as usize,
            self.n_size_cells(node) as usize,
        )
    }

    /// The `index`-th `(address, size)` pair of `reg`. A missing `reg` or
    /// an index past its end is fatal.
    #[track_caller]
    pub fn get_address(&self, node: NodeId, index: usize) -> (u64, u64) {
        match self.try_get_address(node, index) {
            Ok(entry) => entry,
            Err(e) => crate::error::fatal(e),
        }
    }

    pub fn try_get_address(&self, node: NodeId, index: usize) -> DtResult<(u64, u64)> {
        let reg = self.try_require_property(node, "reg", None)?;
        let (na, ns) = self.reg_entry_cells(node);
        let entry = (na + ns) * 4;
        let bytes = entry
            .checked_mul(index)
            .and_then(|start| Some(start..start.checked_add(entry)?))
            .and_then(|range| reg.data().get(range));
        let Some(bytes) = bytes else {
            return Err(DtError::RegOutOfRange {
                path: self.path_of(node),
                index,
            });
        };
        Ok((
            read_number(bytes, na),
            read_number(&bytes[na * 4..], ns),
        ))
    }

    /// Number of whole entries in `reg`; zero when it is absent.
    pub fn count_addresses(&self, node: NodeId) -> usize {
        let Some(reg) = self.find_property(node, "reg") else {
            return 0;
        };
        let (na, ns) = self.reg_entry_cells(node);
        match (na + ns) * 4 {
            0 => 0,
            entry => reg.len() / entry,
        }
    }

    /// The `index`-th `reg` address mapped through the `ranges` of every
    /// bus above `node`.
    ///
    /// An empty `ranges` maps one to one; a bus without `ranges` ends the
    /// translation. An address no range covers is passed up unchanged.
    #[track_caller]
    pub fn translate_address(&self, node: NodeId, index: usize) -> u64 {
        let (mut addr, _) = self.get_address(node, index);
        let mut bus = self.node(node).parent;
        while let Some(id) = bus {
            let Some(parent) = self.node(id).parent else {
                break;
            };
            let Some(ranges) = self.find_property(id, "ranges") else {
                break;
            };
            let child_cells = self.prop_get_u32_def(id, "#address-cells", DEFAULT_ADDRESS_CELLS);
            let size_cells = self.prop_get_u32_def(id, "#size-cells", DEFAULT_SIZE_CELLS);
            let parent_cells = self.n_address_cells(id);
            if let Some(mapped) = map_range(ranges, addr, child_cells, parent_cells, size_cells) {
                trace!("DT: {:#x} -> {:#x} via {}", addr, mapped, self.path_of(id));
                addr = mapped;
            }
            bus = Some(parent);
        }
        addr
    }
}

fn map_range(
    ranges: &Property,
    addr: u64,
    child_cells: u32,
    parent_cells: u32,
    size_cells: u32,
) -> Option<u64> {
    let (cc, pc, sc) = (child_cells as usize, parent_cells as usize, size_cells as usize);
    let entry = (cc + pc + sc) * 4;
    if entry == 0 {
        error!("DT: ranges with zero-sized entries");
        return None;
    }
    ranges.data().chunks_exact(entry).find_map(|chunk| {
        let child = read_number(chunk, cc);
        let parent = read_number(&chunk[cc * 4..], pc);
        let size = read_number(&chunk[(cc + pc) * 4..], sc);
        if addr < child || addr - child >= size {
            return None;
        }
        let mapped = parent.checked_add(addr - child);
        if mapped.is_none() {
            error!("DT: range at {:#x} maps {:#x} past the end of the address space", parent, addr);
        }
        mapped
    })
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn test_default_cells() {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        let mem = tree.new_child_addr(root, "memory", 0).unwrap();
        assert_eq!(tree.n_address_cells(root), 2);
        assert_eq!(tree.n_size_cells(root), 1);
        assert_eq!(tree.n_address_cells(mem), 2);
        assert_eq!(tree.n_size_cells(mem), 1);
    }

    #[test]
    fn test_get_address() {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        tree.add_property_cell(root, "#address-cells", 2);
        tree.add_property_cell(root, "#size-cells", 2);
        let mem = tree.new_child_addr(root, "memory", 0x1000).unwrap();
        tree.add_property_cells(mem, "reg", &[0, 0x1000, 0, 0x2000, 1, 0, 0, 0x10]);
        assert_eq!(tree.count_addresses(mem), 2);
        assert_eq!(tree.get_address(mem, 0), (0x1000, 0x2000));
        assert_eq!(tree.get_address(mem, 1), (0x1_0000_0000, 0x10));
        assert_eq!(
            tree.try_get_address(mem, 2),
            Err(DtError::RegOutOfRange {
                path: "/memory@1000".into(),
                index: 2
            })
        );
    }

    #[test]
    fn test_count_addresses_without_reg() {
        let tree = DeviceTree::new();
        assert_eq!(tree.count_addresses(tree.root_id()), 0);
    }

    #[test]
    fn test_translate_through_ranges() {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        tree.add_property_cell(root, "#address-cells", 2);
        tree.add_property_cell(root, "#size-cells", 1);
        let bus = tree.new_child_addr(root, "lpc", 0x6030000).unwrap();
        tree.add_property_cell(bus, "#address-cells", 1);
        tree.add_property_cell(bus, "#size-cells", 1);
        // child 0x0 -> parent 0x6_0300_0000, 0x1000 long
        tree.add_property_cells(bus, "ranges", &[0, 0x6, 0x0300_0000, 0x1000]);
        let uart = tree.new_child_addr(bus, "serial", 0x3f8).unwrap();
        tree.add_property_cells(uart, "reg", &[0x3f8, 8]);

        assert_eq!(tree.translate_address(uart, 0), 0x6_0300_03f8);
    }

    #[test]
    fn test_translate_stops_without_ranges() {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        let bus = tree.new_child(root, "bus").unwrap();
        tree.add_property_cell(bus, "#address-cells", 1);
        tree.add_property_cell(bus, "#size-cells", 0);
        let dev = tree.new_child_addr(bus, "dev", 0x10).unwrap();
        tree.add_property_cell(dev, "reg", 0x10);
        assert_eq!(tree.translate_address(dev, 0), 0x10);

        tree.add_property(bus, "ranges", Vec::<u8>::new());
        assert_eq!(tree.translate_address(dev, 0), 0x10);
    }

    #[test]
    fn test_huge_reg_index_is_out_of_range() {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        let mem = tree.new_child_addr(root, "memory", 0).unwrap();
        tree.add_property_cells(mem, "reg", &[0, 0, 0x1000]);
        for index in [usize::MAX / 4, usize::MAX / 12, usize::MAX] {
            assert_eq!(
                tree.try_get_address(mem, index),
                Err(DtError::RegOutOfRange {
                    path: "/memory@0".into(),
                    index
                })
            );
        }
    }

    #[test]
    fn test_translate_overflowing_range_is_not_applied() {
        let mut tree = DeviceTree::new();
        let root = tree.root_id();
        tree.add_property_cell(root, "#address-cells", 2);
        tree.add_property_cell(root, "#size-cells", 1);
        let bus = tree.new_child(root, "bus").unwrap();
        tree.add_property_cell(bus, "#address-cells", 1);
        tree.add_property_cell(bus, "#size-cells", 1);
        tree.add_property_cells(bus, "ranges", &[0, 0xffff_ffff, 0xffff_ffff, 0x1000]);
        let dev = tree.new_child_addr(bus, "dev", 0x10).unwrap();
        tree.add_property_cells(dev, "reg", &[0x10, 4]);
        assert_eq!(tree.translate_address(dev, 0), 0x10);
    }
}
