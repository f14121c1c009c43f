//! DTS-style rendering of a tree.

use alloc::{format, string::String, vec::Vec};
use core::fmt;

use fdt_raw::MemoryReservation;

use crate::{DeviceTree, NodeId, Property};

fn indent(level: usize) -> String {
    "    ".repeat(level)
}

impl Property {
    /// The property as a DTS source line, without indentation.
    pub fn format_dts(&self) -> String {
        let data = self.data();
        if data.is_empty() {
            return format!("{};", self.name());
        }

        if let Some(strs) = printable_strings(data) {
            let strs_fmt: Vec<String> = strs
                .iter()
                .map(|s| format!("\"{}\"", escape_string(s)))
                .collect();
            return format!("{} = {};", self.name(), strs_fmt.join(", "));
        }

        if data.len().is_multiple_of(4) {
            let values: Vec<String> = self.u32_iter().map(|v| format!("{:#x}", v)).collect();
            return format!("{} = <{}>;", self.name(), values.join(" "));
        }

        let bytes: Vec<String> = data.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{} = [{}];", self.name(), bytes.join(" "))
    }
}

/// Splits `data` into strings when it is a NUL-terminated list of non-empty
/// printable entries.
fn printable_strings(data: &[u8]) -> Option<Vec<&str>> {
    let body = data.strip_suffix(&[0])?;
    body.split(|&b| b == 0)
        .map(|s| {
            if s.is_empty() || !s.iter().all(|b| (0x20..0x7f).contains(b)) {
                return None;
            }
            core::str::from_utf8(s).ok()
        })
        .collect()
}

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            _ => result.push(c),
        }
    }
    result
}

/// Display adapter returned by [`DeviceTree::display`].
pub struct DisplayNode<'a> {
    tree: &'a DeviceTree,
    node: NodeId,
    reservations: &'a [MemoryReservation],
}

impl<'a> DisplayNode<'a> {
    /// `/memreserve/` entries printed after the version tag of a root
    /// rendering.
    pub fn reservations(mut self, reservations: &'a [MemoryReservation]) -> Self {
        self.reservations = reservations;
        self
    }

    fn fmt_level(&self, f: &mut fmt::Formatter<'_>, node: NodeId, level: usize) -> fmt::Result {
        let n = self.tree.node(node);
        let indent_str = indent(level);
        let node_name = if n.name().is_empty() { "/" } else { n.name() };

        writeln!(f, "{}{} {{", indent_str, node_name)?;
        writeln!(f, "{}    phandle = <{:#x}>;", indent_str, n.phandle().raw())?;
        for prop in n.properties() {
            writeln!(f, "{}    {}", indent_str, prop.format_dts())?;
        }
        if !n.children().is_empty() {
            writeln!(f)?;
        }
        for &child in n.children() {
            self.fmt_level(f, child, level + 1)?;
        }
        writeln!(f, "{}}};", indent_str)
    }
}

impl fmt::Display for DisplayNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.node == self.tree.root_id() {
            writeln!(f, "/dts-v1/;")?;
            writeln!(f)?;
            for rsv in self.reservations {
                writeln!(f, "/memreserve/ {:#x} {:#x};", rsv.address, rsv.size)?;
            }
            if !self.reservations.is_empty() {
                writeln!(f)?;
            }
        }
        self.fmt_level(f, self.node, 0)
    }
}

impl DeviceTree {
    /// Renders `node` and its subtree as DTS source.
    pub fn display(&self, node: NodeId) -> DisplayNode<'_> {
        DisplayNode {
            tree: self,
            node,
            reservations: &[],
        }
    }
}
