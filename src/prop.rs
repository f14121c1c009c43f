use alloc::vec::Vec;

use fdt_raw::data::{StrIter, U32Iter};
use log::error;

use crate::Name;

/// A named byte-string value attached to a node.
///
/// Multi-byte integers are always stored big-endian, whatever the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub(crate) name: Name,
    pub(crate) data: Vec<u8>,
}

impl Property {
    pub fn new(name: impl Into<Name>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// A NUL-terminated string.
    pub fn from_string(name: impl Into<Name>, value: &str) -> Self {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Self::new(name, data)
    }

    /// At most `max_len` bytes of `value`, cut at the first NUL, then
    /// NUL-terminated.
    pub fn from_nstr(name: impl Into<Name>, value: &[u8], max_len: usize) -> Self {
        let value = &value[..value.len().min(max_len)];
        let len = value.iter().position(|&b| b == 0).unwrap_or(value.len());
        let mut data = Vec::with_capacity(len + 1);
        data.extend_from_slice(&value[..len]);
        data.push(0);
        Self::new(name, data)
    }

    /// Big-endian 32-bit cells.
    pub fn from_cells(name: impl Into<Name>, cells: &[u32]) -> Self {
        Self::new(name, encode_cells(cells))
    }

    /// Concatenated NUL-terminated strings. An empty list still yields one
    /// NUL byte.
    pub fn from_strings(name: impl Into<Name>, strings: &[&str]) -> Self {
        let mut data = Vec::new();
        for s in strings {
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        if data.is_empty() {
            data.push(0);
        }
        Self::new(name, data)
    }

    /// A 64-bit value stored as two big-endian cells, high cell first.
    pub fn from_u64(name: impl Into<Name>, value: u64) -> Self {
        Self::from_cells(name, &[(value >> 32) as u32, value as u32])
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `index`-th cell. Reading past the end is fatal.
    #[track_caller]
    pub fn cell(&self, index: usize) -> u32 {
        match self.try_cell(index) {
            Some(v) => v,
            None => {
                error!(
                    "DT: cell {} out of range in property {} ({} bytes)",
                    index,
                    self.name,
                    self.data.len()
                );
                panic!("cell {} out of range in property {}", index, self.name);
            }
        }
    }

    pub fn try_cell(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let bytes = self.data.get(start..start.checked_add(4)?)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u32_iter(&self) -> U32Iter<'_> {
        U32Iter::new(&self.data)
    }

    pub fn str_iter(&self) -> StrIter<'_> {
        StrIter::new(&self.data)
    }

    /// The value as a single cell, if it is exactly 4 bytes.
    pub fn as_u32(&self) -> Option<u32> {
        if self.data.len() != 4 {
            return None;
        }
        self.try_cell(0)
    }

    /// The value as two cells, if it is exactly 8 bytes.
    pub fn as_u64(&self) -> Option<u64> {
        if self.data.len() != 8 {
            return None;
        }
        Some(((self.try_cell(0)? as u64) << 32) | self.try_cell(1)? as u64)
    }

    /// The first string of the value.
    pub fn as_str(&self) -> Option<&str> {
        let bytes = self.data.as_slice();
        let len = bytes.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&bytes[..len]).ok()
    }

    /// Whether one of the NUL-separated entries equals `s`.
    pub fn contains_str(&self, s: &str) -> bool {
        self.str_iter().any(|entry| entry == s)
    }
}

pub(crate) fn encode_cells(cells: &[u32]) -> Vec<u8> {
    cells.iter().flat_map(|c| c.to_be_bytes()).collect()
}

/// Reads a big-endian number spanning `cells` cells; cells beyond two shift
/// the high bits out.
pub fn read_number(data: &[u8], cells: usize) -> u64 {
    U32Iter::new(data)
        .take(cells)
        .fold(0u64, |acc, cell| (acc << 32) | cell as u64)
}
