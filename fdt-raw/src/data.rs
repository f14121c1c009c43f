//! Low-level data access primitives.
//!
//! [`Reader`] is a bounds-checked big-endian cursor over a blob; every read
//! either returns the requested item or an error naming the offset at which
//! the data ran out.

use core::ffi::CStr;

use crate::define::{FdtError, Token, align4};

/// Sequential reader over a byte slice.
#[derive(Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at `pos` inside `data`.
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current offset inside the underlying slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Reads `size` bytes, advancing the position.
    pub fn read_bytes(&mut self, size: usize) -> Result<&'a [u8], FdtError> {
        let end = self
            .pos
            .checked_add(size)
            .filter(|end| *end <= self.data.len())
            .ok_or(FdtError::BufferTooSmall { pos: self.pos })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Reads a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, FdtError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a big-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, FdtError> {
        let high = self.read_u32()? as u64;
        let low = self.read_u32()? as u64;
        Ok((high << 32) | low)
    }

    /// Reads a structure block token.
    pub fn read_token(&mut self) -> Result<Token, FdtError> {
        self.read_u32().map(Token::from)
    }

    /// Reads a NUL-terminated string and skips the padding up to the next
    /// 4-byte boundary.
    pub fn read_padded_str(&mut self) -> Result<&'a str, FdtError> {
        let start = self.pos;
        let rest = self
            .data
            .get(start..)
            .ok_or(FdtError::BufferTooSmall { pos: start })?;
        let name = CStr::from_bytes_until_nul(rest)?.to_str()?;
        self.read_bytes(align4(name.len() + 1))?;
        Ok(name)
    }

    /// Skips padding up to the next 4-byte boundary.
    pub fn align(&mut self) -> Result<(), FdtError> {
        let pad = align4(self.pos) - self.pos;
        self.read_bytes(pad).map(|_| ())
    }
}

/// Looks up the NUL-terminated string at `offset` inside a strings block.
pub fn string_at(strings: &[u8], offset: usize) -> Result<&str, FdtError> {
    let rest = strings
        .get(offset..)
        .ok_or(FdtError::BufferTooSmall { pos: offset })?;
    Ok(CStr::from_bytes_until_nul(rest)?.to_str()?)
}

/// Iterator over big-endian u32 cells of a property value.
///
/// A trailing partial cell is ignored.
#[derive(Clone)]
pub struct U32Iter<'a> {
    chunks: core::slice::ChunksExact<'a, u8>,
}

impl<'a> U32Iter<'a> {
    /// Iterates the cells of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            chunks: data.chunks_exact(4),
        }
    }
}

impl Iterator for U32Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
    }
}

/// Iterator over the NUL-separated strings of a property value.
///
/// Stops at the first chunk that is not valid UTF-8.
#[derive(Clone)]
pub struct StrIter<'a> {
    rest: &'a [u8],
}

impl<'a> StrIter<'a> {
    /// Iterates the strings of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl<'a> Iterator for StrIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let end = self
            .rest
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.rest.len());
        let s = core::str::from_utf8(&self.rest[..end]).ok()?;
        self.rest = self.rest.get(end + 1..).unwrap_or(&[]);
        Some(s)
    }
}
