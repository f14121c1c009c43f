//! Core type definitions and constants of the FDT wire format.
//!
//! This module provides the magic number, the structure block tokens, the
//! phandle newtype, memory reservation entries and the error type shared by
//! the reader, the walker and the writer.

use core::fmt::{Debug, Display};

/// The magic number that identifies a valid Flattened Device Tree blob.
pub const FDT_MAGIC: u32 = 0xd00dfeed;

/// Version written into every blob produced by [`crate::FdtWriter`].
pub const FDT_VERSION: u32 = 17;

/// Oldest version a blob produced by [`crate::FdtWriter`] stays compatible with.
pub const FDT_LAST_COMP_VERSION: u32 = 16;

/// Oldest blob version accepted by [`crate::Fdt::from_bytes`].
pub const FDT_FIRST_SUPPORTED_VERSION: u32 = 16;

/// Size of the fixed header in bytes.
pub const FDT_HEADER_SIZE: usize = 40;

/// Size of one memory reservation entry in bytes.
pub const FDT_RESERVE_ENTRY_SIZE: usize = 16;

/// Entry in the memory reservation block.
///
/// Each entry names a physical range the operating system must leave alone,
/// typically the firmware image that produced the blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryReservation {
    /// Physical address of the reserved region
    pub address: u64,
    /// Size of the reserved region in bytes
    pub size: u64,
}

impl MemoryReservation {
    /// Creates a reservation entry.
    pub const fn new(address: u64, size: u64) -> Self {
        Self { address, size }
    }
}

/// Token type of the FDT structure block.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token {
    /// Beginning of a node (FDT_BEGIN_NODE, 0x00000001)
    BeginNode,
    /// End of a node (FDT_END_NODE, 0x00000002)
    EndNode,
    /// A property (FDT_PROP, 0x00000003)
    Prop,
    /// No-op, ignored by readers (FDT_NOP, 0x00000004)
    Nop,
    /// End of the structure block (FDT_END, 0x00000009)
    End,
    /// Any other 32-bit value
    Data(u32),
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        match value {
            0x1 => Token::BeginNode,
            0x2 => Token::EndNode,
            0x3 => Token::Prop,
            0x4 => Token::Nop,
            0x9 => Token::End,
            _ => Token::Data(value),
        }
    }
}

impl From<Token> for u32 {
    fn from(value: Token) -> Self {
        match value {
            Token::BeginNode => 0x1,
            Token::EndNode => 0x2,
            Token::Prop => 0x3,
            Token::Nop => 0x4,
            Token::End => 0x9,
            Token::Data(v) => v,
        }
    }
}

/// A phandle (pointer handle) referencing a device tree node.
///
/// `0` and `0xffffffff` are reserved and never name a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Phandle(u32);

impl From<u32> for Phandle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Phandle> for u32 {
    fn from(value: Phandle) -> Self {
        value.0
    }
}

impl Phandle {
    /// Returns the raw u32 value of this phandle.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Whether the value may be used to name a node.
    pub const fn is_valid(&self) -> bool {
        self.0 != 0 && self.0 != u32::MAX
    }
}

impl Display for Phandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "<{:#x}>", self.0)
    }
}

/// Errors raised while reading or writing a blob.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FdtError {
    /// A requested item was not found
    #[error("not found")]
    NotFound,
    /// The input ended before the item at `pos` could be read
    #[error("buffer too small at position {pos}")]
    BufferTooSmall {
        /// Offset at which the read ran out of data
        pos: usize,
    },
    /// The header magic does not match [`FDT_MAGIC`]
    #[error("invalid magic number {0:#x} != {FDT_MAGIC:#x}")]
    InvalidMagic(u32),
    /// The input is malformed
    #[error("invalid input")]
    InvalidInput,
    /// The blob version is older than the oldest supported one
    #[error("unsupported version {0}")]
    BadVersion(u32),
    /// A header offset or size points outside the blob
    #[error("block {0} lies outside the blob")]
    BadOffset(&'static str),
    /// Unexpected token in the structure block
    #[error("unexpected token {token:#x} at offset {pos:#x}")]
    BadStructure {
        /// Raw token value
        token: u32,
        /// Offset of the token inside the blob
        pos: usize,
    },
    /// A name contains a NUL byte or is not NUL terminated
    #[error("invalid string")]
    InvalidString,
    /// A name is not valid UTF-8
    #[error("failed to parse UTF-8 string")]
    Utf8Parse,
    /// The output buffer is too small for the blob being written
    #[error("no space left in a {capacity} byte buffer")]
    NoSpace {
        /// Capacity of the buffer that overflowed
        capacity: usize,
    },
    /// A writer call was made in the wrong sequence
    #[error("writer used out of sequence: {0}")]
    BadState(&'static str),
}

impl From<core::str::Utf8Error> for FdtError {
    fn from(_: core::str::Utf8Error) -> Self {
        FdtError::Utf8Parse
    }
}

impl From<core::ffi::FromBytesUntilNulError> for FdtError {
    fn from(_: core::ffi::FromBytesUntilNulError) -> Self {
        FdtError::InvalidString
    }
}

/// Rounds `len` up to the next multiple of 4.
pub const fn align4(len: usize) -> usize {
    (len + 3) & !3
}
