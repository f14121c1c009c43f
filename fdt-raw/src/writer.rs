//! Sequential FDT writer with a fixed byte budget.
//!
//! [`FdtWriter`] emits a blob front to back: reservations first, then the
//! node structure, then [`FdtWriter::finish`]. The writer is created with a
//! capacity and checks every write against it before touching any buffer, so
//! an overflowing call fails with [`FdtError::NoSpace`] and leaves no partial
//! token behind. Callers that can afford it retry with a bigger capacity.

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use crate::{
    FdtError, Header, MemoryReservation, Token,
    define::{
        FDT_HEADER_SIZE, FDT_LAST_COMP_VERSION, FDT_MAGIC, FDT_RESERVE_ENTRY_SIZE, FDT_VERSION,
        align4,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Reservations,
    Structure,
}

/// Bounded sequential writer producing a version 17 blob.
pub struct FdtWriter {
    capacity: usize,
    boot_cpuid_phys: u32,
    rsvmap: Vec<u8>,
    structure: Vec<u8>,
    strings: Vec<u8>,
    string_offsets: BTreeMap<String, u32>,
    depth: usize,
    stage: Stage,
}

impl FdtWriter {
    /// Creates a writer whose finished blob may not exceed `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            boot_cpuid_phys: 0,
            rsvmap: Vec::new(),
            structure: Vec::new(),
            strings: Vec::new(),
            string_offsets: BTreeMap::new(),
            depth: 0,
            stage: Stage::Reservations,
        }
    }

    /// The byte budget of this writer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes the blob would take if finished now, including the reservation
    /// terminator and the end token.
    pub fn len(&self) -> usize {
        FDT_HEADER_SIZE
            + self.rsvmap.len()
            + FDT_RESERVE_ENTRY_SIZE
            + self.structure.len()
            + 4
            + self.strings.len()
    }

    /// Whether nothing beyond the fixed parts has been written.
    pub fn is_empty(&self) -> bool {
        self.rsvmap.is_empty() && self.structure.is_empty()
    }

    /// Current node nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Sets the `boot_cpuid_phys` header field.
    pub fn set_boot_cpuid_phys(&mut self, boot_cpuid_phys: u32) {
        self.boot_cpuid_phys = boot_cpuid_phys;
    }

    fn reserve(&self, extra: usize) -> Result<(), FdtError> {
        if self.len() + extra > self.capacity {
            return Err(FdtError::NoSpace {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Appends a memory reservation entry.
    pub fn add_reservation(&mut self, rsv: MemoryReservation) -> Result<(), FdtError> {
        if self.stage != Stage::Reservations {
            return Err(FdtError::BadState("reservation after structure"));
        }
        self.reserve(FDT_RESERVE_ENTRY_SIZE)?;
        self.rsvmap.extend_from_slice(&rsv.address.to_be_bytes());
        self.rsvmap.extend_from_slice(&rsv.size.to_be_bytes());
        Ok(())
    }

    /// Closes the reservation block; further reservations are rejected.
    pub fn finish_reservations(&mut self) -> Result<(), FdtError> {
        if self.stage != Stage::Reservations {
            return Err(FdtError::BadState("reservations already finished"));
        }
        self.stage = Stage::Structure;
        Ok(())
    }

    fn push_token(&mut self, token: Token) {
        self.structure
            .extend_from_slice(&u32::from(token).to_be_bytes());
    }

    fn push_padded(&mut self, bytes: &[u8], padded_len: usize) {
        self.structure.extend_from_slice(bytes);
        self.structure
            .resize(self.structure.len() + padded_len - bytes.len(), 0);
    }

    /// Opens a node. The root node has an empty name.
    pub fn begin_node(&mut self, name: &str) -> Result<(), FdtError> {
        if name.as_bytes().contains(&0) {
            return Err(FdtError::InvalidString);
        }
        if self.stage == Stage::Reservations {
            self.stage = Stage::Structure;
        }
        if self.depth == 0 && !self.structure.is_empty() {
            return Err(FdtError::BadState("second root node"));
        }
        let padded = align4(name.len() + 1);
        self.reserve(4 + padded)?;
        self.push_token(Token::BeginNode);
        self.push_padded(name.as_bytes(), padded);
        self.depth += 1;
        Ok(())
    }

    /// Closes the innermost open node.
    pub fn end_node(&mut self) -> Result<(), FdtError> {
        if self.depth == 0 {
            return Err(FdtError::BadState("end node without open node"));
        }
        self.reserve(4)?;
        self.push_token(Token::EndNode);
        self.depth -= 1;
        Ok(())
    }

    /// Adds a property with a raw value to the innermost open node.
    pub fn property(&mut self, name: &str, data: &[u8]) -> Result<(), FdtError> {
        if self.depth == 0 {
            return Err(FdtError::BadState("property outside node"));
        }
        if name.is_empty() || name.as_bytes().contains(&0) {
            return Err(FdtError::InvalidString);
        }
        let len = u32::try_from(data.len()).map_err(|_| FdtError::InvalidInput)?;
        let new_string = !self.string_offsets.contains_key(name);
        let string_cost = if new_string { name.len() + 1 } else { 0 };
        let padded = align4(data.len());
        self.reserve(12 + padded + string_cost)?;

        let nameoff = match self.string_offsets.get(name) {
            Some(off) => *off,
            None => {
                let off = self.strings.len() as u32;
                self.strings.extend_from_slice(name.as_bytes());
                self.strings.push(0);
                self.string_offsets.insert(String::from(name), off);
                off
            }
        };

        self.push_token(Token::Prop);
        self.structure.extend_from_slice(&len.to_be_bytes());
        self.structure.extend_from_slice(&nameoff.to_be_bytes());
        self.push_padded(data, padded);
        Ok(())
    }

    /// Adds a single big-endian cell.
    pub fn property_u32(&mut self, name: &str, value: u32) -> Result<(), FdtError> {
        self.property(name, &value.to_be_bytes())
    }

    /// Adds a list of big-endian cells.
    pub fn property_cells(&mut self, name: &str, cells: &[u32]) -> Result<(), FdtError> {
        let data: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.property(name, &data)
    }

    /// Adds a NUL-terminated string.
    pub fn property_string(&mut self, name: &str, value: &str) -> Result<(), FdtError> {
        if value.as_bytes().contains(&0) {
            return Err(FdtError::InvalidString);
        }
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.property(name, &data)
    }

    /// Terminates the structure block and lays out the final blob.
    pub fn finish(mut self) -> Result<Vec<u8>, FdtError> {
        if self.depth != 0 {
            return Err(FdtError::BadState("unclosed node"));
        }
        if self.structure.is_empty() {
            return Err(FdtError::BadState("no root node"));
        }
        let total = self.len();
        if total > self.capacity {
            return Err(FdtError::NoSpace {
                capacity: self.capacity,
            });
        }
        self.push_token(Token::End);

        let off_mem_rsvmap = FDT_HEADER_SIZE;
        let off_dt_struct = off_mem_rsvmap + self.rsvmap.len() + FDT_RESERVE_ENTRY_SIZE;
        let off_dt_strings = off_dt_struct + self.structure.len();
        let totalsize = off_dt_strings + self.strings.len();
        let as_u32 = |v: usize| u32::try_from(v).map_err(|_| FdtError::InvalidInput);

        let header = Header {
            magic: FDT_MAGIC,
            totalsize: as_u32(totalsize)?,
            off_dt_struct: as_u32(off_dt_struct)?,
            off_dt_strings: as_u32(off_dt_strings)?,
            off_mem_rsvmap: as_u32(off_mem_rsvmap)?,
            version: FDT_VERSION,
            last_comp_version: FDT_LAST_COMP_VERSION,
            boot_cpuid_phys: self.boot_cpuid_phys,
            size_dt_strings: as_u32(self.strings.len())?,
            size_dt_struct: as_u32(self.structure.len())?,
        };

        let mut blob = Vec::with_capacity(totalsize);
        blob.extend_from_slice(&header.to_bytes());
        blob.extend_from_slice(&self.rsvmap);
        blob.extend_from_slice(&[0u8; FDT_RESERVE_ENTRY_SIZE]);
        blob.extend_from_slice(&self.structure);
        blob.extend_from_slice(&self.strings);
        Ok(blob)
    }
}
