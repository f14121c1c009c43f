use crate::{
    FdtError, Header, MemoryReservation,
    data::Reader,
    walk::StructIter,
};

/// Memory reservation block iterator.
///
/// Stops at the terminating all-zero entry, or silently at the end of the
/// blob if the terminator is missing.
pub struct MemoryReservationIter<'a> {
    reader: Reader<'a>,
}

impl Iterator for MemoryReservationIter<'_> {
    type Item = MemoryReservation;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.reader.read_u64().ok()?;
        let size = self.reader.read_u64().ok()?;
        if address == 0 && size == 0 {
            return None;
        }
        Some(MemoryReservation { address, size })
    }
}

/// A validated, read-only view of a blob.
#[derive(Clone)]
pub struct Fdt<'a> {
    header: Header,
    data: &'a [u8],
}

impl<'a> Fdt<'a> {
    /// Parses and validates the header of `data`.
    ///
    /// The returned view is limited to `totalsize` bytes.
    pub fn from_bytes(data: &'a [u8]) -> Result<Fdt<'a>, FdtError> {
        let header = Header::from_bytes(data)?;
        header.validate(data.len())?;
        Ok(Fdt {
            data: &data[..header.totalsize as usize],
            header,
        })
    }

    /// The decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The blob bytes, `totalsize` long.
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Iterates the memory reservation block.
    pub fn memory_reservations(&self) -> MemoryReservationIter<'a> {
        MemoryReservationIter {
            reader: Reader::new(self.data, self.header.off_mem_rsvmap as usize),
        }
    }

    /// Walks the structure block.
    pub fn walk(&self) -> StructIter<'a> {
        let struct_start = self.header.off_dt_struct as usize;
        let struct_end = struct_start + self.header.size_dt_struct as usize;
        let strings_start = self.header.off_dt_strings as usize;
        let strings_end = strings_start + self.header.size_dt_strings as usize;
        StructIter::new(
            Reader::new(&self.data[..struct_end], struct_start),
            &self.data[strings_start..strings_end],
        )
    }
}
