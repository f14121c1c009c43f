//! FDT header encoding and decoding.
//!
//! Every blob begins with this fixed 40-byte header. All fields are stored
//! big-endian on the wire.

use crate::{
    FdtError,
    data::Reader,
    define::{FDT_FIRST_SUPPORTED_VERSION, FDT_HEADER_SIZE, FDT_MAGIC, FDT_RESERVE_ENTRY_SIZE},
};

/// The FDT header structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// FDT header magic number (must be 0xd00dfeed)
    pub magic: u32,
    /// Total size in bytes of the blob
    pub totalsize: u32,
    /// Offset of the structure block
    pub off_dt_struct: u32,
    /// Offset of the strings block
    pub off_dt_strings: u32,
    /// Offset of the memory reservation block
    pub off_mem_rsvmap: u32,
    /// FDT version number
    pub version: u32,
    /// Last compatible FDT version
    pub last_comp_version: u32,
    /// Physical ID of the boot CPU
    pub boot_cpuid_phys: u32,
    /// Length in bytes of the strings block
    pub size_dt_strings: u32,
    /// Length in bytes of the structure block
    pub size_dt_struct: u32,
}

impl Header {
    /// Reads a header from the start of `data` and checks its magic.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if fewer than 40 bytes are available,
    /// `InvalidMagic` if the magic does not match.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FdtError> {
        let mut reader = Reader::new(data, 0);
        let magic = reader.read_u32()?;
        if magic != FDT_MAGIC {
            return Err(FdtError::InvalidMagic(magic));
        }
        if data.len() < FDT_HEADER_SIZE {
            return Err(FdtError::BufferTooSmall {
                pos: FDT_HEADER_SIZE,
            });
        }
        Ok(Header {
            magic,
            totalsize: reader.read_u32()?,
            off_dt_struct: reader.read_u32()?,
            off_dt_strings: reader.read_u32()?,
            off_mem_rsvmap: reader.read_u32()?,
            version: reader.read_u32()?,
            last_comp_version: reader.read_u32()?,
            boot_cpuid_phys: reader.read_u32()?,
            size_dt_strings: reader.read_u32()?,
            size_dt_struct: reader.read_u32()?,
        })
    }

    /// Encodes the header in wire order.
    pub fn to_bytes(&self) -> [u8; FDT_HEADER_SIZE] {
        let fields = [
            self.magic,
            self.totalsize,
            self.off_dt_struct,
            self.off_dt_strings,
            self.off_mem_rsvmap,
            self.version,
            self.last_comp_version,
            self.boot_cpuid_phys,
            self.size_dt_strings,
            self.size_dt_struct,
        ];
        let mut out = [0u8; FDT_HEADER_SIZE];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
        out
    }

    /// Sanity checks the header against a blob of `len` bytes.
    ///
    /// Verifies the version, that `totalsize` fits in `len` and that every
    /// block lies inside `totalsize`.
    pub fn validate(&self, len: usize) -> Result<(), FdtError> {
        if self.magic != FDT_MAGIC {
            return Err(FdtError::InvalidMagic(self.magic));
        }
        if self.version < FDT_FIRST_SUPPORTED_VERSION {
            return Err(FdtError::BadVersion(self.version));
        }
        let total = self.totalsize as usize;
        if total > len {
            return Err(FdtError::BufferTooSmall { pos: total });
        }
        let within = |off: u32, size: usize| {
            (off as usize)
                .checked_add(size)
                .is_some_and(|end| off as usize >= FDT_HEADER_SIZE && end <= total)
        };
        if !within(self.off_mem_rsvmap, FDT_RESERVE_ENTRY_SIZE) {
            return Err(FdtError::BadOffset("memory reservation"));
        }
        if !within(self.off_dt_struct, self.size_dt_struct as usize) {
            return Err(FdtError::BadOffset("structure"));
        }
        if !within(self.off_dt_strings, self.size_dt_strings as usize) {
            return Err(FdtError::BadOffset("strings"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define::{FDT_LAST_COMP_VERSION, FDT_VERSION};

    fn sample() -> Header {
        Header {
            magic: FDT_MAGIC,
            totalsize: 0x80,
            off_dt_struct: 0x48,
            off_dt_strings: 0x78,
            off_mem_rsvmap: 0x28,
            version: FDT_VERSION,
            last_comp_version: FDT_LAST_COMP_VERSION,
            boot_cpuid_phys: 0,
            size_dt_strings: 8,
            size_dt_struct: 0x30,
        }
    }

    #[test]
    fn test_header_bytes_are_big_endian() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[..4], &[0xd0, 0x0d, 0xfe, 0xed]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0x80]);
        assert_eq!(Header::from_bytes(&bytes), Ok(sample()));
    }

    #[test]
    fn test_validate() {
        let header = sample();
        assert_eq!(header.validate(0x80), Ok(()));
        assert_eq!(
            header.validate(0x40),
            Err(FdtError::BufferTooSmall { pos: 0x80 })
        );

        let mut bad = sample();
        bad.size_dt_strings = 0x100;
        assert_eq!(bad.validate(0x80), Err(FdtError::BadOffset("strings")));

        let mut old = sample();
        old.version = 3;
        assert_eq!(old.validate(0x80), Err(FdtError::BadVersion(3)));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample().to_bytes();
        bytes[0] = 0;
        assert_eq!(
            Header::from_bytes(&bytes),
            Err(FdtError::InvalidMagic(0x000dfeed))
        );
    }
}
