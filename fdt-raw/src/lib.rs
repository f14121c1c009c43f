//! Raw FDT wire format support without tree abstractions.
//!
//! This crate is the format library underneath `devtree`: it knows the
//! binary layout of a Flattened Device Tree blob and nothing about how the
//! tree is modelled in memory.
//!
//! # Features
//!
//! - `#![no_std]` compatible (the writer needs `alloc`)
//! - Bounds-checked, zero-copy reading of the header, the memory reservation
//!   block and the structure block
//! - A sequential writer with a fixed byte budget that reports
//!   [`FdtError::NoSpace`] instead of growing
//!
//! # Example
//!
//! ```
//! use fdt_raw::{Fdt, FdtWriter, MemoryReservation, StructItem};
//!
//! let mut w = FdtWriter::new(0x1000);
//! w.add_reservation(MemoryReservation::new(0x3000_0000, 0x0100_0000))?;
//! w.finish_reservations()?;
//! w.begin_node("")?;
//! w.property_string("compatible", "ibm,powernv")?;
//! w.end_node()?;
//! let blob = w.finish()?;
//!
//! let fdt = Fdt::from_bytes(&blob)?;
//! assert_eq!(fdt.memory_reservations().count(), 1);
//! assert_eq!(fdt.walk().next(), Some(Ok(StructItem::BeginNode(""))));
//! # Ok::<(), fdt_raw::FdtError>(())
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(warnings, missing_docs)]

extern crate alloc;

pub mod data;
mod define;
mod fdt;
mod header;
mod walk;
mod writer;

pub use define::*;
pub use fdt::{Fdt, MemoryReservationIter};
pub use header::Header;
pub use walk::{MAX_DEPTH, StructItem, StructIter};
pub use writer::FdtWriter;
