use alloc::string::String;

use fdt_raw::FdtError;

pub type DtResult<T = ()> = Result<T, DtError>;

/// Errors raised by tree mutation, required lookups and flattening.
///
/// The panicking entry points of [`crate::DeviceTree`] log one of these and
/// abort; the `try_*` forms hand it back instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DtError {
    /// A sibling with the same name already exists.
    #[error("duplicate node {name} under {parent}")]
    DuplicateNode { parent: String, name: String },
    /// The node already carries a property of that name.
    #[error("duplicate property {name} in node {path}")]
    DuplicateProperty { path: String, name: String },
    /// A required property is absent.
    #[error("missing required property {path}/{name}")]
    MissingProperty { path: String, name: String },
    /// A property does not have the expected length.
    #[error("unexpected property length {path}/{name}: expected {expected} got {actual}")]
    PropertyLength {
        path: String,
        name: String,
        expected: usize,
        actual: usize,
    },
    /// A phandle property is not a valid 4-byte handle.
    #[error("invalid phandle property in {path}")]
    InvalidPhandle { path: String },
    /// Two parsed phandles collide.
    #[error("phandle {phandle:#x} of {path} already used by {other}")]
    DuplicatePhandle {
        phandle: u32,
        path: String,
        other: String,
    },
    /// `reg` has fewer entries than the requested index.
    #[error("reg entry {index} out of range in {path}")]
    RegOutOfRange { path: String, index: usize },
    /// The node already has a parent.
    #[error("node {0} is already attached")]
    AlreadyAttached(String),
    /// Attaching would make a node its own ancestor.
    #[error("attaching {0} would create a cycle")]
    Cycle(String),
    /// A wire format error from the blob reader or writer.
    #[error("fdt: {0}")]
    Fdt(#[from] FdtError),
}

/// Logs `err` and aborts the caller.
#[track_caller]
pub(crate) fn fatal(err: DtError) -> ! {
    log::error!("DT: {}", err);
    panic!("{}", err)
}
