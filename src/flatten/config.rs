use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use fdt_raw::MemoryReservation;

/// Size of the first flattening attempt.
pub const DEFAULT_INITIAL_SIZE: usize = 0x10000;

/// Prefix of properties kept in memory only.
pub const DEFAULT_PRIVATE_PREFIX: &str = "skiboot,";

/// Which name the per-node phandle property is emitted under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhandleStyle {
    /// `linux,phandle`
    #[default]
    Linux,
    /// `phandle`
    Epapr,
}

impl PhandleStyle {
    pub fn property_name(&self) -> &'static str {
        match self {
            PhandleStyle::Linux => "linux,phandle",
            PhandleStyle::Epapr => "phandle",
        }
    }
}

/// Knobs of [`crate::create_dtb`].
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// Capacity of the first attempt; doubled on every retry.
    pub initial_size: usize,
    /// Entries of the memory reservation block, normally the firmware image.
    pub reservations: Vec<MemoryReservation>,
    pub boot_cpuid_phys: u32,
    pub phandle_style: PhandleStyle,
    /// Properties whose name starts with this are not emitted. Empty keeps
    /// everything.
    pub private_prefix: String,
    /// Emitted as `linux,stdout-path` under `/chosen`.
    pub stdout_path: Option<String>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            reservations: Vec::new(),
            boot_cpuid_phys: 0,
            phandle_style: PhandleStyle::default(),
            private_prefix: DEFAULT_PRIVATE_PREFIX.to_string(),
            stdout_path: None,
        }
    }
}

impl FlattenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    pub fn reserve(mut self, address: u64, size: u64) -> Self {
        self.reservations.push(MemoryReservation::new(address, size));
        self
    }

    pub fn boot_cpuid_phys(mut self, cpu: u32) -> Self {
        self.boot_cpuid_phys = cpu;
        self
    }

    pub fn phandle_style(mut self, style: PhandleStyle) -> Self {
        self.phandle_style = style;
        self
    }

    pub fn private_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.private_prefix = prefix.into();
        self
    }

    pub fn stdout_path(mut self, path: impl Into<String>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }

    pub(crate) fn is_private(&self, name: &str) -> bool {
        !self.private_prefix.is_empty() && name.starts_with(self.private_prefix.as_str())
    }
}
