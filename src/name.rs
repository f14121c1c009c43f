use alloc::string::String;
use core::{fmt, ops::Deref};

/// Name storage for nodes and properties.
///
/// Literal names are kept as `&'static str` without copying; names built at
/// run time (unit addresses, names read from a blob) are owned.
#[derive(Clone, Debug)]
pub enum Name {
    Static(&'static str),
    Owned(String),
}

impl Name {
    pub fn as_str(&self) -> &str {
        match self {
            Name::Static(s) => s,
            Name::Owned(s) => s.as_str(),
        }
    }

    /// Whether the name borrows static storage.
    pub fn is_static(&self) -> bool {
        matches!(self, Name::Static(_))
    }

    /// Splits `name@address` into its two parts; the address is empty when
    /// there is no `@`.
    pub fn split_unit_address(&self) -> (&str, &str) {
        split_unit_address(self.as_str())
    }
}

pub(crate) fn split_unit_address(name: &str) -> (&str, &str) {
    match name.split_once('@') {
        Some((base, addr)) => (base, addr),
        None => (name, ""),
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for Name {
    fn from(value: &'static str) -> Self {
        Name::Static(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::Owned(value)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Name {}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
