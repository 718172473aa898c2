use std::{
    fmt::{self, Display},
    ops::Deref,
};

use serde::{Deserialize, Serialize};

/// The addressing scheme a recipient belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    /// An internet mail address (`local@domain`).
    Rfc822,
    /// A newsgroup name.
    News,
}

impl AddressKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rfc822 => "rfc822",
            Self::News => "news",
        }
    }
}

impl Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recipient, tagged with its addressing scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientAddress {
    kind: AddressKind,
    address: String,
}

impl RecipientAddress {
    pub fn new(kind: AddressKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }

    pub fn rfc822(address: impl Into<String>) -> Self {
        Self::new(AddressKind::Rfc822, address)
    }

    pub fn news(group: impl Into<String>) -> Self {
        Self::new(AddressKind::News, group)
    }

    pub const fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Display for RecipientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Borrowed view over an ordered set of recipients, displayed as `[a, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientList<'a>(pub &'a [RecipientAddress]);

impl Display for RecipientList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, addr) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            Display::fmt(addr, f)?;
        }
        f.write_str("]")
    }
}

impl<'a> From<&'a [RecipientAddress]> for RecipientList<'a> {
    fn from(value: &'a [RecipientAddress]) -> Self {
        Self(value)
    }
}

impl<'a> From<&'a Vec<RecipientAddress>> for RecipientList<'a> {
    fn from(value: &'a Vec<RecipientAddress>) -> Self {
        Self(value.as_slice())
    }
}

impl Deref for RecipientList<'_> {
    type Target = [RecipientAddress];

    fn deref(&self) -> &Self::Target {
        self.0
    }
}
