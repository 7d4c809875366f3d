//! Device addresses and link types.

use std::fmt;

/// Length of a device address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// A 6-byte device address, stored in wire (little-endian) order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero wildcard address.
    pub const ANY: Self = Self([0; ADDRESS_LEN]);

    /// Creates an address from wire-order bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Tries to create an address from a byte slice.
    ///
    /// Returns `None` if the slice is not exactly 6 bytes.
    #[must_use]
    pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Returns the address in wire order.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Returns true for the wildcard address.
    #[must_use]
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    /// Parses the conventional `AA:BB:CC:DD:EE:FF` notation (most significant
    /// byte first).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut bytes = [0u8; ADDRESS_LEN];
        let mut parts = text.split(':');
        for slot in bytes.iter_mut().rev() {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *slot = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

/// Physical link type of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// BR/EDR asynchronous link.
    Acl,
    /// Low energy link.
    Le,
}
