//! 128-bit service UUIDs.

use std::fmt;

/// Length of a UUID in bytes.
pub const UUID_LEN: usize = 16;

/// Base UUID `00000000-0000-1000-8000-00805F9B34FB` in wire (little-endian)
/// order. Short UUIDs occupy the last four bytes.
pub const BASE_UUID: [u8; UUID_LEN] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A 128-bit UUID in wire (little-endian) order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Uuid128([u8; UUID_LEN]);

impl Uuid128 {
    /// The all-zero UUID, used as a wildcard by `remove_uuid`.
    pub const NIL: Self = Self([0; UUID_LEN]);

    /// Creates a UUID from wire-order bytes.
    #[must_use]
    pub const fn new(bytes: [u8; UUID_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds the full UUID for a 16-bit short UUID.
    #[must_use]
    pub const fn from_u16(short: u16) -> Self {
        let mut bytes = BASE_UUID;
        let le = short.to_le_bytes();
        bytes[12] = le[0];
        bytes[13] = le[1];
        Self(bytes)
    }

    /// Returns the UUID in wire order.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; UUID_LEN] {
        &self.0
    }

    /// Returns true for the all-zero UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Reduces the UUID to its 16-bit form.
    ///
    /// Returns `None` if the UUID is not derived from the base UUID or does
    /// not fit in 16 bits.
    #[must_use]
    pub fn to_u16(&self) -> Option<u16> {
        if self.0[..12] != BASE_UUID[..12] {
            return None;
        }
        let value = u32::from_le_bytes([self.0[12], self.0[13], self.0[14], self.0[15]]);
        u16::try_from(value).ok()
    }

    /// Returns the UUID as a hex string in wire order.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u16() {
            Some(short) => write!(f, "Uuid128({short:#06x})"),
            None => write!(f, "Uuid128({})", self.to_hex()),
        }
    }
}

/// A registered service UUID with its service-class hint bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceUuid {
    /// The service UUID.
    pub uuid: Uuid128,
    /// Bits OR-ed into the service-class byte of the class of device.
    pub svc_hint: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uuid_round_trip() {
        let uuid = Uuid128::from_u16(0x110B);
        assert_eq!(uuid.to_u16(), Some(0x110B));
        assert_eq!(&uuid.as_bytes()[..12], &BASE_UUID[..12]);
    }

    #[test]
    fn test_non_base_uuid() {
        let mut bytes = BASE_UUID;
        bytes[0] = 0x00;
        assert_eq!(Uuid128::new(bytes).to_u16(), None);
    }

    #[test]
    fn test_32_bit_uuid_does_not_reduce() {
        let mut bytes = BASE_UUID;
        bytes[12] = 0x01;
        bytes[14] = 0x01;
        assert_eq!(Uuid128::new(bytes).to_u16(), None);
    }

    #[test]
    fn test_hex() {
        let uuid = Uuid128::from_u16(0x1101);
        assert!(uuid.to_hex().starts_with("fb349b5f"));
        assert!(Uuid128::NIL.is_nil());
    }
}
