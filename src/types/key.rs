//! Bonding keys and out-of-band pairing data.

use crate::types::address::Address;

/// Length of a key value in bytes.
pub const KEY_LEN: usize = 16;

/// Key type of an LE long-term key.
pub const KEY_TYPE_LTK: u8 = 0x81;

/// Length of the extra data carried by a long-term key (`ediv` + `rand`).
pub const MASTER_ID_LEN: usize = 10;

/// A stored bonding key for one remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkKey {
    /// Remote device address.
    pub address: Address,
    /// Key type (combination, authenticated, long-term, ...).
    pub key_type: u8,
    /// Key value.
    pub value: [u8; KEY_LEN],
    /// Length of the PIN used to derive the key.
    pub pin_len: u8,
    /// Type-specific extra data.
    pub data: Vec<u8>,
}

impl LinkKey {
    /// Creates a BR/EDR link key without extra data.
    #[must_use]
    pub const fn new(address: Address, key_type: u8, value: [u8; KEY_LEN], pin_len: u8) -> Self {
        Self {
            address,
            key_type,
            value,
            pin_len,
            data: Vec::new(),
        }
    }

    /// Returns true for LE long-term keys.
    #[must_use]
    pub const fn is_long_term(&self) -> bool {
        self.key_type == KEY_TYPE_LTK
    }

    /// Returns the `(ediv, rand)` pair of a long-term key.
    ///
    /// Returns `None` for other key types or malformed extra data.
    #[must_use]
    pub fn master_id(&self) -> Option<(u16, [u8; 8])> {
        if !self.is_long_term() || self.data.len() != MASTER_ID_LEN {
            return None;
        }
        let ediv = u16::from_le_bytes([self.data[0], self.data[1]]);
        let mut rand = [0u8; 8];
        rand.copy_from_slice(&self.data[2..]);
        Some((ediv, rand))
    }
}

/// Out-of-band pairing data received for a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOobData {
    /// Remote device address.
    pub address: Address,
    /// Simple pairing hash C.
    pub hash: [u8; 16],
    /// Simple pairing randomizer R.
    pub randomizer: [u8; 16],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_id() {
        let mut key = LinkKey::new(Address::new([1; 6]), KEY_TYPE_LTK, [0xAA; 16], 0);
        key.data = vec![0x34, 0x12, 1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(key.master_id(), Some((0x1234, [1, 2, 3, 4, 5, 6, 7, 8])));

        key.data.pop();
        assert_eq!(key.master_id(), None);
    }

    #[test]
    fn test_link_key_has_no_master_id() {
        let key = LinkKey::new(Address::new([1; 6]), 0x04, [0xAA; 16], 4);
        assert!(!key.is_long_term());
        assert_eq!(key.master_id(), None);
    }
}
