//! Controller identity and mode flags.

use crate::types::address::Address;

/// Length of the local name as stored by the controller.
pub const NAME_LEN: usize = 248;

/// Controller mode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerFlags(u16);

impl ControllerFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Controller is powered.
    pub const UP: Self = Self(1 << 0);

    /// Inquiry scan is enabled.
    pub const DISCOVERABLE: Self = Self(1 << 1);

    /// Page scan is enabled.
    pub const CONNECTABLE: Self = Self(1 << 2);

    /// Incoming pairing is accepted.
    pub const PAIRABLE: Self = Self(1 << 3);

    /// Link-level authentication is required (security mode 3).
    pub const AUTH: Self = Self(1 << 4);

    /// Class and EIR updates are paused.
    pub const SERVICE_CACHE: Self = Self(1 << 5);

    /// Link keys were loaded by a client.
    pub const LINK_KEYS: Self = Self(1 << 6);

    /// Debug keys are accepted.
    pub const DEBUG_KEYS: Self = Self(1 << 7);

    /// Creates flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check if a flag is set.
    #[must_use]
    pub const fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0
    }

    /// Returns the flags with `flag` set or cleared, and whether anything
    /// changed.
    #[must_use]
    pub const fn with(self, flag: Self, on: bool) -> (Self, bool) {
        let next = if on {
            Self(self.0 | flag.0)
        } else {
            Self(self.0 & !flag.0)
        };
        (next, next.0 != self.0)
    }
}

/// Local IO capability used during pairing negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IoCapability {
    /// Display only.
    DisplayOnly = 0x00,
    /// Display with yes/no input.
    #[default]
    DisplayYesNo = 0x01,
    /// Keyboard only.
    KeyboardOnly = 0x02,
    /// No input and no output.
    NoInputNoOutput = 0x03,
}

impl IoCapability {
    /// Parses an IO capability from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::DisplayOnly),
            0x01 => Some(Self::DisplayYesNo),
            0x02 => Some(Self::KeyboardOnly),
            0x03 => Some(Self::NoInputNoOutput),
            _ => None,
        }
    }
}

/// Security level requested for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SecurityLevel {
    /// No security.
    #[default]
    Low,
    /// Encryption without man-in-the-middle protection.
    Medium,
    /// Encryption with man-in-the-middle protection; requires 16-digit PINs.
    High,
}

/// Authentication requirement passed to the transport when pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthType {
    /// Dedicated bonding without MITM protection.
    DedicatedBonding = 0x02,
    /// Dedicated bonding with MITM protection.
    DedicatedBondingMitm = 0x03,
}

impl AuthType {
    /// Security level and authentication type used to pair with a device
    /// advertising `io_cap`.
    #[must_use]
    pub const fn for_pairing(io_cap: u8) -> (SecurityLevel, Self) {
        if io_cap == IoCapability::NoInputNoOutput as u8 {
            (SecurityLevel::Medium, Self::DedicatedBonding)
        } else {
            (SecurityLevel::High, Self::DedicatedBondingMitm)
        }
    }
}

/// Static identity reported by a controller when it is registered.
#[derive(Debug, Clone)]
pub struct ControllerInfo {
    /// Controller index.
    pub index: u16,
    /// Controller type (0 = BR/EDR).
    pub dev_type: u8,
    /// Public device address.
    pub address: Address,
    /// LMP feature mask.
    pub features: [u8; 8],
    /// Manufacturer identifier.
    pub manufacturer: u16,
    /// HCI version.
    pub hci_version: u8,
    /// HCI revision.
    pub hci_revision: u16,
    /// Simple pairing mode (0 = disabled).
    pub ssp_mode: u8,
    /// Initial local name.
    pub name: Vec<u8>,
    /// Initial class of device.
    pub dev_class: [u8; 3],
}

impl ControllerInfo {
    /// Feature bit: extended inquiry response (byte 6).
    pub const FEATURE_EXT_INQUIRY: u8 = 0x01;

    /// Feature bit: secure simple pairing (byte 6).
    pub const FEATURE_SIMPLE_PAIRING: u8 = 0x08;

    /// Creates a BR/EDR controller identity with no features.
    #[must_use]
    pub const fn new(index: u16, address: Address) -> Self {
        Self {
            index,
            dev_type: 0,
            address,
            features: [0; 8],
            manufacturer: 0,
            hci_version: 0,
            hci_revision: 0,
            ssp_mode: 0,
            name: Vec::new(),
            dev_class: [0; 3],
        }
    }

    /// Sets the feature mask.
    #[must_use]
    pub const fn features(mut self, features: [u8; 8]) -> Self {
        self.features = features;
        self
    }

    /// Sets the simple pairing mode.
    #[must_use]
    pub const fn ssp_mode(mut self, mode: u8) -> Self {
        self.ssp_mode = mode;
        self
    }

    /// Sets the initial local name.
    #[must_use]
    pub fn name(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns true if the controller can carry an extended inquiry response.
    #[must_use]
    pub const fn supports_eir(&self) -> bool {
        self.features[6] & Self::FEATURE_EXT_INQUIRY != 0
    }

    /// Returns true if the controller supports secure simple pairing.
    #[must_use]
    pub const fn supports_simple_pairing(&self) -> bool {
        self.features[6] & Self::FEATURE_SIMPLE_PAIRING != 0
    }
}
