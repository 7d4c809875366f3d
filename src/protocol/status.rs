//! Status codes carried by `CMD_STATUS` replies.
//!
//! The values follow the errno numbering of the transport's error domain so
//! that a status byte can be logged and compared directly against it.

/// Wire status code of a command reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Command succeeded.
    Success = 0x00,
    /// Opcode is not known to this interface.
    UnknownCommand = 0x01,
    /// Entry does not exist (`ENOENT`).
    NotFound = 2,
    /// Controller reported a failure (`EIO`).
    Io = 5,
    /// Address is not usable for this operation (`EBADF`).
    BadAddress = 9,
    /// Out of memory (`ENOMEM`).
    NoMemory = 12,
    /// A conflicting command is in flight (`EBUSY`).
    Busy = 16,
    /// Entry already exists (`EEXIST`).
    Exists = 17,
    /// Unknown controller index (`ENODEV`).
    NoDevice = 19,
    /// Invalid parameters (`EINVAL`).
    InvalidParameters = 22,
    /// Controller lacks the required feature (`EOPNOTSUPP`).
    NotSupported = 95,
    /// Controller is powered off (`ENETDOWN`).
    NotPowered = 100,
    /// No connection to the remote device (`ENOTCONN`).
    NotConnected = 107,
    /// Requested state already holds (`EALREADY`).
    Already = 114,
}

impl Status {
    /// Parses a status from a byte.
    ///
    /// Returns `None` for codes this interface never emits.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::UnknownCommand),
            2 => Some(Self::NotFound),
            5 => Some(Self::Io),
            9 => Some(Self::BadAddress),
            12 => Some(Self::NoMemory),
            16 => Some(Self::Busy),
            17 => Some(Self::Exists),
            19 => Some(Self::NoDevice),
            22 => Some(Self::InvalidParameters),
            95 => Some(Self::NotSupported),
            100 => Some(Self::NotPowered),
            107 => Some(Self::NotConnected),
            114 => Some(Self::Already),
            _ => None,
        }
    }

    /// Returns true for the success code.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(Status::InvalidParameters as u8, 22);
        assert_eq!(Status::NoDevice as u8, 19);
        assert_eq!(Status::Busy as u8, 16);
        assert_eq!(Status::Already as u8, 114);
        assert_eq!(Status::NotPowered as u8, 100);
    }

    #[test]
    fn test_from_byte() {
        assert_eq!(Status::from_byte(0), Some(Status::Success));
        assert_eq!(Status::from_byte(107), Some(Status::NotConnected));
        assert_eq!(Status::from_byte(200), None);
        assert!(Status::Success.is_success());
        assert!(!Status::Io.is_success());
    }
}
