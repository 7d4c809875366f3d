//! Error types for the btmgmt library.

use thiserror::Error;

use crate::protocol::{Opcode, Status};

/// The main error type for management operations.
///
/// Every variant maps onto a wire [`Status`] through [`Error::status`], which
/// is how the dispatcher turns a failed request into a `CMD_STATUS` reply.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame header could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Parameter block has the wrong size or content for the opcode.
    #[error("invalid parameters for {opcode:?}: {reason}")]
    InvalidParameters { opcode: Opcode, reason: String },

    /// Requested state already holds.
    #[error("requested state already set")]
    Already,

    /// A conflicting command is already in flight.
    #[error("conflicting command pending for {opcode:?}")]
    Busy { opcode: Opcode },

    /// Controller is powered off.
    #[error("controller hci{index} is not powered")]
    NotPowered { index: u16 },

    /// Controller index is unknown or being torn down.
    #[error("no controller with index {index}")]
    NoDevice { index: u16 },

    /// No connection to the remote device.
    #[error("not connected")]
    NotConnected,

    /// Entry does not exist.
    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// Controller lacks the required feature.
    #[error("operation not supported by controller")]
    NotSupported,

    /// Entry already exists.
    #[error("{what} already exists")]
    Exists { what: &'static str },

    /// Address cannot be used for this operation.
    #[error("invalid device address")]
    BadAddress,

    /// Opcode is not part of this interface.
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    /// Allocation failed.
    #[error("out of resources")]
    ResourceExhausted,

    /// Transport refused a command submission.
    #[error("transport rejected command: {reason}")]
    Transport { status: Status, reason: String },
}

impl Error {
    /// Creates an invalid-parameters error.
    pub fn invalid(opcode: Opcode, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            opcode,
            reason: reason.into(),
        }
    }

    /// Creates a transport rejection error.
    pub fn transport(status: Status, reason: impl Into<String>) -> Self {
        Self::Transport {
            status,
            reason: reason.into(),
        }
    }

    /// Returns the wire status reported to the client for this error.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Frame(_) | Self::InvalidParameters { .. } => Status::InvalidParameters,
            Self::Already => Status::Already,
            Self::Busy { .. } => Status::Busy,
            Self::NotPowered { .. } => Status::NotPowered,
            Self::NoDevice { .. } => Status::NoDevice,
            Self::NotConnected => Status::NotConnected,
            Self::NotFound { .. } => Status::NotFound,
            Self::NotSupported => Status::NotSupported,
            Self::Exists { .. } => Status::Exists,
            Self::BadAddress => Status::BadAddress,
            Self::UnknownOpcode(_) => Status::UnknownCommand,
            Self::ResourceExhausted => Status::NoMemory,
            Self::Transport { status, .. } => *status,
        }
    }
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Buffer too short to contain the header.
    #[error("frame too short: need at least 6 bytes, got {0}")]
    TooShort(usize),

    /// Declared length disagrees with the bytes that follow the header.
    #[error("length mismatch for opcode {opcode:#06x}: header says {declared}, got {actual}")]
    LengthMismatch {
        opcode: u16,
        index: u16,
        declared: usize,
        actual: usize,
    },

    /// Payload exceeds what a 16-bit length field can describe.
    #[error("payload too large: {0} bytes")]
    TooLarge(usize),
}

/// Result type alias for management operations.
pub type Result<T> = std::result::Result<T, Error>;
