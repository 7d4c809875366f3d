//! Protocol definitions for the management channel.
//!
//! This module contains the low-level protocol types including:
//! - Frame encoding/decoding
//! - Command opcodes and event codes
//! - Status codes
//! - Per-opcode parameter blocks and reply payloads
//! - Event notifications
//! - Controller commands handed to the transport

pub mod event;
pub mod frame;
pub mod hci;
pub mod opcode;
pub mod params;
pub mod status;

pub use event::MgmtEvent;
pub use frame::{Frame, HEADER_SIZE, Header, INDEX_NONE};
pub use hci::HciOpcode;
pub use opcode::{EventCode, Opcode};
pub use status::Status;

/// Interface version reported by `READ_VERSION`.
pub const MGMT_VERSION: u8 = 0;

/// Interface revision reported by `READ_VERSION`.
pub const MGMT_REVISION: u16 = 1;
