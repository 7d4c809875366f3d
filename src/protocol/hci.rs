//! Controller (HCI) commands submitted to the transport.
//!
//! Only the commands the management engine issues are listed; the parameter
//! encoders produce the exact blocks the controller expects.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::event::EIR_LEN;
use crate::protocol::params::name_field;
use crate::types::{Address, NAME_LEN};

/// Inquiry scan bit of `WRITE_SCAN_ENABLE`.
pub const SCAN_INQUIRY: u8 = 0x01;

/// Page scan bit of `WRITE_SCAN_ENABLE`.
pub const SCAN_PAGE: u8 = 0x02;

/// Disconnect reason: remote user terminated connection.
pub const REASON_REMOTE_USER_TERM: u8 = 0x13;

/// HCI command opcodes (OGF/OCF packed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum HciOpcode {
    /// Start inquiry.
    Inquiry = 0x0401,
    /// Cancel inquiry.
    InquiryCancel = 0x0402,
    /// Terminate a connection.
    Disconnect = 0x0406,
    /// Answer a PIN code request.
    PinCodeReply = 0x040D,
    /// Reject a PIN code request.
    PinCodeNegReply = 0x040E,
    /// Accept a numeric comparison.
    UserConfirmReply = 0x042C,
    /// Reject a numeric comparison.
    UserConfirmNegReply = 0x042D,
    /// Write the local name.
    WriteLocalName = 0x0C13,
    /// Write inquiry/page scan enable.
    WriteScanEnable = 0x0C1A,
    /// Write class of device.
    WriteClassOfDev = 0x0C24,
    /// Write the extended inquiry response.
    WriteEir = 0x0C52,
    /// Read local out-of-band data.
    ReadLocalOobData = 0x0C57,
}

impl From<HciOpcode> for u16 {
    fn from(op: HciOpcode) -> Self {
        op as Self
    }
}

/// `WRITE_SCAN_ENABLE` block for a discoverable request (page scan stays on).
#[must_use]
pub const fn discoverable_scan(discoverable: bool) -> u8 {
    if discoverable {
        SCAN_PAGE | SCAN_INQUIRY
    } else {
        SCAN_PAGE
    }
}

/// `WRITE_SCAN_ENABLE` block for a connectable request.
#[must_use]
pub const fn connectable_scan(connectable: bool) -> u8 {
    if connectable { SCAN_PAGE } else { 0 }
}

/// Single-byte parameter block.
#[must_use]
pub fn byte_param(value: u8) -> Bytes {
    Bytes::copy_from_slice(&[value])
}

/// `{handle:u16, reason:u8}`.
#[must_use]
pub fn disconnect(handle: u16, reason: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u16_le(handle);
    buf.put_u8(reason);
    buf.freeze()
}

/// `{bdaddr[6]}`.
#[must_use]
pub fn address(address: &Address) -> Bytes {
    Bytes::copy_from_slice(address.as_bytes())
}

/// `{bdaddr[6], pin_len:u8, pin_code[16]}`.
#[must_use]
pub fn pin_code_reply(address: &Address, pin_len: u8, pin_code: &[u8; 16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(23);
    buf.put_slice(address.as_bytes());
    buf.put_u8(pin_len);
    buf.put_slice(pin_code);
    buf.freeze()
}

/// `{name[248]}`.
#[must_use]
pub fn write_local_name(name: &[u8]) -> Bytes {
    Bytes::copy_from_slice(&name_field::<NAME_LEN>(name))
}

/// `{class[3]}`.
#[must_use]
pub fn write_class(class: &[u8; 3]) -> Bytes {
    Bytes::copy_from_slice(class)
}

/// `{fec_required:u8, data[240]}`.
#[must_use]
pub fn write_eir(eir: &[u8; EIR_LEN]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + EIR_LEN);
    buf.put_u8(0);
    buf.put_slice(eir);
    buf.freeze()
}

/// `{lap[3], length:u8, num_rsp:u8}`.
#[must_use]
pub fn inquiry(lap: [u8; 3], length: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_slice(&lap);
    buf.put_u8(length);
    buf.put_u8(0);
    buf.freeze()
}
