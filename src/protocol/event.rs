//! Asynchronous notifications broadcast to subscribed sockets.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::frame::encode_event;
use crate::protocol::opcode::EventCode;
use crate::protocol::params::{encode_address, encode_address_status, encode_mode, encode_name, put_key};
use crate::types::{Address, LinkKey};

/// Length of the EIR blob carried by `DEVICE_FOUND`.
pub const EIR_LEN: usize = 240;

/// Event notifications, one variant per event code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtEvent {
    /// A controller was registered.
    IndexAdded,
    /// A controller was removed.
    IndexRemoved,
    /// Power state changed.
    Powered(bool),
    /// Discoverable state changed.
    Discoverable(bool),
    /// Connectable state changed.
    Connectable(bool),
    /// Pairable state changed.
    Pairable(bool),
    /// A new key was derived; `store_hint` asks clients to persist it.
    NewKey { store_hint: bool, key: LinkKey },
    /// A remote device connected.
    Connected(Address),
    /// A remote device disconnected.
    Disconnected(Address),
    /// An outgoing connection failed.
    ConnectFailed { address: Address, status: u8 },
    /// The controller needs a PIN code.
    PinCodeRequest { address: Address, secure: bool },
    /// The controller needs a numeric comparison answer.
    UserConfirmRequest {
        address: Address,
        confirm_hint: u8,
        value: u32,
    },
    /// Authentication failed.
    AuthFailed { address: Address, status: u8 },
    /// Local name changed.
    LocalNameChanged(Vec<u8>),
    /// Inquiry found a device.
    DeviceFound {
        address: Address,
        dev_class: [u8; 3],
        rssi: i8,
        eir: Option<Box<[u8; EIR_LEN]>>,
    },
    /// A remote name was resolved.
    RemoteName { address: Address, name: Vec<u8> },
    /// Inquiry started or stopped.
    Discovering(bool),
}

impl MgmtEvent {
    /// Returns the event code.
    #[must_use]
    pub const fn code(&self) -> EventCode {
        match self {
            Self::IndexAdded => EventCode::IndexAdded,
            Self::IndexRemoved => EventCode::IndexRemoved,
            Self::Powered(_) => EventCode::Powered,
            Self::Discoverable(_) => EventCode::Discoverable,
            Self::Connectable(_) => EventCode::Connectable,
            Self::Pairable(_) => EventCode::Pairable,
            Self::NewKey { .. } => EventCode::NewKey,
            Self::Connected(_) => EventCode::Connected,
            Self::Disconnected(_) => EventCode::Disconnected,
            Self::ConnectFailed { .. } => EventCode::ConnectFailed,
            Self::PinCodeRequest { .. } => EventCode::PinCodeRequest,
            Self::UserConfirmRequest { .. } => EventCode::UserConfirmRequest,
            Self::AuthFailed { .. } => EventCode::AuthFailed,
            Self::LocalNameChanged(_) => EventCode::LocalNameChanged,
            Self::DeviceFound { .. } => EventCode::DeviceFound,
            Self::RemoteName { .. } => EventCode::RemoteName,
            Self::Discovering(_) => EventCode::Discovering,
        }
    }

    /// Encodes the event payload (without header).
    #[must_use]
    pub fn payload(&self) -> BytesMut {
        match self {
            Self::IndexAdded | Self::IndexRemoved => BytesMut::new(),
            Self::Powered(val)
            | Self::Discoverable(val)
            | Self::Connectable(val)
            | Self::Pairable(val)
            | Self::Discovering(val) => encode_mode(*val),
            Self::NewKey { store_hint, key } => {
                let mut buf = BytesMut::with_capacity(26 + key.data.len());
                buf.put_u8((*store_hint).into());
                put_key(&mut buf, key);
                buf
            }
            Self::Connected(address) | Self::Disconnected(address) => encode_address(address),
            Self::ConnectFailed { address, status } | Self::AuthFailed { address, status } => {
                encode_address_status(address, *status)
            }
            Self::PinCodeRequest { address, secure } => {
                encode_address_status(address, (*secure).into())
            }
            Self::UserConfirmRequest {
                address,
                confirm_hint,
                value,
            } => {
                let mut buf = BytesMut::with_capacity(11);
                buf.put_slice(address.as_bytes());
                buf.put_u8(*confirm_hint);
                buf.put_u32_le(*value);
                buf
            }
            Self::LocalNameChanged(name) => encode_name(name),
            Self::DeviceFound {
                address,
                dev_class,
                rssi,
                eir,
            } => {
                let mut buf = BytesMut::with_capacity(10 + EIR_LEN);
                buf.put_slice(address.as_bytes());
                buf.put_slice(dev_class);
                buf.put_i8(*rssi);
                match eir {
                    Some(eir) => buf.put_slice(&eir[..]),
                    None => buf.put_bytes(0, EIR_LEN),
                }
                buf
            }
            Self::RemoteName { address, name } => {
                let mut buf = encode_address(address);
                buf.extend_from_slice(&encode_name(name));
                buf
            }
        }
    }

    /// Encodes the complete event frame for a controller index.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TooLarge` if the payload does not fit in a frame.
    pub fn encode(&self, index: u16) -> Result<Bytes, FrameError> {
        encode_event(self.code(), index, &self.payload())
    }
}
