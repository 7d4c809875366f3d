//! Per-opcode parameter blocks and reply payloads.
//!
//! Every fixed-size command parameter block implements [`Request`]; the
//! dispatcher decodes it with [`parse`], which rejects any payload whose size
//! differs from the block size. `LOAD_KEYS` is the only variable-length
//! command and has its own parser.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::Opcode;
use crate::types::key::{KEY_LEN, MASTER_ID_LEN};
use crate::types::{Address, KEY_TYPE_LTK, LinkKey, RemoteOobData, Uuid128};

/// Length of a name field in management frames (controller name plus NUL).
pub const MGMT_NAME_LEN: usize = 249;

/// Size of the fixed part of a `LOAD_KEYS` block.
pub const LOAD_KEYS_HEADER_SIZE: usize = 3;

/// Size of one key entry without its extra data.
pub const KEY_INFO_SIZE: usize = 25;

/// A fixed-size command parameter block.
pub trait Request: Sized {
    /// Exact size of the block on the wire.
    const SIZE: usize;

    /// Reads the block. The caller guarantees `buf` holds `SIZE` bytes.
    fn read(buf: &mut &[u8]) -> Self;
}

/// Decodes a fixed-size parameter block.
///
/// # Errors
///
/// Returns `Error::InvalidParameters` if `data` is not exactly `R::SIZE` bytes.
pub fn parse<R: Request>(opcode: Opcode, data: &[u8]) -> Result<R> {
    if data.len() != R::SIZE {
        return Err(Error::invalid(
            opcode,
            format!("expected {} bytes, got {}", R::SIZE, data.len()),
        ));
    }
    let mut buf = data;
    Ok(R::read(&mut buf))
}

fn get_address(buf: &mut &[u8]) -> Address {
    let mut bytes = [0u8; 6];
    buf.copy_to_slice(&mut bytes);
    Address::new(bytes)
}

fn get_array<const N: usize>(buf: &mut &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    buf.copy_to_slice(&mut bytes);
    bytes
}

/// Copies a name into a NUL-padded fixed-size field, truncating if needed.
#[must_use]
pub fn name_field<const N: usize>(name: &[u8]) -> [u8; N] {
    let mut field = [0u8; N];
    let len = name.len().min(N);
    field[..len].copy_from_slice(&name[..len]);
    field
}

/// Returns the name bytes up to the first NUL.
#[must_use]
pub fn trim_name(field: &[u8]) -> &[u8] {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..len]
}

/// Commands that carry no parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoParams;

impl Request for NoParams {
    const SIZE: usize = 0;

    fn read(_buf: &mut &[u8]) -> Self {
        Self
    }
}

/// `{val:u8}`: powered, discoverable, connectable and pairable modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    /// Requested value.
    pub val: bool,
}

impl Request for Mode {
    const SIZE: usize = 1;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            val: buf.get_u8() != 0,
        }
    }
}

/// `{uuid[16], svc_hint:u8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddUuid {
    /// Service UUID.
    pub uuid: Uuid128,
    /// Service class hint bits.
    pub svc_hint: u8,
}

impl Request for AddUuid {
    const SIZE: usize = 17;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            uuid: Uuid128::new(get_array(buf)),
            svc_hint: buf.get_u8(),
        }
    }
}

/// `{uuid[16]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveUuid {
    /// Service UUID, or all zeros to remove every UUID.
    pub uuid: Uuid128,
}

impl Request for RemoveUuid {
    const SIZE: usize = 16;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            uuid: Uuid128::new(get_array(buf)),
        }
    }
}

/// `{major:u8, minor:u8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDevClass {
    /// Major device class.
    pub major: u8,
    /// Minor device class.
    pub minor: u8,
}

impl Request for SetDevClass {
    const SIZE: usize = 2;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            major: buf.get_u8(),
            minor: buf.get_u8(),
        }
    }
}

/// `{enable:u8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetServiceCache {
    /// Pause class/EIR updates when true.
    pub enable: bool,
}

impl Request for SetServiceCache {
    const SIZE: usize = 1;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            enable: buf.get_u8() != 0,
        }
    }
}

/// `{bdaddr[6], disconnect:u8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveKey {
    /// Remote device address.
    pub address: Address,
    /// Also terminate a live connection to the device.
    pub disconnect: bool,
}

impl Request for RemoveKey {
    const SIZE: usize = 7;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            address: get_address(buf),
            disconnect: buf.get_u8() != 0,
        }
    }
}

/// `{bdaddr[6]}`: every command that only names a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress {
    /// Remote device address.
    pub address: Address,
}

impl Request for DeviceAddress {
    const SIZE: usize = 6;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            address: get_address(buf),
        }
    }
}

/// `{bdaddr[6], pin_len:u8, pin_code[16]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinCodeReply {
    /// Remote device address.
    pub address: Address,
    /// Number of significant PIN bytes.
    pub pin_len: u8,
    /// PIN code, zero padded.
    pub pin_code: [u8; 16],
}

impl Request for PinCodeReply {
    const SIZE: usize = 23;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            address: get_address(buf),
            pin_len: buf.get_u8(),
            pin_code: get_array(buf),
        }
    }
}

/// `{io_capability:u8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetIoCapability {
    /// Raw IO capability value.
    pub io_capability: u8,
}

impl Request for SetIoCapability {
    const SIZE: usize = 1;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            io_capability: buf.get_u8(),
        }
    }
}

/// `{bdaddr[6], io_cap:u8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairDevice {
    /// Remote device address.
    pub address: Address,
    /// IO capability announced for this pairing.
    pub io_cap: u8,
}

impl Request for PairDevice {
    const SIZE: usize = 7;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            address: get_address(buf),
            io_cap: buf.get_u8(),
        }
    }
}

/// `{name[249]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLocalName {
    /// NUL-padded name.
    pub name: [u8; MGMT_NAME_LEN],
}

impl Request for SetLocalName {
    const SIZE: usize = MGMT_NAME_LEN;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            name: get_array(buf),
        }
    }
}

/// `{bdaddr[6], hash[16], randomizer[16]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRemoteOobData(pub RemoteOobData);

impl Request for AddRemoteOobData {
    const SIZE: usize = 38;

    fn read(buf: &mut &[u8]) -> Self {
        Self(RemoteOobData {
            address: get_address(buf),
            hash: get_array(buf),
            randomizer: get_array(buf),
        })
    }
}

/// Decoded `LOAD_KEYS` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadKeys {
    /// Accept debug keys.
    pub debug_keys: bool,
    /// Well-formed keys, in wire order.
    pub keys: Vec<LinkKey>,
}

/// Parses a `LOAD_KEYS` block.
///
/// Format:
/// ```text
/// [debug_keys:1] [key_count:2LE] key_count * (
///     [bdaddr:6] [type:1] [val:16] [pin_len:1] [dlen:1] [data:dlen])
/// ```
///
/// The whole block is rejected when `key_count` fixed-size entries cannot fit
/// in the buffer. An entry whose extra data runs past the buffer stops
/// parsing; entries before it are kept. Long-term keys with extra data of the
/// wrong size are skipped.
pub fn parse_load_keys(data: &[u8]) -> Result<LoadKeys> {
    if data.len() < LOAD_KEYS_HEADER_SIZE {
        return Err(Error::invalid(
            Opcode::LoadKeys,
            format!("expected at least {LOAD_KEYS_HEADER_SIZE} bytes, got {}", data.len()),
        ));
    }

    let mut buf = data;
    let debug_keys = buf.get_u8() != 0;
    let key_count = usize::from(buf.get_u16_le());

    let expected = LOAD_KEYS_HEADER_SIZE + key_count * KEY_INFO_SIZE;
    if expected > data.len() {
        return Err(Error::invalid(
            Opcode::LoadKeys,
            format!("{key_count} keys need at least {expected} bytes, got {}", data.len()),
        ));
    }

    let mut keys = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        if buf.len() < KEY_INFO_SIZE {
            tracing::warn!("load_keys: truncated key entry, {} bytes left", buf.len());
            break;
        }
        let address = get_address(&mut buf);
        let key_type = buf.get_u8();
        let value: [u8; KEY_LEN] = get_array(&mut buf);
        let pin_len = buf.get_u8();
        let dlen = usize::from(buf.get_u8());

        if dlen > buf.len() {
            tracing::warn!(
                "load_keys: key for {} declares {} data bytes, {} left",
                address,
                dlen,
                buf.len()
            );
            break;
        }
        let extra = buf[..dlen].to_vec();
        buf.advance(dlen);

        if key_type == KEY_TYPE_LTK && dlen != MASTER_ID_LEN {
            tracing::debug!("load_keys: skipping long-term key with {} data bytes", dlen);
            continue;
        }

        keys.push(LinkKey {
            address,
            key_type,
            value,
            pin_len,
            data: extra,
        });
    }

    Ok(LoadKeys { debug_keys, keys })
}

/// Writes one key entry in `LOAD_KEYS` / `NEW_KEY` layout.
pub fn put_key(buf: &mut BytesMut, key: &LinkKey) {
    buf.put_slice(key.address.as_bytes());
    buf.put_u8(key.key_type);
    buf.put_slice(&key.value);
    buf.put_u8(key.pin_len);
    buf.put_u8(key.data.len() as u8);
    buf.put_slice(&key.data);
}

/// `READ_VERSION` reply: `{version:u8, revision:u16}`.
#[must_use]
pub fn encode_version(version: u8, revision: u16) -> BytesMut {
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(version);
    buf.put_u16_le(revision);
    buf
}

/// `READ_INDEX_LIST` reply: `{count:u16, index[count]:u16}`.
#[must_use]
pub fn encode_index_list(indexes: &[u16]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2 + indexes.len() * 2);
    buf.put_u16_le(indexes.len() as u16);
    for index in indexes {
        buf.put_u16_le(*index);
    }
    buf
}

/// `READ_INFO` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadInfoReply {
    /// Controller type.
    pub dev_type: u8,
    /// Powered flag.
    pub powered: bool,
    /// Connectable flag.
    pub connectable: bool,
    /// Discoverable flag.
    pub discoverable: bool,
    /// Pairable flag.
    pub pairable: bool,
    /// Security mode (2, 3 or 4).
    pub sec_mode: u8,
    /// Controller address.
    pub address: Address,
    /// Class of device.
    pub dev_class: [u8; 3],
    /// LMP features.
    pub features: [u8; 8],
    /// Manufacturer identifier.
    pub manufacturer: u16,
    /// HCI version.
    pub hci_version: u8,
    /// HCI revision.
    pub hci_revision: u16,
    /// Local name.
    pub name: Vec<u8>,
}

impl ReadInfoReply {
    /// Encoded size.
    pub const SIZE: usize = 28 + MGMT_NAME_LEN;

    /// Encodes the reply.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(self.dev_type);
        buf.put_u8(self.powered.into());
        buf.put_u8(self.connectable.into());
        buf.put_u8(self.discoverable.into());
        buf.put_u8(self.pairable.into());
        buf.put_u8(self.sec_mode);
        buf.put_slice(self.address.as_bytes());
        buf.put_slice(&self.dev_class);
        buf.put_slice(&self.features);
        buf.put_u16_le(self.manufacturer);
        buf.put_u8(self.hci_version);
        buf.put_u16_le(self.hci_revision);
        buf.put_slice(&name_field::<MGMT_NAME_LEN>(&self.name));
        buf
    }
}

/// Mode reply and mode events: `{val:u8}`.
#[must_use]
pub fn encode_mode(val: bool) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);
    buf.put_u8(val.into());
    buf
}

/// `{bdaddr[6]}`.
#[must_use]
pub fn encode_address(address: &Address) -> BytesMut {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_slice(address.as_bytes());
    buf
}

/// `{bdaddr[6], status:u8}`: PIN, confirmation and pairing replies.
#[must_use]
pub fn encode_address_status(address: &Address, status: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(7);
    buf.put_slice(address.as_bytes());
    buf.put_u8(status);
    buf
}

/// `GET_CONNECTIONS` reply: `{count:u16, bdaddr[count]}`.
#[must_use]
pub fn encode_connections(addresses: &[Address]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2 + addresses.len() * 6);
    buf.put_u16_le(addresses.len() as u16);
    for address in addresses {
        buf.put_slice(address.as_bytes());
    }
    buf
}

/// `READ_LOCAL_OOB_DATA` reply: `{hash[16], randomizer[16]}`.
#[must_use]
pub fn encode_local_oob(hash: &[u8; 16], randomizer: &[u8; 16]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(32);
    buf.put_slice(hash);
    buf.put_slice(randomizer);
    buf
}

/// `SET_LOCAL_NAME` reply and `LOCAL_NAME_CHANGED` event: `{name[249]}`.
#[must_use]
pub fn encode_name(name: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(MGMT_NAME_LEN);
    buf.put_slice(&name_field::<MGMT_NAME_LEN>(name));
    buf
}
