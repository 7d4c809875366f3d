//! Command opcodes and event codes of the management protocol.
//!
//! Commands are written by clients; every reply or notification travels back
//! as one of the [`EventCode`] frames.

/// Command opcodes accepted from clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // Registry-wide commands
    /// Read interface version and revision.
    ReadVersion = 0x0001,
    /// List registered controller indexes.
    ReadIndexList = 0x0003,

    // Controller configuration
    /// Read controller information.
    ReadInfo = 0x0004,
    /// Power the controller on or off.
    SetPowered = 0x0005,
    /// Enable or disable inquiry scan.
    SetDiscoverable = 0x0006,
    /// Enable or disable page scan.
    SetConnectable = 0x0007,
    /// Allow or refuse incoming pairing.
    SetPairable = 0x0008,
    /// Register a service UUID.
    AddUuid = 0x0009,
    /// Unregister a service UUID.
    RemoveUuid = 0x000A,
    /// Set major/minor device class.
    SetDevClass = 0x000B,
    /// Pause or resume class/EIR updates.
    SetServiceCache = 0x000C,
    /// Replace the stored link keys.
    LoadKeys = 0x000D,
    /// Remove one stored link key.
    RemoveKey = 0x000E,

    // Link and pairing
    /// Disconnect a remote device.
    Disconnect = 0x000F,
    /// List connected remote devices.
    GetConnections = 0x0010,
    /// Answer a PIN code request.
    PinCodeReply = 0x0011,
    /// Reject a PIN code request.
    PinCodeNegReply = 0x0012,
    /// Set local IO capability.
    SetIoCapability = 0x0013,
    /// Pair with a remote device.
    PairDevice = 0x0014,
    /// Accept a numeric comparison.
    UserConfirmReply = 0x0015,
    /// Reject a numeric comparison.
    UserConfirmNegReply = 0x0016,
    /// Change the local name.
    SetLocalName = 0x0017,
    /// Read local out-of-band pairing data.
    ReadLocalOobData = 0x0018,
    /// Store out-of-band data for a remote device.
    AddRemoteOobData = 0x0019,
    /// Drop out-of-band data for a remote device.
    RemoveRemoteOobData = 0x001A,
    /// Start inquiry.
    StartDiscovery = 0x001B,
    /// Cancel inquiry.
    StopDiscovery = 0x001C,
    /// Add a device to the block list.
    BlockDevice = 0x001D,
    /// Remove a device from the block list.
    UnblockDevice = 0x001E,
}

impl Opcode {
    /// Parses an opcode from its wire value.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x0001 => Self::ReadVersion,
            0x0003 => Self::ReadIndexList,
            0x0004 => Self::ReadInfo,
            0x0005 => Self::SetPowered,
            0x0006 => Self::SetDiscoverable,
            0x0007 => Self::SetConnectable,
            0x0008 => Self::SetPairable,
            0x0009 => Self::AddUuid,
            0x000A => Self::RemoveUuid,
            0x000B => Self::SetDevClass,
            0x000C => Self::SetServiceCache,
            0x000D => Self::LoadKeys,
            0x000E => Self::RemoveKey,
            0x000F => Self::Disconnect,
            0x0010 => Self::GetConnections,
            0x0011 => Self::PinCodeReply,
            0x0012 => Self::PinCodeNegReply,
            0x0013 => Self::SetIoCapability,
            0x0014 => Self::PairDevice,
            0x0015 => Self::UserConfirmReply,
            0x0016 => Self::UserConfirmNegReply,
            0x0017 => Self::SetLocalName,
            0x0018 => Self::ReadLocalOobData,
            0x0019 => Self::AddRemoteOobData,
            0x001A => Self::RemoveRemoteOobData,
            0x001B => Self::StartDiscovery,
            0x001C => Self::StopDiscovery,
            0x001D => Self::BlockDevice,
            0x001E => Self::UnblockDevice,
            _ => return None,
        })
    }
}

impl From<Opcode> for u16 {
    fn from(op: Opcode) -> Self {
        op as Self
    }
}

/// Event codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventCode {
    /// Command finished; carries the result.
    CmdComplete = 0x0001,
    /// Command acknowledged or failed; carries a status byte.
    CmdStatus = 0x0002,
    /// A controller was registered.
    IndexAdded = 0x0004,
    /// A controller was removed.
    IndexRemoved = 0x0005,
    /// Power state changed.
    Powered = 0x0006,
    /// Discoverable state changed.
    Discoverable = 0x0007,
    /// Connectable state changed.
    Connectable = 0x0008,
    /// Pairable state changed.
    Pairable = 0x0009,
    /// A new link key was derived.
    NewKey = 0x000A,
    /// A remote device connected.
    Connected = 0x000B,
    /// A remote device disconnected.
    Disconnected = 0x000C,
    /// An outgoing connection failed.
    ConnectFailed = 0x000D,
    /// The controller needs a PIN code.
    PinCodeRequest = 0x000E,
    /// The controller needs a numeric comparison answer.
    UserConfirmRequest = 0x000F,
    /// Authentication with a remote device failed.
    AuthFailed = 0x0010,
    /// Local name changed.
    LocalNameChanged = 0x0011,
    /// Inquiry found a device.
    DeviceFound = 0x0012,
    /// A remote name was resolved.
    RemoteName = 0x0013,
    /// Inquiry started or stopped.
    Discovering = 0x0014,
}

impl EventCode {
    /// Parses an event code from its wire value.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x0001 => Self::CmdComplete,
            0x0002 => Self::CmdStatus,
            0x0004 => Self::IndexAdded,
            0x0005 => Self::IndexRemoved,
            0x0006 => Self::Powered,
            0x0007 => Self::Discoverable,
            0x0008 => Self::Connectable,
            0x0009 => Self::Pairable,
            0x000A => Self::NewKey,
            0x000B => Self::Connected,
            0x000C => Self::Disconnected,
            0x000D => Self::ConnectFailed,
            0x000E => Self::PinCodeRequest,
            0x000F => Self::UserConfirmRequest,
            0x0010 => Self::AuthFailed,
            0x0011 => Self::LocalNameChanged,
            0x0012 => Self::DeviceFound,
            0x0013 => Self::RemoteName,
            0x0014 => Self::Discovering,
            _ => return None,
        })
    }
}

impl From<EventCode> for u16 {
    fn from(code: EventCode) -> Self {
        code as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::ReadVersion as u16, 0x0001);
        assert_eq!(Opcode::SetPowered as u16, 0x0005);
        assert_eq!(Opcode::LoadKeys as u16, 0x000D);
        assert_eq!(Opcode::PairDevice as u16, 0x0014);
        assert_eq!(Opcode::UnblockDevice as u16, 0x001E);
    }

    #[test]
    fn test_opcode_from_u16() {
        assert_eq!(Opcode::from_u16(0x0007), Some(Opcode::SetConnectable));
        assert_eq!(Opcode::from_u16(0x0002), None);
        assert_eq!(Opcode::from_u16(0x1234), None);
        for raw in 0x0001..=0x001E_u16 {
            if let Some(op) = Opcode::from_u16(raw) {
                assert_eq!(u16::from(op), raw);
            }
        }
    }

    #[test]
    fn test_event_code_values() {
        assert_eq!(EventCode::CmdComplete as u16, 0x0001);
        assert_eq!(EventCode::CmdStatus as u16, 0x0002);
        assert_eq!(EventCode::from_u16(0x0014), Some(EventCode::Discovering));
        assert_eq!(EventCode::from_u16(0x0003), None);
    }
}
