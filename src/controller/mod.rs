//! Per-controller mutable state.
//!
//! A [`ControllerState`] lives behind the controller's lock in the
//! [`Registry`](crate::registry::Registry). Mode mutations report whether
//! anything changed so callers can decide whether to broadcast; class and
//! EIR refreshes return the bytes to push to the controller, or `None` if
//! nothing needs to be written.

pub mod eir;

use crate::error::{Error, Result};
use crate::protocol::event::EIR_LEN;
use crate::protocol::params::ReadInfoReply;
use crate::types::{
    Address, ControllerFlags, ControllerInfo, IoCapability, LinkKey, RemoteOobData, ServiceUuid,
    Uuid128,
};

pub use eir::{DEFAULT_MAX_NAME_LEN, build_class, build_eir};

/// Mutable state of one controller.
#[derive(Debug, Clone)]
pub struct ControllerState {
    info: ControllerInfo,
    flags: ControllerFlags,
    name: Vec<u8>,
    major_class: u8,
    minor_class: u8,
    dev_class: [u8; 3],
    eir: [u8; EIR_LEN],
    io_capability: IoCapability,
    uuids: Vec<ServiceUuid>,
    link_keys: Vec<LinkKey>,
    remote_oob: Vec<RemoteOobData>,
    blocked: Vec<Address>,
    removed: bool,
}

impl ControllerState {
    /// Creates the state of a freshly registered controller (powered off).
    #[must_use]
    pub fn new(info: ControllerInfo) -> Self {
        let dev_class = info.dev_class;
        let name = info.name.clone();
        Self {
            info,
            flags: ControllerFlags::NONE,
            name,
            major_class: dev_class[1],
            minor_class: dev_class[0],
            dev_class,
            eir: [0; EIR_LEN],
            io_capability: IoCapability::default(),
            uuids: Vec::new(),
            link_keys: Vec::new(),
            remote_oob: Vec::new(),
            blocked: Vec::new(),
            removed: false,
        }
    }

    /// Returns the controller index.
    #[must_use]
    pub const fn index(&self) -> u16 {
        self.info.index
    }

    /// Returns the static controller identity.
    #[must_use]
    pub const fn info(&self) -> &ControllerInfo {
        &self.info
    }

    /// Returns the current flags.
    #[must_use]
    pub const fn flags(&self) -> ControllerFlags {
        self.flags
    }

    /// Returns true if `flag` is set.
    #[must_use]
    pub const fn has(&self, flag: ControllerFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true if the controller is powered.
    #[must_use]
    pub const fn is_powered(&self) -> bool {
        self.flags.contains(ControllerFlags::UP)
    }

    /// Returns true once the controller has been torn down.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.removed
    }

    /// Marks the controller as torn down; later requests fail with `ENODEV`.
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Sets or clears one flag, returning whether it changed.
    pub fn set_flag(&mut self, flag: ControllerFlags, on: bool) -> bool {
        let (flags, changed) = self.flags.with(flag, on);
        self.flags = flags;
        changed
    }

    /// Applies a power transition. Powering off also stops both scans.
    pub fn set_powered(&mut self, on: bool) -> bool {
        let changed = self.set_flag(ControllerFlags::UP, on);
        if !on {
            self.set_flag(ControllerFlags::DISCOVERABLE, false);
            self.set_flag(ControllerFlags::CONNECTABLE, false);
        }
        changed
    }

    /// Applies an inquiry scan transition.
    pub fn set_discoverable(&mut self, on: bool) -> bool {
        self.set_flag(ControllerFlags::DISCOVERABLE, on)
    }

    /// Applies a page scan transition.
    pub fn set_connectable(&mut self, on: bool) -> bool {
        self.set_flag(ControllerFlags::CONNECTABLE, on)
    }

    /// Applies a pairable transition.
    pub fn set_pairable(&mut self, on: bool) -> bool {
        self.set_flag(ControllerFlags::PAIRABLE, on)
    }

    /// Pauses or resumes class and EIR updates.
    pub fn set_service_cache(&mut self, on: bool) -> bool {
        self.set_flag(ControllerFlags::SERVICE_CACHE, on)
    }

    /// Returns the stored local name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Replaces the stored local name.
    pub fn set_name(&mut self, name: &[u8]) {
        self.name = crate::protocol::params::trim_name(name).to_vec();
    }

    /// Sets the major and minor device class.
    pub fn set_class(&mut self, major: u8, minor: u8) {
        self.major_class = major;
        self.minor_class = minor;
    }

    /// Returns the class of device last written to the controller.
    #[must_use]
    pub const fn dev_class(&self) -> [u8; 3] {
        self.dev_class
    }

    /// Returns the EIR last written to the controller.
    #[must_use]
    pub const fn eir(&self) -> &[u8; EIR_LEN] {
        &self.eir
    }

    /// Returns the IO capability used for pairing.
    #[must_use]
    pub const fn io_capability(&self) -> IoCapability {
        self.io_capability
    }

    /// Sets the IO capability used for pairing.
    pub fn set_io_capability(&mut self, io_capability: IoCapability) {
        self.io_capability = io_capability;
    }

    /// Returns the registered service UUIDs.
    #[must_use]
    pub fn uuids(&self) -> &[ServiceUuid] {
        &self.uuids
    }

    /// Registers a service UUID.
    pub fn add_uuid(&mut self, uuid: Uuid128, svc_hint: u8) {
        self.uuids.push(ServiceUuid { uuid, svc_hint });
    }

    /// Removes every registration of `uuid`; the nil UUID removes all.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `uuid` is not registered.
    pub fn remove_uuid(&mut self, uuid: &Uuid128) -> Result<()> {
        if uuid.is_nil() {
            self.uuids.clear();
            return Ok(());
        }

        let before = self.uuids.len();
        self.uuids.retain(|s| s.uuid != *uuid);
        if self.uuids.len() == before {
            return Err(Error::NotFound { what: "uuid" });
        }
        Ok(())
    }

    /// Recomputes the class of device.
    ///
    /// Returns the new class if it differs from the one last written to the
    /// controller. The cached copy only changes through [`Self::commit_class`].
    #[must_use]
    pub fn refresh_class(&self) -> Option<[u8; 3]> {
        if self.has(ControllerFlags::SERVICE_CACHE) {
            return None;
        }

        let class = build_class(self.major_class, self.minor_class, &self.uuids);
        (class != self.dev_class).then_some(class)
    }

    /// Records `class` as written to the controller.
    pub fn commit_class(&mut self, class: [u8; 3]) {
        self.dev_class = class;
    }

    /// Recomputes the extended inquiry response.
    ///
    /// Returns the new EIR if it must be written to the controller. Nothing
    /// is returned when the controller cannot carry EIR, simple pairing is
    /// off, updates are paused, a UUID has no 16-bit form, or the bytes are
    /// unchanged. The cached copy only changes through [`Self::commit_eir`].
    #[must_use]
    pub fn refresh_eir(&self, max_name_len: usize) -> Option<[u8; EIR_LEN]> {
        if !self.info.supports_eir() || self.info.ssp_mode == 0 {
            return None;
        }
        if self.has(ControllerFlags::SERVICE_CACHE) {
            return None;
        }

        let eir = build_eir(&self.name, &self.uuids, max_name_len)?;
        (eir != self.eir).then_some(eir)
    }

    /// Records `eir` as written to the controller.
    pub fn commit_eir(&mut self, eir: [u8; EIR_LEN]) {
        self.eir = eir;
    }

    /// Returns the stored keys.
    #[must_use]
    pub fn link_keys(&self) -> &[LinkKey] {
        &self.link_keys
    }

    /// Returns the stored link key for `address`, if any.
    #[must_use]
    pub fn find_key(&self, address: &Address) -> Option<&LinkKey> {
        self.link_keys
            .iter()
            .find(|k| k.address == *address && !k.is_long_term())
    }

    /// Stores a key, replacing any key of the same kind for the same device.
    pub fn add_key(&mut self, key: LinkKey) {
        let long_term = key.is_long_term();
        self.link_keys
            .retain(|k| k.address != key.address || k.is_long_term() != long_term);
        self.link_keys.push(key);
    }

    /// Replaces the whole key set in one step.
    pub fn replace_keys(&mut self, debug_keys: bool, keys: Vec<LinkKey>) {
        self.link_keys.clear();
        self.set_flag(ControllerFlags::LINK_KEYS, true);
        self.set_flag(ControllerFlags::DEBUG_KEYS, debug_keys);
        for key in keys {
            self.add_key(key);
        }
    }

    /// Removes every key stored for `address`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no key is stored for the device.
    pub fn remove_key(&mut self, address: &Address) -> Result<()> {
        let before = self.link_keys.len();
        self.link_keys.retain(|k| k.address != *address);
        if self.link_keys.len() == before {
            return Err(Error::NotFound { what: "link key" });
        }
        Ok(())
    }

    /// Returns the out-of-band data stored for `address`, if any.
    #[must_use]
    pub fn remote_oob(&self, address: &Address) -> Option<&RemoteOobData> {
        self.remote_oob.iter().find(|d| d.address == *address)
    }

    /// Stores out-of-band data, replacing earlier data for the same device.
    pub fn add_remote_oob(&mut self, data: RemoteOobData) {
        match self.remote_oob.iter_mut().find(|d| d.address == data.address) {
            Some(existing) => *existing = data,
            None => self.remote_oob.push(data),
        }
    }

    /// Removes the out-of-band data stored for `address`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if nothing is stored for the device.
    pub fn remove_remote_oob(&mut self, address: &Address) -> Result<()> {
        let before = self.remote_oob.len();
        self.remote_oob.retain(|d| d.address != *address);
        if self.remote_oob.len() == before {
            return Err(Error::NotFound { what: "remote oob data" });
        }
        Ok(())
    }

    /// Returns true if `address` is blocked.
    #[must_use]
    pub fn is_blocked(&self, address: &Address) -> bool {
        self.blocked.contains(address)
    }

    /// Blocks a device.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadAddress` for the all-zero address and
    /// `Error::Exists` if the device is already blocked.
    pub fn block(&mut self, address: Address) -> Result<()> {
        if address.is_any() {
            return Err(Error::BadAddress);
        }
        if self.is_blocked(&address) {
            return Err(Error::Exists {
                what: "blocked device",
            });
        }
        self.blocked.push(address);
        Ok(())
    }

    /// Unblocks a device; the all-zero address clears the block list.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the device is not blocked.
    pub fn unblock(&mut self, address: &Address) -> Result<()> {
        if address.is_any() {
            self.blocked.clear();
            return Ok(());
        }
        let before = self.blocked.len();
        self.blocked.retain(|a| a != address);
        if self.blocked.len() == before {
            return Err(Error::NotFound {
                what: "blocked device",
            });
        }
        Ok(())
    }

    /// Security mode: 3 with link-level authentication, 4 with simple
    /// pairing, otherwise 2.
    #[must_use]
    pub const fn security_mode(&self) -> u8 {
        if self.flags.contains(ControllerFlags::AUTH) {
            3
        } else if self.info.ssp_mode > 0 {
            4
        } else {
            2
        }
    }

    /// Builds the `READ_INFO` reply.
    #[must_use]
    pub fn read_info(&self) -> ReadInfoReply {
        ReadInfoReply {
            dev_type: self.info.dev_type,
            powered: self.has(ControllerFlags::UP),
            connectable: self.has(ControllerFlags::CONNECTABLE),
            discoverable: self.has(ControllerFlags::DISCOVERABLE),
            pairable: self.has(ControllerFlags::PAIRABLE),
            sec_mode: self.security_mode(),
            address: self.info.address,
            dev_class: self.dev_class,
            features: self.info.features,
            manufacturer: self.info.manufacturer,
            hci_version: self.info.hci_version,
            hci_revision: self.info.hci_revision,
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KEY_TYPE_LTK;

    fn eir_capable() -> ControllerState {
        let mut features = [0u8; 8];
        features[6] = ControllerInfo::FEATURE_EXT_INQUIRY | ControllerInfo::FEATURE_SIMPLE_PAIRING;
        let info = ControllerInfo::new(0, Address::new([1, 2, 3, 4, 5, 6]))
            .features(features)
            .ssp_mode(1)
            .name("hci0");
        ControllerState::new(info)
    }

    #[test]
    fn test_power_off_clears_scans() {
        let mut state = eir_capable();
        assert!(state.set_powered(true));
        assert!(state.set_discoverable(true));
        assert!(state.set_connectable(true));
        assert!(!state.set_powered(true));

        assert!(state.set_powered(false));
        assert!(!state.has(ControllerFlags::DISCOVERABLE));
        assert!(!state.has(ControllerFlags::CONNECTABLE));
    }

    #[test]
    fn test_add_remove_uuid_round_trip() {
        let mut state = eir_capable();
        state.set_class(0x01, 0x04);
        let class_before = state.refresh_class().unwrap();
        let eir_before = state.refresh_eir(DEFAULT_MAX_NAME_LEN).unwrap();
        state.commit_class(class_before);
        state.commit_eir(eir_before);

        let uuid = Uuid128::from_u16(0x110B);
        state.add_uuid(uuid, 0x20);
        assert_eq!(state.refresh_class(), Some([0x04, 0x01, 0x20]));
        assert!(state.refresh_eir(DEFAULT_MAX_NAME_LEN).is_some());

        state.remove_uuid(&uuid).unwrap();
        assert_eq!(state.refresh_class(), None);
        assert_eq!(state.refresh_eir(DEFAULT_MAX_NAME_LEN), None);
        assert_eq!(state.dev_class(), class_before);
        assert_eq!(state.eir(), &eir_before);
    }

    #[test]
    fn test_refresh_leaves_cache_until_commit() {
        let mut state = eir_capable();
        state.set_class(0x01, 0x04);
        let class = state.refresh_class().unwrap();
        assert_eq!(state.dev_class(), [0; 3]);
        assert_eq!(state.refresh_class(), Some(class));

        state.commit_class(class);
        assert_eq!(state.refresh_class(), None);

        let eir = state.refresh_eir(DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(state.refresh_eir(DEFAULT_MAX_NAME_LEN), Some(eir));
        state.commit_eir(eir);
        assert_eq!(state.refresh_eir(DEFAULT_MAX_NAME_LEN), None);
    }

    #[test]
    fn test_remove_uuid() {
        let mut state = eir_capable();
        state.add_uuid(Uuid128::from_u16(0x110B), 0);
        state.add_uuid(Uuid128::from_u16(0x111F), 0);
        assert!(matches!(
            state.remove_uuid(&Uuid128::from_u16(0x1105)),
            Err(Error::NotFound { .. })
        ));
        state.remove_uuid(&Uuid128::NIL).unwrap();
        assert!(state.uuids().is_empty());
    }

    #[test]
    fn test_service_cache_pauses_refresh() {
        let mut state = eir_capable();
        state.set_service_cache(true);
        state.add_uuid(Uuid128::from_u16(0x110B), 0x20);
        assert_eq!(state.refresh_class(), None);
        assert_eq!(state.refresh_eir(DEFAULT_MAX_NAME_LEN), None);

        state.set_service_cache(false);
        assert!(state.refresh_class().is_some());
        let eir = state.refresh_eir(DEFAULT_MAX_NAME_LEN).unwrap();
        state.commit_eir(eir);
        assert_eq!(state.refresh_eir(DEFAULT_MAX_NAME_LEN), None);
    }

    #[test]
    fn test_eir_requires_support() {
        let mut state = ControllerState::new(ControllerInfo::new(0, Address::ANY).name("x"));
        state.add_uuid(Uuid128::from_u16(0x110B), 0);
        assert_eq!(state.refresh_eir(DEFAULT_MAX_NAME_LEN), None);
    }

    #[test]
    fn test_replace_keys() {
        let mut state = eir_capable();
        let a = Address::new([1; 6]);
        let b = Address::new([2; 6]);
        state.add_key(LinkKey::new(a, 0x04, [0; 16], 0));

        state.replace_keys(true, vec![LinkKey::new(b, 0x04, [1; 16], 4)]);
        assert!(state.find_key(&a).is_none());
        assert!(state.find_key(&b).is_some());
        assert!(state.has(ControllerFlags::LINK_KEYS));
        assert!(state.has(ControllerFlags::DEBUG_KEYS));

        state.replace_keys(false, Vec::new());
        assert!(!state.has(ControllerFlags::DEBUG_KEYS));
        assert!(state.link_keys().is_empty());
    }

    #[test]
    fn test_link_key_and_ltk_coexist() {
        let mut state = eir_capable();
        let a = Address::new([1; 6]);
        state.add_key(LinkKey::new(a, 0x04, [0; 16], 0));
        let mut ltk = LinkKey::new(a, KEY_TYPE_LTK, [1; 16], 0);
        ltk.data = vec![0; 10];
        state.add_key(ltk);
        state.add_key(LinkKey::new(a, 0x05, [2; 16], 0));
        assert_eq!(state.link_keys().len(), 2);
        assert_eq!(state.find_key(&a).map(|k| k.key_type), Some(0x05));

        state.remove_key(&a).unwrap();
        assert!(state.link_keys().is_empty());
        assert!(matches!(state.remove_key(&a), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_block_list() {
        let mut state = eir_capable();
        let a = Address::new([1; 6]);
        assert!(matches!(state.block(Address::ANY), Err(Error::BadAddress)));
        state.block(a).unwrap();
        assert!(matches!(state.block(a), Err(Error::Exists { .. })));
        assert!(state.is_blocked(&a));

        state.unblock(&a).unwrap();
        assert!(matches!(state.unblock(&a), Err(Error::NotFound { .. })));

        state.block(a).unwrap();
        state.block(Address::new([2; 6])).unwrap();
        state.unblock(&Address::ANY).unwrap();
        assert!(!state.is_blocked(&a));
    }

    #[test]
    fn test_remote_oob() {
        let mut state = eir_capable();
        let a = Address::new([1; 6]);
        state.add_remote_oob(RemoteOobData {
            address: a,
            hash: [1; 16],
            randomizer: [2; 16],
        });
        state.add_remote_oob(RemoteOobData {
            address: a,
            hash: [3; 16],
            randomizer: [4; 16],
        });
        assert_eq!(state.remote_oob(&a).map(|d| d.hash), Some([3; 16]));
        state.remove_remote_oob(&a).unwrap();
        assert!(state.remove_remote_oob(&a).is_err());
    }

    #[test]
    fn test_read_info() {
        let mut state = eir_capable();
        state.set_pairable(true);
        let info = state.read_info();
        assert!(info.pairable);
        assert!(!info.powered);
        assert_eq!(info.sec_mode, 4);
        assert_eq!(info.name, b"hci0");

        state.set_flag(ControllerFlags::AUTH, true);
        assert_eq!(state.security_mode(), 3);
    }
}
