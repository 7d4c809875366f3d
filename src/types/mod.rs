//! Data types shared across the management engine.
//!
//! This module contains the core data structures used throughout the library:
//! - Device addresses and service UUIDs
//! - Controller identity and mode flags
//! - Bonding keys and out-of-band data

pub mod address;
pub mod controller;
pub mod key;
pub mod uuid;

pub use address::{Address, LinkType};
pub use controller::{
    AuthType, ControllerFlags, ControllerInfo, IoCapability, NAME_LEN, SecurityLevel,
};
pub use key::{KEY_TYPE_LTK, LinkKey, RemoteOobData};
pub use uuid::{ServiceUuid, Uuid128};
