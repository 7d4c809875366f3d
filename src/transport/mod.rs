//! Transport layer between the management engine and the controllers.
//!
//! The engine never talks to hardware itself. It submits controller
//! commands through a [`Transport`] and learns about their outcome later,
//! when the transport calls one of the completion callbacks on
//! [`Manager`](crate::Manager). Submission is fire-and-forget: a successful
//! return only means the command was queued.
//!
//! A transport must not call back into the engine from inside a submission;
//! the controller lock is held while a command is submitted.

pub mod connection;
pub mod recording;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::protocol::HciOpcode;
use crate::types::{Address, AuthType, LinkKey, LinkType, SecurityLevel};

pub use connection::{CompletionSink, Connection, ConnectionRef};
pub use recording::{RecordingTransport, Submission};

/// Trait for transport implementations.
pub trait Transport: Send + Sync + 'static {
    /// Submits a controller command.
    fn send_command(&self, index: u16, opcode: HciOpcode, params: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Requests a power transition. The outcome arrives through
    /// [`Manager::powered`](crate::Manager::powered).
    fn set_power(&self, index: u16, on: bool) -> BoxFuture<'_, Result<()>>;

    /// Looks up a live connection.
    fn lookup_connection(&self, index: u16, link_type: LinkType, address: &Address) -> Option<ConnectionRef>;

    /// Returns the remote addresses of every live connection.
    fn connections(&self, index: u16) -> Vec<Address>;

    /// Returns the connection to `address`, creating it if needed.
    fn connect(
        &self,
        index: u16,
        address: Address,
        sec_level: SecurityLevel,
        auth_type: AuthType,
    ) -> BoxFuture<'_, Result<ConnectionRef>>;

    /// Starts securing a connection. Returns true if the link already meets
    /// the requested level and no further event will follow.
    fn secure_connection<'a>(
        &'a self,
        conn: &'a ConnectionRef,
        sec_level: SecurityLevel,
        auth_type: AuthType,
    ) -> BoxFuture<'a, bool>;
}

/// Persistent key store.
pub trait KeyStorage: Send + Sync {
    /// Persists keys for controller `index`.
    fn persist_keys<'a>(&'a self, index: u16, keys: &'a [LinkKey]) -> BoxFuture<'a, Result<()>>;
}
