//! High-level management engine.
//!
//! A [`Manager`] owns the registry and the transport handle. Client tasks
//! feed it raw frames through [`Manager::handle_message`]; the transport's
//! event task reports controller outcomes through the completion callbacks
//! in [`crate::event`]. Clones share the same engine.

use std::sync::Arc;

use crate::controller::DEFAULT_MAX_NAME_LEN;
use crate::protocol::frame::{encode_complete, encode_status};
use crate::protocol::{Opcode, Status};
use crate::registry::Registry;
use crate::socket::{Socket, SocketRef, Subscription};
use crate::transport::{KeyStorage, Transport};

/// Default number of frames queued per client socket.
pub const DEFAULT_SOCKET_QUEUE_CAPACITY: usize = 64;

/// Default inquiry length (units of 1.28 s).
pub const DEFAULT_INQUIRY_LENGTH: u8 = 0x08;

/// General inquiry access code, little-endian.
pub const GIAC: [u8; 3] = [0x33, 0x8B, 0x9E];

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Frames queued per client socket before new frames are dropped.
    pub socket_queue_capacity: usize,
    /// Inquiry length used by `START_DISCOVERY`.
    pub inquiry_length: u8,
    /// Inquiry access code used by `START_DISCOVERY`.
    pub inquiry_lap: [u8; 3],
    /// Longest local name carried in full in the EIR.
    pub max_eir_name_len: usize,
}

impl ManagerConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            socket_queue_capacity: DEFAULT_SOCKET_QUEUE_CAPACITY,
            inquiry_length: DEFAULT_INQUIRY_LENGTH,
            inquiry_lap: GIAC,
            max_eir_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }

    /// Sets the per-socket queue capacity.
    #[must_use]
    pub const fn socket_queue_capacity(mut self, capacity: usize) -> Self {
        self.socket_queue_capacity = capacity;
        self
    }

    /// Sets the inquiry length.
    #[must_use]
    pub const fn inquiry_length(mut self, length: u8) -> Self {
        self.inquiry_length = length;
        self
    }

    /// Sets the inquiry access code.
    #[must_use]
    pub const fn inquiry_lap(mut self, lap: [u8; 3]) -> Self {
        self.inquiry_lap = lap;
        self
    }

    /// Sets the longest name carried in full in the EIR.
    #[must_use]
    pub const fn max_eir_name_len(mut self, len: usize) -> Self {
        self.max_eir_name_len = len;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The management engine.
pub struct Manager<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) storage: Option<Arc<dyn KeyStorage>>,
    pub(crate) config: ManagerConfig,
}

impl<T: Transport> Clone for Manager<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            registry: Arc::clone(&self.registry),
            storage: self.storage.clone(),
            config: self.config,
        }
    }
}

impl<T: Transport> std::fmt::Debug for Manager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Manager<T> {
    /// Creates an engine with default settings.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ManagerConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(transport: T, config: ManagerConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            registry: Arc::new(Registry::new()),
            storage: None,
            config,
        }
    }

    /// Sets the store used to persist keys.
    #[must_use]
    pub fn key_storage(mut self, storage: Arc<dyn KeyStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Opens a client socket and subscribes it to events.
    pub async fn open_socket(&self) -> (SocketRef, Subscription) {
        let (socket, subscription) = Socket::new(self.config.socket_queue_capacity);
        self.registry.subscribe(socket.clone()).await;
        tracing::debug!("socket {:?} opened", socket.id());
        (socket, subscription)
    }

    /// Unsubscribes a client socket. Replies to its pending commands are
    /// dropped once they resolve.
    pub async fn close_socket(&self, socket: &SocketRef) {
        if self.registry.unsubscribe(socket.id()).await {
            tracing::debug!("socket {:?} closed", socket.id());
        }
    }

    pub(crate) fn reply_status(socket: &Socket, index: u16, opcode: u16, status: Status) {
        tracing::debug!("reply: {:#06x} hci{} status {:?}", opcode, index, status);
        socket.send(encode_status(index, opcode, status));
    }

    pub(crate) fn reply_complete(socket: &Socket, index: u16, opcode: Opcode, result: &[u8]) {
        match encode_complete(index, opcode.into(), result) {
            Ok(frame) => {
                tracing::debug!("reply: {:?} hci{} complete", opcode, index);
                socket.send(frame);
            }
            Err(e) => {
                tracing::warn!("reply: cannot encode {:?} result: {}", opcode, e);
                Self::reply_status(socket, index, opcode.into(), Status::InvalidParameters);
            }
        }
    }
}
