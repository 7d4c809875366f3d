//! Link objects owned by the transport.
//!
//! A [`Connection`] is shared between the transport and the engine. While a
//! pairing request is outstanding the connection carries a
//! [`CompletionSink`] naming the pending command to resolve; the transport
//! reports connect, security and disconnect outcomes through
//! [`Manager::pairing_event`](crate::Manager::pairing_event), which detaches
//! the sink before the pending command is released.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::pending::PendingId;
use crate::types::{Address, IoCapability, LinkType, SecurityLevel};

/// Shared handle to a connection.
pub type ConnectionRef = Arc<Connection>;

/// Where a connection reports its outcome while a request waits on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSink {
    /// A `PAIR_DEVICE` request on controller `index`.
    Pairing { index: u16, pending: PendingId },
}

#[derive(Debug, Default)]
struct LinkState {
    established: bool,
    pending_sec_level: SecurityLevel,
    io_capability: IoCapability,
    sink: Option<CompletionSink>,
}

/// A baseband or LE link to a remote device.
#[derive(Debug)]
pub struct Connection {
    handle: u16,
    address: Address,
    link_type: LinkType,
    state: Mutex<LinkState>,
}

impl Connection {
    /// Creates a connection that is still being set up.
    #[must_use]
    pub fn new(handle: u16, address: Address, link_type: LinkType) -> ConnectionRef {
        Arc::new(Self {
            handle,
            address,
            link_type,
            state: Mutex::new(LinkState::default()),
        })
    }

    /// Creates an established connection with the given pending security
    /// level.
    #[must_use]
    pub fn established(
        handle: u16,
        address: Address,
        link_type: LinkType,
        pending_sec_level: SecurityLevel,
    ) -> ConnectionRef {
        Arc::new(Self {
            handle,
            address,
            link_type,
            state: Mutex::new(LinkState {
                established: true,
                pending_sec_level,
                ..LinkState::default()
            }),
        })
    }

    /// Returns the controller-assigned handle.
    #[must_use]
    pub const fn handle(&self) -> u16 {
        self.handle
    }

    /// Returns the remote address.
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the link type.
    #[must_use]
    pub const fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Returns true once the link is up.
    pub async fn is_established(&self) -> bool {
        self.state.lock().await.established
    }

    /// Marks the link as up or down.
    pub async fn set_established(&self, established: bool) {
        self.state.lock().await.established = established;
    }

    /// Returns the security level being negotiated.
    pub async fn pending_sec_level(&self) -> SecurityLevel {
        self.state.lock().await.pending_sec_level
    }

    /// Sets the security level being negotiated.
    pub async fn set_pending_sec_level(&self, level: SecurityLevel) {
        self.state.lock().await.pending_sec_level = level;
    }

    /// Returns the IO capability announced for this link.
    pub async fn io_capability(&self) -> IoCapability {
        self.state.lock().await.io_capability
    }

    /// Sets the IO capability announced for this link.
    pub async fn set_io_capability(&self, io_capability: IoCapability) {
        self.state.lock().await.io_capability = io_capability;
    }

    /// Returns the attached sink, if any.
    pub async fn sink(&self) -> Option<CompletionSink> {
        self.state.lock().await.sink
    }

    /// Attaches a sink. Returns false if one is already attached.
    pub async fn attach_sink(&self, sink: CompletionSink) -> bool {
        let mut state = self.state.lock().await;
        if state.sink.is_some() {
            return false;
        }
        state.sink = Some(sink);
        true
    }

    /// Detaches and returns the sink.
    pub async fn detach_sink(&self) -> Option<CompletionSink> {
        self.state.lock().await.sink.take()
    }

    /// Detaches the sink only if it is still `expected`.
    pub(crate) async fn detach_if(&self, expected: CompletionSink) -> bool {
        let mut state = self.state.lock().await;
        if state.sink == Some(expected) {
            state.sink = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_attach_detach() {
        let conn = Connection::new(1, Address::new([1; 6]), LinkType::Acl);
        let sink = CompletionSink::Pairing {
            index: 0,
            pending: PendingId::from_raw(7),
        };
        assert!(conn.attach_sink(sink).await);
        assert!(!conn.attach_sink(sink).await);
        assert_eq!(conn.sink().await, Some(sink));

        let other = CompletionSink::Pairing {
            index: 0,
            pending: PendingId::from_raw(8),
        };
        assert!(!conn.detach_if(other).await);
        assert!(conn.detach_if(sink).await);
        assert_eq!(conn.detach_sink().await, None);
    }

    #[tokio::test]
    async fn test_established() {
        let conn = Connection::established(
            0x0042,
            Address::new([2; 6]),
            LinkType::Acl,
            SecurityLevel::High,
        );
        assert!(conn.is_established().await);
        assert_eq!(conn.pending_sec_level().await, SecurityLevel::High);
        conn.set_established(false).await;
        assert!(!conn.is_established().await);
    }
}
