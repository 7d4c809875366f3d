//! Controllers, pending commands and subscribers of one engine.
//!
//! Lock order: a controller's state lock is taken before the pending list,
//! and the pending list before any connection lock. The subscriber list is
//! a leaf and is never held while another lock is acquired.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::controller::ControllerState;
use crate::pending::PendingList;
use crate::protocol::MgmtEvent;
use crate::socket::{SocketId, SocketRef};

/// Shared handle to a controller's state.
pub type ControllerHandle = Arc<Mutex<ControllerState>>;

/// Registry of one management engine.
#[derive(Debug, Default)]
pub struct Registry {
    controllers: RwLock<BTreeMap<u16, ControllerHandle>>,
    pending: Mutex<PendingList>,
    sockets: RwLock<Vec<SocketRef>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the controller with `index`.
    pub async fn controller(&self, index: u16) -> Option<ControllerHandle> {
        self.controllers.read().await.get(&index).cloned()
    }

    /// Returns every registered index in ascending order.
    pub async fn indexes(&self) -> Vec<u16> {
        self.controllers.read().await.keys().copied().collect()
    }

    /// Adds a controller. Returns false if the index is taken.
    pub async fn insert(&self, state: ControllerState) -> bool {
        let index = state.index();
        let mut controllers = self.controllers.write().await;
        if controllers.contains_key(&index) {
            return false;
        }
        controllers.insert(index, Arc::new(Mutex::new(state)));
        true
    }

    /// Unlinks a controller so no new request can reach it.
    pub async fn remove(&self, index: u16) -> Option<ControllerHandle> {
        self.controllers.write().await.remove(&index)
    }

    /// Returns the pending-command list.
    pub const fn pending(&self) -> &Mutex<PendingList> {
        &self.pending
    }

    /// Adds a subscriber.
    pub async fn subscribe(&self, socket: SocketRef) {
        self.sockets.write().await.push(socket);
    }

    /// Removes a subscriber. Pending commands keep their own reference.
    pub async fn unsubscribe(&self, id: SocketId) -> bool {
        let mut sockets = self.sockets.write().await;
        let before = sockets.len();
        sockets.retain(|s| s.id() != id);
        sockets.len() != before
    }

    /// Number of subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.sockets.read().await.len()
    }

    /// Sends an event to every subscriber except those in `skip`.
    pub async fn broadcast(&self, index: u16, event: &MgmtEvent, skip: &[SocketId]) {
        let frame = match event.encode(index) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("broadcast: cannot encode {:?}: {}", event.code(), e);
                return;
            }
        };

        let sockets = self.sockets.read().await;
        tracing::debug!(
            "broadcast: {:?} hci{} to {} subscribers",
            event.code(),
            index,
            sockets.len().saturating_sub(skip.len())
        );
        for socket in sockets.iter().filter(|s| !skip.contains(&s.id())) {
            socket.send(frame.clone());
        }
    }
}
