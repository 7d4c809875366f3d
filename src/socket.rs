//! Client reply channels.
//!
//! Every client holds one [`Subscription`]; the engine holds the matching
//! [`SocketRef`] in the subscriber list and in every pending command the
//! client issued. The channel stays open until the last reference is
//! dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::FrameError;
use crate::protocol::frame::{Frame, decode};

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a client socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

/// Shared handle to a client socket.
pub type SocketRef = Arc<Socket>;

/// Sending half of a client reply channel.
#[derive(Debug)]
pub struct Socket {
    id: SocketId,
    tx: mpsc::Sender<Bytes>,
}

impl Socket {
    /// Creates a socket whose queue holds up to `capacity` frames.
    #[must_use]
    pub fn new(capacity: usize) -> (SocketRef, Subscription) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = SocketId(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed));
        (Arc::new(Self { id, tx }), Subscription { id, rx })
    }

    /// Returns the socket id.
    #[must_use]
    pub const fn id(&self) -> SocketId {
        self.id
    }

    /// Queues a frame. A full or closed queue drops the frame.
    pub fn send(&self, frame: Bytes) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("socket {:?}: queue full, dropping frame", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("socket {:?}: closed, dropping frame", self.id);
                false
            }
        }
    }

    /// Returns true if the client dropped its subscription.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a client reply channel.
#[derive(Debug)]
pub struct Subscription {
    id: SocketId,
    rx: mpsc::Receiver<Bytes>,
}

impl Subscription {
    /// Returns the id of the socket feeding this subscription.
    #[must_use]
    pub const fn id(&self) -> SocketId {
        self.id
    }

    /// Receives the next raw frame.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Receives a queued raw frame without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Receives the next frame and decodes its header.
    ///
    /// # Errors
    ///
    /// Returns a `FrameError` if the queued bytes are not a valid frame.
    pub async fn recv_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        self.rx.recv().await.map(|bytes| decode(&bytes))
    }

    /// Decodes a queued frame without waiting.
    pub fn try_recv_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        self.try_recv().map(|bytes| decode(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (socket, mut sub) = Socket::new(4);
        assert_eq!(socket.id(), sub.id());
        assert!(socket.send(Bytes::from_static(&[0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01])));
        let frame = sub.recv_frame().await.unwrap().unwrap();
        assert_eq!(frame.header.opcode, 0x0006);
        assert_eq!(&frame.payload[..], &[1]);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (socket, mut sub) = Socket::new(1);
        assert!(socket.send(Bytes::from_static(b"a")));
        assert!(!socket.send(Bytes::from_static(b"b")));
        assert_eq!(sub.try_recv().as_deref(), Some(&b"a"[..]));
    }

    #[tokio::test]
    async fn test_closed_socket() {
        let (socket, sub) = Socket::new(1);
        drop(sub);
        assert!(socket.is_closed());
        assert!(!socket.send(Bytes::from_static(b"a")));
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _sa) = Socket::new(1);
        let (b, _sb) = Socket::new(1);
        assert_ne!(a.id(), b.id());
    }
}
