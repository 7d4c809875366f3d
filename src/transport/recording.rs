//! In-memory transport that records what the engine submits.
//!
//! Useful for driving the engine without hardware: every submission is
//! logged, the next submission can be made to fail, and connections are
//! scripted by the caller.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::protocol::{HciOpcode, Status};
use crate::transport::{Connection, ConnectionRef, Transport};
use crate::types::{Address, AuthType, LinkType, SecurityLevel};

/// One request seen by a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A controller command.
    Command {
        index: u16,
        opcode: HciOpcode,
        params: Bytes,
    },
    /// A power transition request.
    Power { index: u16, on: bool },
    /// A connection request.
    Connect {
        index: u16,
        address: Address,
        sec_level: SecurityLevel,
        auth_type: AuthType,
    },
    /// A request to secure an existing link.
    Secure {
        address: Address,
        sec_level: SecurityLevel,
        auth_type: AuthType,
    },
}

#[derive(Debug, Default)]
struct Recorder {
    submissions: Vec<Submission>,
    reject_next: Option<Status>,
    connections: Vec<(u16, ConnectionRef)>,
    next_handle: u16,
    secure_immediately: bool,
}

impl Recorder {
    fn take_rejection(&mut self) -> Result<()> {
        match self.reject_next.take() {
            Some(status) => Err(Error::transport(status, "rejected by recording transport")),
            None => Ok(()),
        }
    }
}

/// A [`Transport`] that records submissions instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    inner: Mutex<Recorder>,
}

impl RecordingTransport {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns every submission so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.recorder().submissions.clone()
    }

    /// Returns and clears the submissions so far.
    pub fn take_submissions(&self) -> Vec<Submission> {
        std::mem::take(&mut self.recorder().submissions)
    }

    /// Returns the controller commands submitted so far.
    #[must_use]
    pub fn commands(&self) -> Vec<(u16, HciOpcode, Bytes)> {
        self.recorder()
            .submissions
            .iter()
            .filter_map(|s| match s {
                Submission::Command {
                    index,
                    opcode,
                    params,
                } => Some((*index, *opcode, params.clone())),
                _ => None,
            })
            .collect()
    }

    /// Makes the next submission fail with `status`.
    pub fn reject_next(&self, status: Status) {
        self.recorder().reject_next = Some(status);
    }

    /// Makes `secure_connection` report links as already secure.
    pub fn secure_immediately(&self, on: bool) {
        self.recorder().secure_immediately = on;
    }

    /// Adds a live connection on controller `index`.
    pub fn add_connection(&self, index: u16, conn: ConnectionRef) {
        self.recorder().connections.push((index, conn));
    }

    /// Removes the live connection to `address` on controller `index`.
    pub fn remove_connection(&self, index: u16, address: &Address) -> Option<ConnectionRef> {
        let mut recorder = self.recorder();
        let pos = recorder
            .connections
            .iter()
            .position(|(i, c)| *i == index && c.address() == address)?;
        Some(recorder.connections.remove(pos).1)
    }
}

impl Transport for RecordingTransport {
    fn send_command(&self, index: u16, opcode: HciOpcode, params: Bytes) -> BoxFuture<'_, Result<()>> {
        let result = {
            let mut recorder = self.recorder();
            recorder.take_rejection().map(|()| {
                recorder.submissions.push(Submission::Command {
                    index,
                    opcode,
                    params,
                });
            })
        };
        async move { result }.boxed()
    }

    fn set_power(&self, index: u16, on: bool) -> BoxFuture<'_, Result<()>> {
        let result = {
            let mut recorder = self.recorder();
            recorder
                .take_rejection()
                .map(|()| recorder.submissions.push(Submission::Power { index, on }))
        };
        async move { result }.boxed()
    }

    fn lookup_connection(&self, index: u16, link_type: LinkType, address: &Address) -> Option<ConnectionRef> {
        self.recorder()
            .connections
            .iter()
            .find(|(i, c)| *i == index && c.link_type() == link_type && c.address() == address)
            .map(|(_, c)| c.clone())
    }

    fn connections(&self, index: u16) -> Vec<Address> {
        self.recorder()
            .connections
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, c)| *c.address())
            .collect()
    }

    fn connect(
        &self,
        index: u16,
        address: Address,
        sec_level: SecurityLevel,
        auth_type: AuthType,
    ) -> BoxFuture<'_, Result<ConnectionRef>> {
        let result = {
            let mut recorder = self.recorder();
            recorder.take_rejection().map(|()| {
                recorder.submissions.push(Submission::Connect {
                    index,
                    address,
                    sec_level,
                    auth_type,
                });
                let existing = recorder
                    .connections
                    .iter()
                    .find(|(i, c)| *i == index && c.link_type() == LinkType::Acl && *c.address() == address)
                    .map(|(_, c)| c.clone());
                existing.unwrap_or_else(|| {
                    recorder.next_handle += 1;
                    let conn = Connection::new(recorder.next_handle, address, LinkType::Acl);
                    recorder.connections.push((index, conn.clone()));
                    conn
                })
            })
        };
        async move { result }.boxed()
    }

    fn secure_connection<'a>(
        &'a self,
        conn: &'a ConnectionRef,
        sec_level: SecurityLevel,
        auth_type: AuthType,
    ) -> BoxFuture<'a, bool> {
        let secure = {
            let mut recorder = self.recorder();
            recorder.submissions.push(Submission::Secure {
                address: *conn.address(),
                sec_level,
                auth_type,
            });
            recorder.secure_immediately
        };
        async move { secure }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_commands() {
        let transport = RecordingTransport::new();
        transport
            .send_command(0, HciOpcode::WriteScanEnable, Bytes::from_static(&[2]))
            .await
            .unwrap();
        transport.set_power(1, true).await.unwrap();

        assert_eq!(
            transport.commands(),
            vec![(0, HciOpcode::WriteScanEnable, Bytes::from_static(&[2]))]
        );
        assert_eq!(transport.take_submissions().len(), 2);
        assert!(transport.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_reject_next() {
        let transport = RecordingTransport::new();
        transport.reject_next(Status::Io);
        let err = transport.set_power(0, true).await.unwrap_err();
        assert_eq!(err.status(), Status::Io);
        assert!(transport.set_power(0, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_reuses_link() {
        let transport = RecordingTransport::new();
        let addr = Address::new([1; 6]);
        let a = transport
            .connect(0, addr, SecurityLevel::High, AuthType::DedicatedBondingMitm)
            .await
            .unwrap();
        let b = transport
            .connect(0, addr, SecurityLevel::High, AuthType::DedicatedBondingMitm)
            .await
            .unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert!(transport.lookup_connection(0, LinkType::Acl, &addr).is_some());
        assert!(transport.lookup_connection(0, LinkType::Le, &addr).is_none());
        assert_eq!(transport.connections(0), vec![addr]);
        assert!(transport.remove_connection(0, &addr).is_some());
        assert!(transport.connections(0).is_empty());
    }
}
