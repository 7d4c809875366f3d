//! Power, scan and pairable modes.

use bytes::Bytes;

use super::Reply;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::protocol::hci::{byte_param, connectable_scan, discoverable_scan};
use crate::protocol::params::{Mode, encode_mode, parse};
use crate::protocol::{HciOpcode, MgmtEvent, Opcode};
use crate::socket::SocketRef;
use crate::transport::Transport;
use crate::types::ControllerFlags;

impl<T: Transport> Manager<T> {
    pub(crate) async fn set_powered(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: Mode = parse(Opcode::SetPowered, data)?;
        let state = self.lock_controller(index).await?;

        if state.is_powered() == cp.val {
            return Err(Error::Already);
        }
        self.ensure_idle(index, &[Opcode::SetPowered]).await?;

        let reply = self
            .track(socket, Opcode::SetPowered, index, data.clone(), || {
                self.transport.set_power(index, cp.val)
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn set_discoverable(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: Mode = parse(Opcode::SetDiscoverable, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        self.ensure_idle(index, &[Opcode::SetDiscoverable, Opcode::SetConnectable])
            .await?;
        if cp.val == state.has(ControllerFlags::DISCOVERABLE) && state.has(ControllerFlags::CONNECTABLE) {
            return Err(Error::Already);
        }

        let scan = discoverable_scan(cp.val);
        let reply = self
            .track(socket, Opcode::SetDiscoverable, index, data.clone(), || {
                self.transport
                    .send_command(index, HciOpcode::WriteScanEnable, byte_param(scan))
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn set_connectable(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: Mode = parse(Opcode::SetConnectable, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        self.ensure_idle(index, &[Opcode::SetDiscoverable, Opcode::SetConnectable])
            .await?;
        if cp.val == state.has(ControllerFlags::CONNECTABLE) {
            return Err(Error::Already);
        }

        let scan = connectable_scan(cp.val);
        let reply = self
            .track(socket, Opcode::SetConnectable, index, data.clone(), || {
                self.transport
                    .send_command(index, HciOpcode::WriteScanEnable, byte_param(scan))
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn set_pairable(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: Mode = parse(Opcode::SetPairable, data)?;
        let mut state = self.lock_controller(index).await?;

        let changed = state.set_pairable(cp.val);
        Self::reply_complete(socket, index, Opcode::SetPairable, &encode_mode(cp.val));
        if changed {
            self.registry
                .broadcast(index, &MgmtEvent::Pairable(cp.val), &[socket.id()])
                .await;
        }
        drop(state);
        Ok(Reply::Handled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::manager::test_support::{drain, expect_complete, expect_event, expect_status, manager, request};
    use crate::protocol::{EventCode, HciOpcode, Opcode, Status};
    use crate::transport::Submission;

    #[tokio::test]
    async fn test_set_powered_submits_and_acks() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetPowered, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::Success);
        assert_eq!(
            manager.transport().submissions(),
            vec![Submission::Power { index: 0, on: true }]
        );
        assert_eq!(manager.registry().pending().lock().await.len(), 1);

        // second request while the first is in flight
        manager
            .handle_message(&socket, &request(Opcode::SetPowered, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::Busy);
    }

    #[tokio::test]
    async fn test_set_powered_already() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetPowered, 0, &[0]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::Already);
        assert!(manager.transport().submissions().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure_rolls_back() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;
        manager.transport().reject_next(Status::Io);

        manager
            .handle_message(&socket, &request(Opcode::SetPowered, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::Io);
        assert!(manager.registry().pending().lock().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_powered() {
        let manager = manager().await;
        let (a, mut sub_a) = manager.open_socket().await;
        let (b, mut sub_b) = manager.open_socket().await;

        let msg = Arc::new(request(Opcode::SetPowered, 0, &[1]));
        let first = {
            let (manager, msg) = (manager.clone(), msg.clone());
            tokio::spawn(async move { manager.handle_message(&a, &msg).await })
        };
        let second = {
            let (manager, msg) = (manager.clone(), msg.clone());
            tokio::spawn(async move { manager.handle_message(&b, &msg).await })
        };
        first.await.unwrap();
        second.await.unwrap();

        let mut statuses = vec![
            expect_status(&mut sub_a, Opcode::SetPowered),
            expect_status(&mut sub_b, Opcode::SetPowered),
        ];
        statuses.sort_by_key(|s| *s as u8);
        assert_eq!(statuses, vec![Status::Success, Status::Busy]);
        assert_eq!(manager.registry().pending().lock().await.len(), 1);
        assert_eq!(manager.transport().submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_modes_need_power() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetDiscoverable, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetDiscoverable), Status::NotPowered);

        manager
            .handle_message(&socket, &request(Opcode::SetConnectable, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetConnectable), Status::NotPowered);
    }

    #[tokio::test]
    async fn test_scan_modes_exclusive() {
        let manager = manager().await;
        manager.powered(0, true).await.unwrap();
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetDiscoverable, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetDiscoverable), Status::Success);
        assert_eq!(
            manager.transport().commands().last().map(|(_, op, p)| (*op, p.to_vec())),
            Some((HciOpcode::WriteScanEnable, vec![0x03]))
        );

        manager
            .handle_message(&socket, &request(Opcode::SetConnectable, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetConnectable), Status::Busy);
    }

    #[tokio::test]
    async fn test_set_connectable_already() {
        let manager = manager().await;
        manager.powered(0, true).await.unwrap();
        manager.connectable(0, true).await.unwrap();
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetConnectable, 0, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetConnectable), Status::Already);

        manager
            .handle_message(&socket, &request(Opcode::SetConnectable, 0, &[0]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetConnectable), Status::Success);
        assert_eq!(
            manager.transport().commands().last().map(|(_, _, p)| p.to_vec()),
            Some(vec![0x00])
        );
    }

    #[tokio::test]
    async fn test_set_pairable() {
        let manager = manager().await;
        let (a, mut sub_a) = manager.open_socket().await;
        let (_b, mut sub_b) = manager.open_socket().await;

        manager
            .handle_message(&a, &request(Opcode::SetPairable, 0, &[1]))
            .await;
        assert_eq!(&expect_complete(&mut sub_a, Opcode::SetPairable)[..], &[1]);
        assert!(sub_a.try_recv().is_none());
        assert_eq!(&expect_event(&mut sub_b, EventCode::Pairable)[..], &[1]);

        // unchanged state replies but does not broadcast
        manager
            .handle_message(&a, &request(Opcode::SetPairable, 0, &[1]))
            .await;
        assert_eq!(&expect_complete(&mut sub_a, Opcode::SetPairable)[..], &[1]);
        assert!(sub_b.try_recv().is_none());
        drain(&mut sub_a);

        assert!(manager.transport().submissions().is_empty());
    }
}
