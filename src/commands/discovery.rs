//! Device discovery.

use bytes::Bytes;

use super::Reply;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::protocol::hci::inquiry;
use crate::protocol::params::{NoParams, parse};
use crate::protocol::{HciOpcode, Opcode};
use crate::socket::SocketRef;
use crate::transport::Transport;

impl<T: Transport> Manager<T> {
    pub(crate) async fn start_discovery(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::StartDiscovery, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        self.ensure_idle(index, &[Opcode::StartDiscovery]).await?;

        let params = inquiry(self.config.inquiry_lap, self.config.inquiry_length);
        let reply = self
            .track(socket, Opcode::StartDiscovery, index, data.clone(), || {
                self.transport.send_command(index, HciOpcode::Inquiry, params)
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn stop_discovery(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::StopDiscovery, data)?;
        let state = self.lock_controller(index).await?;

        self.ensure_idle(index, &[Opcode::StopDiscovery]).await?;

        let reply = self
            .track(socket, Opcode::StopDiscovery, index, data.clone(), || {
                self.transport
                    .send_command(index, HciOpcode::InquiryCancel, Bytes::new())
            })
            .await;
        drop(state);
        reply
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::test_support::{controller_info, expect_event, expect_status, request};
    use crate::manager::{Manager, ManagerConfig};
    use crate::protocol::{EventCode, HciOpcode, Opcode, Status};
    use crate::transport::RecordingTransport;

    #[tokio::test]
    async fn test_start_discovery_uses_configured_inquiry() {
        crate::manager::test_support::init_tracing();
        let config = ManagerConfig::new().inquiry_length(0x04);
        let manager = Manager::with_config(RecordingTransport::new(), config);
        manager.register_controller(controller_info(0)).await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::StartDiscovery, 0, &[]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::StartDiscovery), Status::NotPowered);

        manager.powered(0, true).await.unwrap();
        expect_event(&mut sub, EventCode::Powered);
        manager
            .handle_message(&socket, &request(Opcode::StartDiscovery, 0, &[]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::StartDiscovery), Status::Success);
        assert_eq!(
            manager.transport().commands(),
            vec![(0, HciOpcode::Inquiry, bytes::Bytes::from_static(&[0x33, 0x8B, 0x9E, 0x04, 0x00]))]
        );

        manager
            .handle_message(&socket, &request(Opcode::StartDiscovery, 0, &[]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::StartDiscovery), Status::Busy);
    }

    #[tokio::test]
    async fn test_stop_discovery() {
        let manager = crate::manager::test_support::manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::StopDiscovery, 0, &[]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::StopDiscovery), Status::Success);
        assert_eq!(manager.transport().commands()[0].1, HciOpcode::InquiryCancel);
        assert!(manager.transport().commands()[0].2.is_empty());
    }
}
