//! Command handling for client requests.
//!
//! [`Manager::handle_message`] decodes one request frame, runs the handler
//! for its opcode and turns the outcome into a reply on the requesting
//! socket:
//!
//! - Synchronous commands mutate controller state and reply with
//!   `CMD_COMPLETE` straight away.
//! - Asynchronous commands register a [`PendingCommand`](crate::pending::PendingCommand),
//!   submit work to the transport and reply with a provisional `CMD_STATUS`
//!   of success. The final `CMD_COMPLETE` arrives later from a completion
//!   callback.
//! - Any error becomes a `CMD_STATUS` carrying [`Error::status`].

mod discovery;
mod info;
mod keys;
mod link;
mod modes;
mod services;

use bytes::{Bytes, BytesMut};
use tokio::sync::OwnedMutexGuard;

use crate::controller::ControllerState;
use crate::error::{Error, FrameError, Result};
use crate::manager::Manager;
use crate::pending::{IndexScope, PendingId};
use crate::protocol::frame::decode;
use crate::protocol::{HciOpcode, INDEX_NONE, Opcode, Status, hci};
use crate::socket::SocketRef;
use crate::transport::Transport;
use crate::types::Address;

/// Outcome of a successful handler.
#[derive(Debug)]
pub(crate) enum Reply {
    /// Reply with `CMD_COMPLETE` carrying this result.
    Complete(BytesMut),
    /// The handler already replied.
    Handled,
}

impl Reply {
    pub(crate) fn empty() -> Self {
        Self::Complete(BytesMut::new())
    }
}

impl<T: Transport> Manager<T> {
    /// Handles one request frame from `socket`.
    ///
    /// Every request gets exactly one immediate reply on the socket; errors
    /// never escape this function.
    pub async fn handle_message(&self, socket: &SocketRef, msg: &[u8]) {
        let frame = match decode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("request: {}", e);
                let (opcode, index) = match e {
                    FrameError::LengthMismatch { opcode, index, .. } => (opcode, index),
                    _ => (0, INDEX_NONE),
                };
                Self::reply_status(socket, index, opcode, Status::InvalidParameters);
                return;
            }
        };

        let index = frame.header.index;
        let Some(opcode) = Opcode::from_u16(frame.header.opcode) else {
            tracing::debug!("request: unknown opcode {:#06x}", frame.header.opcode);
            Self::reply_status(socket, index, frame.header.opcode, Status::UnknownCommand);
            return;
        };

        tracing::debug!("request: {:?} hci{} len {}", opcode, index, frame.payload.len());

        match self.dispatch(socket, opcode, index, &frame.payload).await {
            Ok(Reply::Complete(result)) => Self::reply_complete(socket, index, opcode, &result),
            Ok(Reply::Handled) => {}
            Err(e) => {
                if matches!(e, Error::Transport { .. }) {
                    tracing::error!("{:?} hci{}: {}", opcode, index, e);
                } else {
                    tracing::debug!("{:?} hci{}: {}", opcode, index, e);
                }
                Self::reply_status(socket, index, opcode.into(), e.status());
            }
        }
    }

    async fn dispatch(&self, socket: &SocketRef, opcode: Opcode, index: u16, data: &Bytes) -> Result<Reply> {
        match opcode {
            Opcode::ReadVersion => Self::read_version(data),
            Opcode::ReadIndexList => self.read_index_list(data).await,
            Opcode::ReadInfo => self.read_info(index, data).await,
            Opcode::SetPowered => self.set_powered(socket, index, data).await,
            Opcode::SetDiscoverable => self.set_discoverable(socket, index, data).await,
            Opcode::SetConnectable => self.set_connectable(socket, index, data).await,
            Opcode::SetPairable => self.set_pairable(socket, index, data).await,
            Opcode::AddUuid => self.add_uuid(index, data).await,
            Opcode::RemoveUuid => self.remove_uuid(index, data).await,
            Opcode::SetDevClass => self.set_dev_class(index, data).await,
            Opcode::SetServiceCache => self.set_service_cache(index, data).await,
            Opcode::LoadKeys => self.load_keys(index, data).await,
            Opcode::RemoveKey => self.remove_key(index, data).await,
            Opcode::Disconnect => self.disconnect(socket, index, data).await,
            Opcode::GetConnections => self.get_connections(index, data).await,
            Opcode::PinCodeReply => self.pin_code_reply(socket, index, data).await,
            Opcode::PinCodeNegReply => self.pin_code_neg_reply(socket, index, data).await,
            Opcode::SetIoCapability => self.set_io_capability(index, data).await,
            Opcode::PairDevice => self.pair_device(socket, index, data).await,
            Opcode::UserConfirmReply => {
                self.user_confirm_reply(socket, index, data, Opcode::UserConfirmReply).await
            }
            Opcode::UserConfirmNegReply => {
                self.user_confirm_reply(socket, index, data, Opcode::UserConfirmNegReply).await
            }
            Opcode::SetLocalName => self.set_local_name(socket, index, data).await,
            Opcode::ReadLocalOobData => self.read_local_oob_data(socket, index, data).await,
            Opcode::AddRemoteOobData => self.add_remote_oob_data(index, data).await,
            Opcode::RemoveRemoteOobData => self.remove_remote_oob_data(index, data).await,
            Opcode::StartDiscovery => self.start_discovery(socket, index, data).await,
            Opcode::StopDiscovery => self.stop_discovery(socket, index, data).await,
            Opcode::BlockDevice => self.block_device(index, data).await,
            Opcode::UnblockDevice => self.unblock_device(index, data).await,
        }
    }

    /// Locks controller `index`, failing if it is unknown or torn down.
    pub(crate) async fn lock_controller(&self, index: u16) -> Result<OwnedMutexGuard<ControllerState>> {
        let handle = self
            .registry
            .controller(index)
            .await
            .ok_or(Error::NoDevice { index })?;
        let state = handle.lock_owned().await;
        if state.is_removed() {
            return Err(Error::NoDevice { index });
        }
        Ok(state)
    }

    /// Fails with `Busy` if any of `opcodes` is pending on `index`.
    pub(crate) async fn ensure_idle(&self, index: u16, opcodes: &[Opcode]) -> Result<()> {
        let pending = self.registry.pending().lock().await;
        match opcodes
            .iter()
            .find(|op| pending.find(**op, IndexScope::Exact(index)).is_some())
        {
            Some(opcode) => Err(Error::Busy { opcode: *opcode }),
            None => Ok(()),
        }
    }

    /// Fails with `Busy` if `opcode` is pending on `index` for `address`.
    pub(crate) async fn ensure_idle_for(&self, index: u16, opcode: Opcode, address: &Address) -> Result<()> {
        let pending = self.registry.pending().lock().await;
        if pending
            .find_by(opcode, IndexScope::Exact(index), |c| c.address().as_ref() == Some(address))
            .is_some()
        {
            return Err(Error::Busy { opcode });
        }
        Ok(())
    }

    /// Registers a pending command and runs `submit`. The entry is rolled
    /// back if submission fails.
    pub(crate) async fn track_quiet<F, Fut>(
        &self,
        socket: &SocketRef,
        opcode: Opcode,
        index: u16,
        params: Bytes,
        submit: F,
    ) -> Result<PendingId>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let id = self
            .registry
            .pending()
            .lock()
            .await
            .add(socket.clone(), opcode, index, params);

        if let Err(e) = submit().await {
            self.registry.pending().lock().await.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Like [`Self::track_quiet`], then acknowledges the request with a
    /// provisional success status.
    pub(crate) async fn track<F, Fut>(
        &self,
        socket: &SocketRef,
        opcode: Opcode,
        index: u16,
        params: Bytes,
        submit: F,
    ) -> Result<Reply>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.track_quiet(socket, opcode, index, params, submit).await?;
        Self::reply_status(socket, index, opcode.into(), Status::Success);
        Ok(Reply::Handled)
    }

    /// Writes class and EIR changes to the controller.
    pub(crate) async fn push_class_and_eir(&self, state: &mut ControllerState) -> Result<()> {
        self.push_class(state).await?;
        self.push_eir(state).await
    }

    pub(crate) async fn push_class(&self, state: &mut ControllerState) -> Result<()> {
        if let Some(class) = state.refresh_class() {
            tracing::debug!("hci{}: class {}", state.index(), hex::encode(class));
            self.transport
                .send_command(state.index(), HciOpcode::WriteClassOfDev, hci::write_class(&class))
                .await?;
            state.commit_class(class);
        }
        Ok(())
    }

    pub(crate) async fn push_eir(&self, state: &mut ControllerState) -> Result<()> {
        if let Some(eir) = state.refresh_eir(self.config.max_eir_name_len) {
            tracing::debug!("hci{}: eir updated", state.index());
            self.transport
                .send_command(state.index(), HciOpcode::WriteEir, hci::write_eir(&eir))
                .await?;
            state.commit_eir(eir);
        }
        Ok(())
    }

    /// Hands the key set of controller `index` to the key store, if any.
    pub(crate) async fn persist_keys(&self, state: &ControllerState) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.persist_keys(state.index(), state.link_keys()).await {
                tracing::warn!("hci{}: failed to persist keys: {}", state.index(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::test_support::{expect_status, manager, next, request};
    use crate::protocol::EventCode;

    #[tokio::test]
    async fn test_length_mismatch_is_einval() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        let mut msg = request(Opcode::SetPowered, 0, &[1]);
        msg.push(0);
        manager.handle_message(&socket, &msg).await;

        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::InvalidParameters);
        assert!(manager.transport().submissions().is_empty());
    }

    #[tokio::test]
    async fn test_short_header_is_einval() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager.handle_message(&socket, &[0x05, 0x00]).await;

        let frame = next(&mut sub);
        assert_eq!(frame.header.opcode, u16::from(EventCode::CmdStatus));
        assert_eq!(frame.header.index, INDEX_NONE);
        assert_eq!(&frame.payload[..], &[0, 0, Status::InvalidParameters as u8]);
    }

    #[tokio::test]
    async fn test_wrong_param_size_is_einval() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetPowered, 0, &[1, 1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::InvalidParameters);

        manager
            .handle_message(&socket, &request(Opcode::ReadVersion, INDEX_NONE, &[0]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::ReadVersion), Status::InvalidParameters);
    }

    #[tokio::test]
    async fn test_unknown_opcode() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        let msg = crate::protocol::frame::encode(0x0002, 0, &[]).unwrap();
        manager.handle_message(&socket, &msg).await;

        let frame = next(&mut sub);
        assert_eq!(frame.header.opcode, u16::from(EventCode::CmdStatus));
        assert_eq!(&frame.payload[..], &[0x02, 0x00, Status::UnknownCommand as u8]);
    }

    #[tokio::test]
    async fn test_unknown_controller() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::SetPowered, 7, &[1]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::SetPowered), Status::NoDevice);
    }
}
