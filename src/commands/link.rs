//! Connections, PIN and confirmation replies, and pairing.

use bytes::Bytes;

use super::Reply;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::pending::CorrelationContext;
use crate::protocol::hci::{self, REASON_REMOTE_USER_TERM};
use crate::protocol::params::{DeviceAddress, PairDevice, PinCodeReply, SetIoCapability, parse};
use crate::protocol::{HciOpcode, Opcode, Status};
use crate::socket::SocketRef;
use crate::transport::{CompletionSink, Transport};
use crate::types::{AuthType, IoCapability, LinkType, SecurityLevel};

/// PIN length required for high security links.
const SECURE_PIN_LEN: u8 = 16;

impl<T: Transport> Manager<T> {
    pub(crate) async fn disconnect(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: DeviceAddress = parse(Opcode::Disconnect, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        self.ensure_idle(index, &[Opcode::Disconnect]).await?;

        let conn = self
            .transport
            .lookup_connection(index, LinkType::Acl, &cp.address)
            .or_else(|| self.transport.lookup_connection(index, LinkType::Le, &cp.address))
            .ok_or(Error::NotConnected)?;

        let reply = self
            .track(socket, Opcode::Disconnect, index, data.clone(), || {
                self.transport.send_command(
                    index,
                    HciOpcode::Disconnect,
                    hci::disconnect(conn.handle(), REASON_REMOTE_USER_TERM),
                )
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn pin_code_reply(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: PinCodeReply = parse(Opcode::PinCodeReply, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }

        let conn = self
            .transport
            .lookup_connection(index, LinkType::Acl, &cp.address)
            .ok_or(Error::NotConnected)?;

        if conn.pending_sec_level().await == SecurityLevel::High && cp.pin_len != SECURE_PIN_LEN {
            // Reject on the client's behalf; the negative reply completes
            // through the usual callback.
            self.ensure_idle_for(index, Opcode::PinCodeNegReply, &cp.address)
                .await?;
            let params = Bytes::copy_from_slice(cp.address.as_bytes());
            self.track_quiet(socket, Opcode::PinCodeNegReply, index, params, || {
                self.transport
                    .send_command(index, HciOpcode::PinCodeNegReply, hci::address(&cp.address))
            })
            .await?;
            return Err(Error::invalid(
                Opcode::PinCodeReply,
                format!("high security link needs a {SECURE_PIN_LEN} byte PIN, got {}", cp.pin_len),
            ));
        }

        self.ensure_idle_for(index, Opcode::PinCodeReply, &cp.address)
            .await?;

        let reply = self
            .track(socket, Opcode::PinCodeReply, index, data.clone(), || {
                self.transport.send_command(
                    index,
                    HciOpcode::PinCodeReply,
                    hci::pin_code_reply(&cp.address, cp.pin_len, &cp.pin_code),
                )
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn pin_code_neg_reply(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: DeviceAddress = parse(Opcode::PinCodeNegReply, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        self.ensure_idle_for(index, Opcode::PinCodeNegReply, &cp.address)
            .await?;

        let reply = self
            .track(socket, Opcode::PinCodeNegReply, index, data.clone(), || {
                self.transport
                    .send_command(index, HciOpcode::PinCodeNegReply, hci::address(&cp.address))
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn user_confirm_reply(
        &self,
        socket: &SocketRef,
        index: u16,
        data: &Bytes,
        opcode: Opcode,
    ) -> Result<Reply> {
        let cp: DeviceAddress = parse(opcode, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        self.ensure_idle_for(index, opcode, &cp.address).await?;

        let hci_opcode = if opcode == Opcode::UserConfirmReply {
            HciOpcode::UserConfirmReply
        } else {
            HciOpcode::UserConfirmNegReply
        };
        let reply = self
            .track(socket, opcode, index, data.clone(), || {
                self.transport
                    .send_command(index, hci_opcode, hci::address(&cp.address))
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn set_io_capability(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: SetIoCapability = parse(Opcode::SetIoCapability, data)?;
        let io_capability = IoCapability::from_byte(cp.io_capability).ok_or_else(|| {
            Error::invalid(
                Opcode::SetIoCapability,
                format!("unknown io capability {:#04x}", cp.io_capability),
            )
        })?;
        let mut state = self.lock_controller(index).await?;

        state.set_io_capability(io_capability);
        Ok(Reply::empty())
    }

    pub(crate) async fn pair_device(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: PairDevice = parse(Opcode::PairDevice, data)?;
        let io_capability = IoCapability::from_byte(cp.io_cap).ok_or_else(|| {
            Error::invalid(Opcode::PairDevice, format!("unknown io capability {:#04x}", cp.io_cap))
        })?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }

        let (sec_level, auth_type) = AuthType::for_pairing(cp.io_cap);
        let conn = self
            .transport
            .connect(index, cp.address, sec_level, auth_type)
            .await?;

        if conn.sink().await.is_some() {
            return Err(Error::Busy {
                opcode: Opcode::PairDevice,
            });
        }

        let id = {
            let mut pending = self.registry.pending().lock().await;
            let id = pending.add(socket.clone(), Opcode::PairDevice, index, data.clone());
            pending.set_context(id, CorrelationContext::Pairing(conn.clone()));
            if !conn
                .attach_sink(CompletionSink::Pairing { index, pending: id })
                .await
            {
                pending.remove(id);
                return Err(Error::Busy {
                    opcode: Opcode::PairDevice,
                });
            }
            id
        };
        conn.set_io_capability(io_capability).await;

        tracing::debug!("hci{}: pairing with {} ({:?})", index, cp.address, id);
        Self::reply_status(socket, index, Opcode::PairDevice.into(), Status::Success);

        if conn.is_established().await
            && self
                .transport
                .secure_connection(&conn, sec_level, auth_type)
                .await
        {
            let mut pending = self.registry.pending().lock().await;
            Self::complete_pairing(&mut pending, id, Status::Success.into()).await;
        }
        drop(state);
        Ok(Reply::Handled)
    }
}
