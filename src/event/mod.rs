//! Completion callbacks and event broadcast.
//!
//! The transport reports controller outcomes by calling the methods in this
//! module on a [`Manager`]. Each callback:
//!
//! 1. Resolves the pending commands the outcome answers, replying to their
//!    sockets with `CMD_COMPLETE` (or `CMD_STATUS` on failure).
//! 2. Broadcasts the matching event to every subscriber except the sockets
//!    that were just answered.
//!
//! Callbacks take the controller lock first, so a late event for a
//! controller that was torn down fails with [`Error::NoDevice`] instead of
//! touching freed state.

use crate::controller::ControllerState;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::pending::{CorrelationContext, IndexScope, PendingId, PendingList, Visit};
use crate::protocol::event::EIR_LEN;
use crate::protocol::hci::{SCAN_INQUIRY, SCAN_PAGE};
use crate::protocol::params::{Mode, encode_address, encode_address_status, encode_local_oob, encode_mode, encode_name, parse};
use crate::protocol::{MgmtEvent, Opcode, Status};
use crate::transport::{CompletionSink, ConnectionRef, Transport};
use crate::types::{Address, ControllerInfo, LinkKey};

const PENDING: &str = "pending command";

impl<T: Transport> Manager<T> {
    /// Registers a controller and announces it with `INDEX_ADDED`.
    ///
    /// Returns false if the index is already registered.
    pub async fn register_controller(&self, info: ControllerInfo) -> bool {
        let index = info.index;
        if !self.registry.insert(ControllerState::new(info)).await {
            tracing::warn!("hci{}: already registered", index);
            return false;
        }
        tracing::debug!("hci{}: registered", index);
        self.registry.broadcast(index, &MgmtEvent::IndexAdded, &[]).await;
        true
    }

    /// Tears down a controller.
    ///
    /// Every pending command addressed to it is answered with a `NO_DEVICE`
    /// status before `INDEX_REMOVED` is broadcast. Returns false if the index
    /// was not registered.
    pub async fn unregister_controller(&self, index: u16) -> bool {
        let Some(handle) = self.registry.remove(index).await else {
            return false;
        };
        let mut state = handle.lock_owned().await;
        state.mark_removed();

        let orphaned = self.registry.pending().lock().await.drain_index(index);
        tracing::debug!("hci{}: unregistered, {} pending orphaned", index, orphaned.len());
        for cmd in orphaned {
            if let Some(CorrelationContext::Pairing(conn)) = &cmd.context {
                conn.detach_if(CompletionSink::Pairing {
                    index,
                    pending: cmd.id,
                })
                .await;
            }
            Self::reply_status(&cmd.socket, index, cmd.opcode.into(), Status::NoDevice);
        }
        drop(state);

        self.registry.broadcast(index, &MgmtEvent::IndexRemoved, &[]).await;
        true
    }

    /// The controller was powered on or off.
    pub async fn powered(&self, index: u16, on: bool) -> Result<()> {
        self.mode_changed(
            index,
            Opcode::SetPowered,
            on,
            ControllerState::set_powered,
            &MgmtEvent::Powered(on),
        )
        .await
    }

    /// Inquiry scan was enabled or disabled.
    pub async fn discoverable(&self, index: u16, on: bool) -> Result<()> {
        self.mode_changed(
            index,
            Opcode::SetDiscoverable,
            on,
            ControllerState::set_discoverable,
            &MgmtEvent::Discoverable(on),
        )
        .await
    }

    /// Page scan was enabled or disabled.
    pub async fn connectable(&self, index: u16, on: bool) -> Result<()> {
        self.mode_changed(
            index,
            Opcode::SetConnectable,
            on,
            ControllerState::set_connectable,
            &MgmtEvent::Connectable(on),
        )
        .await
    }

    /// A scan enable write completed with `scan`.
    pub async fn scan_enable_complete(&self, index: u16, scan: u8) -> Result<()> {
        self.discoverable(index, scan & SCAN_INQUIRY != 0).await?;
        self.connectable(index, scan & SCAN_PAGE != 0).await
    }

    /// Resolves every pending `opcode` whose requested value is `val`.
    /// Commands asking for the other value stay pending.
    async fn mode_changed(
        &self,
        index: u16,
        opcode: Opcode,
        val: bool,
        apply: fn(&mut ControllerState, bool) -> bool,
        event: &MgmtEvent,
    ) -> Result<()> {
        let mut state = self.lock_controller(index).await?;
        let changed = apply(&mut *state, val);

        let resolved = self
            .registry
            .pending()
            .lock()
            .await
            .for_each_matching(opcode, IndexScope::Exact(index), |cmd| {
                if parse::<Mode>(opcode, &cmd.params).is_ok_and(|cp| cp.val == val) {
                    Visit::Remove
                } else {
                    Visit::Keep
                }
            });
        tracing::debug!(
            "hci{}: {:?} now {}, changed {}, {} resolved",
            index,
            event.code(),
            val,
            changed,
            resolved.len()
        );

        let result = encode_mode(val);
        let skip: Vec<_> = resolved
            .iter()
            .map(|cmd| {
                Self::reply_complete(&cmd.socket, index, opcode, &result);
                cmd.socket.id()
            })
            .collect();

        if changed || !skip.is_empty() {
            self.registry.broadcast(index, event, &skip).await;
        }
        drop(state);
        Ok(())
    }

    /// A new key was derived for a remote device.
    pub async fn new_key(&self, index: u16, key: LinkKey, persistent: bool) -> Result<()> {
        let mut state = self.lock_controller(index).await?;

        tracing::debug!("hci{}: new key for {} type {:#04x}", index, key.address, key.key_type);
        state.add_key(key.clone());
        if persistent {
            self.persist_keys(&state).await;
        }
        self.registry
            .broadcast(
                index,
                &MgmtEvent::NewKey {
                    store_hint: persistent,
                    key,
                },
                &[],
            )
            .await;
        Ok(())
    }

    /// A remote device connected.
    pub async fn connected(&self, index: u16, address: Address) -> Result<()> {
        self.notify(index, &MgmtEvent::Connected(address)).await
    }

    /// A remote device disconnected.
    ///
    /// Pending `DISCONNECT` requests for `address` complete with the address.
    pub async fn disconnected(&self, index: u16, address: Address) -> Result<()> {
        let state = self.lock_controller(index).await?;

        let resolved = self.registry.pending().lock().await.for_each_matching(
            Opcode::Disconnect,
            IndexScope::Exact(index),
            |cmd| {
                if cmd.address() == Some(address) {
                    Visit::Remove
                } else {
                    Visit::Keep
                }
            },
        );

        let result = encode_address(&address);
        let skip: Vec<_> = resolved
            .iter()
            .map(|cmd| {
                Self::reply_complete(&cmd.socket, index, Opcode::Disconnect, &result);
                cmd.socket.id()
            })
            .collect();

        tracing::debug!("hci{}: {} disconnected", index, address);
        self.registry
            .broadcast(index, &MgmtEvent::Disconnected(address), &skip)
            .await;
        drop(state);
        Ok(())
    }

    /// The controller rejected a disconnect.
    pub async fn disconnect_failed(&self, index: u16) -> Result<()> {
        let _state = self.lock_controller(index).await?;
        let mut pending = self.registry.pending().lock().await;

        let id = pending
            .find(Opcode::Disconnect, IndexScope::Exact(index))
            .map(|cmd| cmd.id)
            .ok_or(Error::NotFound { what: PENDING })?;
        let cmd = pending.remove(id);
        Self::reply_status(&cmd.socket, index, Opcode::Disconnect.into(), Status::Io);
        Ok(())
    }

    /// An outgoing connection failed.
    pub async fn connect_failed(&self, index: u16, address: Address, status: u8) -> Result<()> {
        self.notify(index, &MgmtEvent::ConnectFailed { address, status })
            .await
    }

    /// The controller needs a PIN code for `address`.
    pub async fn pin_code_request(&self, index: u16, address: Address, secure: bool) -> Result<()> {
        self.notify(index, &MgmtEvent::PinCodeRequest { address, secure })
            .await
    }

    /// A PIN code reply reached the controller.
    pub async fn pin_code_reply_complete(&self, index: u16, address: Address, status: u8) -> Result<()> {
        self.complete_for_address(index, Opcode::PinCodeReply, &address, status)
            .await
    }

    /// A negative PIN code reply reached the controller.
    pub async fn pin_code_neg_reply_complete(&self, index: u16, address: Address, status: u8) -> Result<()> {
        self.complete_for_address(index, Opcode::PinCodeNegReply, &address, status)
            .await
    }

    /// The controller needs a numeric comparison answer for `address`.
    pub async fn user_confirm_request(
        &self,
        index: u16,
        address: Address,
        value: u32,
        confirm_hint: u8,
    ) -> Result<()> {
        self.notify(
            index,
            &MgmtEvent::UserConfirmRequest {
                address,
                confirm_hint,
                value,
            },
        )
        .await
    }

    /// A confirmation reply reached the controller.
    pub async fn user_confirm_reply_complete(&self, index: u16, address: Address, status: u8) -> Result<()> {
        self.complete_for_address(index, Opcode::UserConfirmReply, &address, status)
            .await
    }

    /// A negative confirmation reply reached the controller.
    pub async fn user_confirm_neg_reply_complete(&self, index: u16, address: Address, status: u8) -> Result<()> {
        self.complete_for_address(index, Opcode::UserConfirmNegReply, &address, status)
            .await
    }

    /// Authentication with `address` failed.
    pub async fn auth_failed(&self, index: u16, address: Address, status: u8) -> Result<()> {
        self.notify(index, &MgmtEvent::AuthFailed { address, status })
            .await
    }

    /// The controller finished writing its local name.
    ///
    /// A nonzero `status` fails a pending `SET_LOCAL_NAME` with `EIO` and
    /// leaves the stored name alone.
    pub async fn local_name_changed(&self, index: u16, name: &[u8], status: u8) -> Result<()> {
        let mut state = self.lock_controller(index).await?;

        let cmd = {
            let mut pending = self.registry.pending().lock().await;
            pending
                .find(Opcode::SetLocalName, IndexScope::Exact(index))
                .map(|cmd| cmd.id)
                .map(|id| pending.remove(id))
        };

        if status != 0 {
            tracing::warn!("hci{}: local name write failed with {:#04x}", index, status);
            if let Some(cmd) = cmd {
                Self::reply_status(&cmd.socket, index, Opcode::SetLocalName.into(), Status::Io);
            }
            return Ok(());
        }

        state.set_name(name);
        if let Err(e) = self.push_eir(&mut state).await {
            tracing::error!("hci{}: eir update after name change: {}", index, e);
        }

        let name = state.name().to_vec();
        let skip = match &cmd {
            Some(cmd) => {
                Self::reply_complete(&cmd.socket, index, Opcode::SetLocalName, &encode_name(&name));
                vec![cmd.socket.id()]
            }
            None => Vec::new(),
        };
        self.registry
            .broadcast(index, &MgmtEvent::LocalNameChanged(name), &skip)
            .await;
        drop(state);
        Ok(())
    }

    /// The controller returned its local out-of-band data.
    pub async fn local_oob_data_ready(
        &self,
        index: u16,
        hash: &[u8; 16],
        randomizer: &[u8; 16],
        status: u8,
    ) -> Result<()> {
        let _state = self.lock_controller(index).await?;
        let mut pending = self.registry.pending().lock().await;

        let id = pending
            .find(Opcode::ReadLocalOobData, IndexScope::Exact(index))
            .map(|cmd| cmd.id)
            .ok_or(Error::NotFound { what: PENDING })?;
        let cmd = pending.remove(id);

        if status == 0 {
            Self::reply_complete(
                &cmd.socket,
                index,
                Opcode::ReadLocalOobData,
                &encode_local_oob(hash, randomizer),
            );
        } else {
            tracing::debug!("hci{}: local oob read failed with {:#04x}", index, status);
            Self::reply_status(&cmd.socket, index, Opcode::ReadLocalOobData.into(), Status::Io);
        }
        Ok(())
    }

    /// Inquiry found a device.
    pub async fn device_found(
        &self,
        index: u16,
        address: Address,
        dev_class: [u8; 3],
        rssi: i8,
        eir: Option<&[u8; EIR_LEN]>,
    ) -> Result<()> {
        let event = MgmtEvent::DeviceFound {
            address,
            dev_class,
            rssi,
            eir: eir.map(|eir| Box::new(*eir)),
        };
        self.notify(index, &event).await
    }

    /// A remote device's name was resolved.
    pub async fn remote_name(&self, index: u16, address: Address, name: &[u8]) -> Result<()> {
        let name = crate::protocol::params::trim_name(name).to_vec();
        self.notify(index, &MgmtEvent::RemoteName { address, name })
            .await
    }

    /// Inquiry started or stopped.
    ///
    /// Completes a pending `START_DISCOVERY` (when starting) or
    /// `STOP_DISCOVERY` (when stopping).
    pub async fn discovering(&self, index: u16, on: bool) -> Result<()> {
        let state = self.lock_controller(index).await?;
        let opcode = if on {
            Opcode::StartDiscovery
        } else {
            Opcode::StopDiscovery
        };

        let cmd = {
            let mut pending = self.registry.pending().lock().await;
            pending
                .find(opcode, IndexScope::Exact(index))
                .map(|cmd| cmd.id)
                .map(|id| pending.remove(id))
        };
        let skip = match &cmd {
            Some(cmd) => {
                Self::reply_complete(&cmd.socket, index, opcode, &[]);
                vec![cmd.socket.id()]
            }
            None => Vec::new(),
        };

        tracing::debug!("hci{}: discovering {}", index, on);
        self.registry
            .broadcast(index, &MgmtEvent::Discovering(on), &skip)
            .await;
        drop(state);
        Ok(())
    }

    /// Connect, security or disconnect outcome on a connection that carries
    /// a pairing sink.
    pub async fn pairing_event(&self, conn: &ConnectionRef, status: u8) -> Result<()> {
        let Some(CompletionSink::Pairing { index, pending: id }) = conn.sink().await else {
            return Err(Error::NotFound { what: "pairing" });
        };

        let _state = self.lock_controller(index).await?;
        let mut pending = self.registry.pending().lock().await;
        if pending.get(id).is_none() {
            conn.detach_if(CompletionSink::Pairing { index, pending: id })
                .await;
            return Err(Error::NotFound { what: PENDING });
        }

        tracing::debug!("hci{}: pairing with {} finished with {:#04x}", index, conn.address(), status);
        Self::complete_pairing(&mut pending, id, status).await;
        Ok(())
    }

    /// Answers a `PAIR_DEVICE` request and detaches its sink from the
    /// connection.
    pub(crate) async fn complete_pairing(pending: &mut PendingList, id: PendingId, status: u8) {
        let cmd = pending.remove(id);
        let address = match &cmd.context {
            Some(CorrelationContext::Pairing(conn)) => {
                conn.detach_if(CompletionSink::Pairing {
                    index: cmd.index,
                    pending: id,
                })
                .await;
                *conn.address()
            }
            None => cmd.address().unwrap_or(Address::ANY),
        };
        Self::reply_complete(
            &cmd.socket,
            cmd.index,
            Opcode::PairDevice,
            &encode_address_status(&address, status),
        );
    }

    /// Completes the oldest pending `opcode` for `address` with
    /// `{address, status}`.
    async fn complete_for_address(&self, index: u16, opcode: Opcode, address: &Address, status: u8) -> Result<()> {
        let _state = self.lock_controller(index).await?;
        let mut pending = self.registry.pending().lock().await;

        let id = pending
            .find_by(opcode, IndexScope::Exact(index), |cmd| {
                cmd.address().as_ref() == Some(address)
            })
            .map(|cmd| cmd.id)
            .ok_or(Error::NotFound { what: PENDING })?;
        let cmd = pending.remove(id);
        Self::reply_complete(&cmd.socket, index, opcode, &encode_address_status(address, status));
        Ok(())
    }

    /// Broadcasts an event that answers no request.
    async fn notify(&self, index: u16, event: &MgmtEvent) -> Result<()> {
        let _state = self.lock_controller(index).await?;
        tracing::debug!("hci{}: {:?}", index, event.code());
        self.registry.broadcast(index, event, &[]).await;
        Ok(())
    }
}
