//! Service records, device class and local name.

use bytes::Bytes;

use super::Reply;
use crate::error::Result;
use crate::manager::Manager;
use crate::protocol::hci::write_local_name;
use crate::protocol::params::{AddUuid, RemoveUuid, SetDevClass, SetLocalName, SetServiceCache, parse};
use crate::protocol::{HciOpcode, Opcode};
use crate::socket::SocketRef;
use crate::transport::Transport;

impl<T: Transport> Manager<T> {
    pub(crate) async fn add_uuid(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: AddUuid = parse(Opcode::AddUuid, data)?;
        let mut state = self.lock_controller(index).await?;

        tracing::debug!("hci{}: add uuid {}", index, cp.uuid.to_hex());
        state.add_uuid(cp.uuid, cp.svc_hint);
        self.push_class_and_eir(&mut state).await?;
        Ok(Reply::empty())
    }

    pub(crate) async fn remove_uuid(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: RemoveUuid = parse(Opcode::RemoveUuid, data)?;
        let mut state = self.lock_controller(index).await?;

        tracing::debug!("hci{}: remove uuid {}", index, cp.uuid.to_hex());
        state.remove_uuid(&cp.uuid)?;
        self.push_class_and_eir(&mut state).await?;
        Ok(Reply::empty())
    }

    pub(crate) async fn set_dev_class(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: SetDevClass = parse(Opcode::SetDevClass, data)?;
        let mut state = self.lock_controller(index).await?;

        state.set_class(cp.major, cp.minor);
        self.push_class(&mut state).await?;
        Ok(Reply::empty())
    }

    pub(crate) async fn set_service_cache(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: SetServiceCache = parse(Opcode::SetServiceCache, data)?;
        let mut state = self.lock_controller(index).await?;

        state.set_service_cache(cp.enable);
        if !cp.enable {
            self.push_class_and_eir(&mut state).await?;
        }
        Ok(Reply::empty())
    }

    pub(crate) async fn set_local_name(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: SetLocalName = parse(Opcode::SetLocalName, data)?;
        let state = self.lock_controller(index).await?;

        self.ensure_idle(index, &[Opcode::SetLocalName]).await?;
        let reply = self
            .track(socket, Opcode::SetLocalName, index, data.clone(), || {
                self.transport
                    .send_command(index, HciOpcode::WriteLocalName, write_local_name(&cp.name))
            })
            .await;
        drop(state);
        reply
    }
}
