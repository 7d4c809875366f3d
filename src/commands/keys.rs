//! Bonding keys, out-of-band data and the block list.

use bytes::Bytes;

use super::Reply;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::protocol::hci::{REASON_REMOTE_USER_TERM, disconnect};
use crate::protocol::params::{AddRemoteOobData, DeviceAddress, NoParams, RemoveKey, parse, parse_load_keys};
use crate::protocol::{HciOpcode, Opcode};
use crate::socket::SocketRef;
use crate::transport::Transport;
use crate::types::LinkType;

impl<T: Transport> Manager<T> {
    pub(crate) async fn load_keys(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let load = parse_load_keys(data)?;
        let mut state = self.lock_controller(index).await?;

        tracing::debug!(
            "hci{}: loading {} keys, debug keys {}",
            index,
            load.keys.len(),
            load.debug_keys
        );
        state.replace_keys(load.debug_keys, load.keys);
        self.persist_keys(&state).await;
        Ok(Reply::empty())
    }

    pub(crate) async fn remove_key(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: RemoveKey = parse(Opcode::RemoveKey, data)?;
        let mut state = self.lock_controller(index).await?;

        state.remove_key(&cp.address)?;
        self.persist_keys(&state).await;

        if state.is_powered() && cp.disconnect {
            if let Some(conn) = self
                .transport
                .lookup_connection(index, LinkType::Acl, &cp.address)
            {
                tracing::debug!("hci{}: disconnecting {} after key removal", index, cp.address);
                self.transport
                    .send_command(
                        index,
                        HciOpcode::Disconnect,
                        disconnect(conn.handle(), REASON_REMOTE_USER_TERM),
                    )
                    .await?;
            }
        }
        Ok(Reply::empty())
    }

    pub(crate) async fn read_local_oob_data(&self, socket: &SocketRef, index: u16, data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::ReadLocalOobData, data)?;
        let state = self.lock_controller(index).await?;

        if !state.is_powered() {
            return Err(Error::NotPowered { index });
        }
        if !state.info().supports_simple_pairing() {
            return Err(Error::NotSupported);
        }
        self.ensure_idle(index, &[Opcode::ReadLocalOobData]).await?;

        let reply = self
            .track(socket, Opcode::ReadLocalOobData, index, data.clone(), || {
                self.transport
                    .send_command(index, HciOpcode::ReadLocalOobData, Bytes::new())
            })
            .await;
        drop(state);
        reply
    }

    pub(crate) async fn add_remote_oob_data(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let AddRemoteOobData(oob) = parse(Opcode::AddRemoteOobData, data)?;
        let mut state = self.lock_controller(index).await?;

        state.add_remote_oob(oob);
        Ok(Reply::empty())
    }

    pub(crate) async fn remove_remote_oob_data(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: DeviceAddress = parse(Opcode::RemoveRemoteOobData, data)?;
        let mut state = self.lock_controller(index).await?;

        state.remove_remote_oob(&cp.address)?;
        Ok(Reply::empty())
    }

    pub(crate) async fn block_device(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: DeviceAddress = parse(Opcode::BlockDevice, data)?;
        let mut state = self.lock_controller(index).await?;

        state.block(cp.address)?;
        Ok(Reply::empty())
    }

    pub(crate) async fn unblock_device(&self, index: u16, data: &Bytes) -> Result<Reply> {
        let cp: DeviceAddress = parse(Opcode::UnblockDevice, data)?;
        let mut state = self.lock_controller(index).await?;

        state.unblock(&cp.address)?;
        Ok(Reply::empty())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::FutureExt;
    use futures::future::BoxFuture;

    use crate::error::Result;
    use crate::manager::test_support::{controller_info, expect_complete, expect_status, request};
    use crate::manager::Manager;
    use crate::protocol::{HciOpcode, Opcode, Status};
    use crate::transport::{Connection, KeyStorage, RecordingTransport};
    use crate::types::{Address, LinkKey, LinkType};

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<(u16, usize)>>,
    }

    impl KeyStorage for MemoryStore {
        fn persist_keys<'a>(&'a self, index: u16, keys: &'a [LinkKey]) -> BoxFuture<'a, Result<()>> {
            self.saved.lock().unwrap().push((index, keys.len()));
            async { Ok(()) }.boxed()
        }
    }

    async fn manager_with_store() -> (Manager<RecordingTransport>, Arc<MemoryStore>) {
        crate::manager::test_support::init_tracing();
        let store = Arc::new(MemoryStore::default());
        let manager = Manager::new(RecordingTransport::new()).key_storage(store.clone());
        manager.register_controller(controller_info(0)).await;
        (manager, store)
    }

    fn key_entry(addr: u8) -> Vec<u8> {
        let mut entry = vec![addr, 0, 0, 0, 0, 0, 0x04];
        entry.extend_from_slice(&[0x55; 16]);
        entry.push(4);
        entry.push(0);
        entry
    }

    #[tokio::test]
    async fn test_load_keys_replaces_set() {
        let (manager, store) = manager_with_store().await;
        let (socket, mut sub) = manager.open_socket().await;

        let mut data = vec![0, 2, 0];
        data.extend(key_entry(1));
        data.extend(key_entry(2));
        manager
            .handle_message(&socket, &request(Opcode::LoadKeys, 0, &data))
            .await;
        expect_complete(&mut sub, Opcode::LoadKeys);

        let mut data = vec![0, 1, 0];
        data.extend(key_entry(3));
        manager
            .handle_message(&socket, &request(Opcode::LoadKeys, 0, &data))
            .await;
        expect_complete(&mut sub, Opcode::LoadKeys);

        let state = manager.lock_controller(0).await.unwrap();
        assert_eq!(state.link_keys().len(), 1);
        assert_eq!(state.link_keys()[0].address, Address::new([3, 0, 0, 0, 0, 0]));
        assert_eq!(*store.saved.lock().unwrap(), vec![(0, 2), (0, 1)]);
    }

    #[tokio::test]
    async fn test_load_keys_short_count_installs_nothing() {
        let (manager, store) = manager_with_store().await;
        let (socket, mut sub) = manager.open_socket().await;

        let mut data = vec![0, 1, 0];
        data.extend(key_entry(9));
        manager
            .handle_message(&socket, &request(Opcode::LoadKeys, 0, &data))
            .await;
        expect_complete(&mut sub, Opcode::LoadKeys);

        // key_count = 2 but only one entry fits
        let mut data = vec![0, 2, 0];
        data.extend(key_entry(1));
        manager
            .handle_message(&socket, &request(Opcode::LoadKeys, 0, &data))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::LoadKeys), Status::InvalidParameters);

        let state = manager.lock_controller(0).await.unwrap();
        assert_eq!(state.link_keys().len(), 1);
        assert_eq!(state.link_keys()[0].address, Address::new([9, 0, 0, 0, 0, 0]));
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_key_disconnects() {
        let (manager, _store) = manager_with_store().await;
        manager.powered(0, true).await.unwrap();
        let (socket, mut sub) = manager.open_socket().await;
        let addr = Address::new([1, 0, 0, 0, 0, 0]);
        manager
            .transport()
            .add_connection(0, Connection::established(0x0042, addr, LinkType::Acl, Default::default()));

        let mut data = vec![0, 1, 0];
        data.extend(key_entry(1));
        manager
            .handle_message(&socket, &request(Opcode::LoadKeys, 0, &data))
            .await;
        expect_complete(&mut sub, Opcode::LoadKeys);

        let mut params = addr.as_bytes().to_vec();
        params.push(1);
        manager
            .handle_message(&socket, &request(Opcode::RemoveKey, 0, &params))
            .await;
        expect_complete(&mut sub, Opcode::RemoveKey);
        assert_eq!(
            manager.transport().commands(),
            vec![(0, HciOpcode::Disconnect, bytes::Bytes::from_static(&[0x42, 0x00, 0x13]))]
        );

        // already gone: fails before any disconnect attempt
        manager
            .handle_message(&socket, &request(Opcode::RemoveKey, 0, &params))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::RemoveKey), Status::NotFound);
        assert_eq!(manager.transport().commands().len(), 1);
    }

    #[tokio::test]
    async fn test_read_local_oob_data_needs_ssp() {
        let (manager, _store) = manager_with_store().await;
        let plain = crate::types::ControllerInfo::new(1, Address::new([1; 6]));
        manager.register_controller(plain).await;
        manager.powered(1, true).await.unwrap();
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::ReadLocalOobData, 1, &[]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::ReadLocalOobData), Status::NotSupported);

        manager
            .handle_message(&socket, &request(Opcode::ReadLocalOobData, 0, &[]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::ReadLocalOobData), Status::NotPowered);
    }

    #[tokio::test]
    async fn test_remote_oob_data() {
        let (manager, _store) = manager_with_store().await;
        let (socket, mut sub) = manager.open_socket().await;

        let mut params = vec![7; 6];
        params.extend_from_slice(&[1; 32]);
        manager
            .handle_message(&socket, &request(Opcode::AddRemoteOobData, 0, &params))
            .await;
        expect_complete(&mut sub, Opcode::AddRemoteOobData);

        manager
            .handle_message(&socket, &request(Opcode::RemoveRemoteOobData, 0, &[7; 6]))
            .await;
        expect_complete(&mut sub, Opcode::RemoveRemoteOobData);

        manager
            .handle_message(&socket, &request(Opcode::RemoveRemoteOobData, 0, &[7; 6]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::RemoveRemoteOobData), Status::NotFound);
    }

    #[tokio::test]
    async fn test_block_unblock() {
        let (manager, _store) = manager_with_store().await;
        let (socket, mut sub) = manager.open_socket().await;
        let addr = [1, 2, 3, 4, 5, 6];

        manager
            .handle_message(&socket, &request(Opcode::BlockDevice, 0, &addr))
            .await;
        expect_complete(&mut sub, Opcode::BlockDevice);
        manager
            .handle_message(&socket, &request(Opcode::BlockDevice, 0, &addr))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::BlockDevice), Status::Exists);
        manager
            .handle_message(&socket, &request(Opcode::BlockDevice, 0, &[0; 6]))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::BlockDevice), Status::BadAddress);

        manager
            .handle_message(&socket, &request(Opcode::UnblockDevice, 0, &[0; 6]))
            .await;
        expect_complete(&mut sub, Opcode::UnblockDevice);
        manager
            .handle_message(&socket, &request(Opcode::UnblockDevice, 0, &addr))
            .await;
        assert_eq!(expect_status(&mut sub, Opcode::UnblockDevice), Status::NotFound);
    }
}
