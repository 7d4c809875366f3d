//! Read-only queries.

use bytes::Bytes;

use super::Reply;
use crate::error::Result;
use crate::manager::Manager;
use crate::protocol::params::{NoParams, encode_connections, encode_index_list, encode_version, parse};
use crate::protocol::{MGMT_REVISION, MGMT_VERSION, Opcode};
use crate::transport::Transport;

impl<T: Transport> Manager<T> {
    pub(crate) fn read_version(data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::ReadVersion, data)?;
        Ok(Reply::Complete(encode_version(MGMT_VERSION, MGMT_REVISION)))
    }

    pub(crate) async fn read_index_list(&self, data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::ReadIndexList, data)?;
        let indexes = self.registry.indexes().await;
        Ok(Reply::Complete(encode_index_list(&indexes)))
    }

    pub(crate) async fn read_info(&self, index: u16, data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::ReadInfo, data)?;
        let state = self.lock_controller(index).await?;
        Ok(Reply::Complete(state.read_info().encode()))
    }

    pub(crate) async fn get_connections(&self, index: u16, data: &Bytes) -> Result<Reply> {
        parse::<NoParams>(Opcode::GetConnections, data)?;
        let _state = self.lock_controller(index).await?;
        let addresses = self.transport.connections(index);
        Ok(Reply::Complete(encode_connections(&addresses)))
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::test_support::{controller_info, expect_complete, manager, request};
    use crate::protocol::params::{MGMT_NAME_LEN, ReadInfoReply};
    use crate::protocol::{INDEX_NONE, Opcode};
    use crate::transport::Connection;
    use crate::types::{Address, LinkType};

    #[tokio::test]
    async fn test_read_version() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::ReadVersion, INDEX_NONE, &[]))
            .await;
        assert_eq!(&expect_complete(&mut sub, Opcode::ReadVersion)[..], &[0, 1, 0]);
    }

    #[tokio::test]
    async fn test_read_index_list() {
        let manager = manager().await;
        manager.register_controller(controller_info(3)).await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::ReadIndexList, INDEX_NONE, &[]))
            .await;
        assert_eq!(
            &expect_complete(&mut sub, Opcode::ReadIndexList)[..],
            &[2, 0, 0, 0, 3, 0]
        );
    }

    #[tokio::test]
    async fn test_read_info() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;

        manager
            .handle_message(&socket, &request(Opcode::ReadInfo, 0, &[]))
            .await;
        let info = expect_complete(&mut sub, Opcode::ReadInfo);
        assert_eq!(info.len(), ReadInfoReply::SIZE);
        assert_eq!(info[1], 0, "powered");
        assert_eq!(info[5], 4, "security mode");
        assert_eq!(&info[6..12], controller_info(0).address.as_bytes());
        assert_eq!(&info[28..32], b"hci0");
        assert_eq!(info.len() - 28, MGMT_NAME_LEN);
    }

    #[tokio::test]
    async fn test_get_connections() {
        let manager = manager().await;
        let (socket, mut sub) = manager.open_socket().await;
        let addr = Address::new([1, 2, 3, 4, 5, 6]);
        manager
            .transport()
            .add_connection(0, Connection::new(1, addr, LinkType::Acl));

        manager
            .handle_message(&socket, &request(Opcode::GetConnections, 0, &[]))
            .await;
        assert_eq!(
            &expect_complete(&mut sub, Opcode::GetConnections)[..],
            &[1, 0, 1, 2, 3, 4, 5, 6]
        );
    }
}
