//! # btmgmt
//!
//! A management control-plane engine for local Bluetooth controllers.
//!
//! Clients configure and query controllers (power, scan modes, pairing,
//! bonding keys, name, discovery) over a length-prefixed binary channel.
//! Controller outcomes arrive asynchronously from a transport and are
//! matched back to the request that caused them, while every other client
//! sees the state change as a broadcast event.
//!
//! ## Features
//!
//! - Async/await based engine using Tokio
//! - Outstanding-command bookkeeping with per-controller exclusivity
//! - Completion correlation and filtered event broadcast
//! - Type-safe wire protocol with strict length validation
//! - In-memory [`RecordingTransport`] for driving the engine without hardware
//!
//! ## Quick Start
//!
//! ```
//! use btmgmt::protocol::{Opcode, frame};
//! use btmgmt::types::{Address, ControllerInfo};
//! use btmgmt::{Manager, RecordingTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), btmgmt::Error> {
//!     let manager = Manager::new(RecordingTransport::new());
//!     manager
//!         .register_controller(ControllerInfo::new(0, Address::new([1, 2, 3, 4, 5, 6])))
//!         .await;
//!
//!     let (socket, mut replies) = manager.open_socket().await;
//!     let request = frame::encode(Opcode::SetPowered.into(), 0, &[1])?;
//!     manager.handle_message(&socket, &request).await;
//!
//!     // Provisional acknowledgement, then the transport reports power-on.
//!     let ack = replies.recv_frame().await.expect("status reply")?;
//!     println!("ack: {:?}", ack.header);
//!
//!     manager.powered(0, true).await?;
//!     let done = replies.recv_frame().await.expect("complete reply")?;
//!     println!("complete: {:?}", done.payload);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Wire types (frames, opcodes, status codes, parameter blocks, events)
//! - [`types`] - Data structures (addresses, UUIDs, keys, controller identity)
//! - [`controller`] - Per-controller state and EIR/class derivation
//! - [`pending`] - Outstanding asynchronous commands
//! - [`registry`] - Controllers, pending commands and subscribers of one engine
//! - [`socket`] - Client reply channels
//! - [`transport`] - The transport collaborator and connection objects
//! - [`commands`] - Request dispatch, one handler per opcode
//! - [`event`] - Completion callbacks and event broadcast
//! - [`manager`] - The [`Manager`] engine

pub mod commands;
pub mod controller;
pub mod error;
pub mod event;
pub mod manager;
pub mod pending;
pub mod protocol;
pub mod registry;
pub mod socket;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use controller::ControllerState;
pub use error::{Error, FrameError, Result};
pub use manager::{Manager, ManagerConfig};
pub use pending::{PendingCommand, PendingId, PendingList};
pub use protocol::{EventCode, Frame, MgmtEvent, Opcode, Status};
pub use registry::Registry;
pub use socket::{Socket, SocketId, SocketRef, Subscription};
pub use transport::{Connection, ConnectionRef, KeyStorage, RecordingTransport, Transport};
pub use types::{
    Address, AuthType, ControllerFlags, ControllerInfo, IoCapability, LinkKey, LinkType,
    RemoteOobData, SecurityLevel, Uuid128,
};
