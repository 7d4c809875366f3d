//! Outstanding asynchronous commands.
//!
//! A [`PendingCommand`] is created when a handler hands work to the
//! transport and is resolved when the matching completion callback arrives,
//! when submission fails, or when its controller is torn down. Entries are
//! kept in insertion order and every lookup returns the oldest match first.

use bytes::Bytes;

use crate::protocol::Opcode;
use crate::socket::SocketRef;
use crate::transport::ConnectionRef;
use crate::types::Address;
use crate::types::address::ADDRESS_LEN;

/// Identifies one pending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(u64);

impl PendingId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Extra state a completion needs to find or answer its command.
#[derive(Debug, Clone)]
pub enum CorrelationContext {
    /// The connection being paired.
    Pairing(ConnectionRef),
}

/// Which controller indexes a lookup matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope {
    /// Entries for exactly this index.
    Exact(u16),
    /// Entries for any index.
    Any,
}

impl IndexScope {
    const fn matches(self, index: u16) -> bool {
        match self {
            Self::Exact(want) => want == index,
            Self::Any => true,
        }
    }
}

/// Decision returned by a [`PendingList::for_each_matching`] visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Leave the entry in the list.
    Keep,
    /// Unlink the entry and hand it back to the caller.
    Remove,
}

/// An outstanding command.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// Entry id.
    pub id: PendingId,
    /// Command opcode.
    pub opcode: Opcode,
    /// Controller index the command was sent to.
    pub index: u16,
    /// Copy of the request parameters.
    pub params: Bytes,
    /// Socket that receives the final reply.
    pub socket: SocketRef,
    /// Extra correlation state.
    pub context: Option<CorrelationContext>,
}

impl PendingCommand {
    /// Remote address at the start of the parameters, for commands that
    /// name a device.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.params.get(..ADDRESS_LEN).and_then(Address::try_from_bytes)
    }
}

/// Insertion-ordered list of pending commands.
#[derive(Debug, Default)]
pub struct PendingList {
    entries: Vec<PendingCommand>,
    next_id: u64,
}

impl PendingList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a new command and returns its id.
    pub fn add(&mut self, socket: SocketRef, opcode: Opcode, index: u16, params: Bytes) -> PendingId {
        self.next_id += 1;
        let id = PendingId(self.next_id);
        tracing::debug!("pending: add {:?} {:?} hci{}", id, opcode, index);
        self.entries.push(PendingCommand {
            id,
            opcode,
            index,
            params,
            socket,
            context: None,
        });
        id
    }

    /// Attaches correlation state to an entry.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the list.
    pub fn set_context(&mut self, id: PendingId, context: CorrelationContext) {
        let entry = self
            .entries
            .iter_mut()
            .find(|c| c.id == id)
            .unwrap_or_else(|| panic!("pending: set_context on unknown {id:?}"));
        entry.context = Some(context);
    }

    /// Returns the oldest entry for `opcode` within `scope`.
    #[must_use]
    pub fn find(&self, opcode: Opcode, scope: IndexScope) -> Option<&PendingCommand> {
        self.entries
            .iter()
            .find(|c| c.opcode == opcode && scope.matches(c.index))
    }

    /// Returns the oldest entry for `opcode` within `scope` that satisfies
    /// `pred`.
    pub fn find_by<F>(&self, opcode: Opcode, scope: IndexScope, mut pred: F) -> Option<&PendingCommand>
    where
        F: FnMut(&PendingCommand) -> bool,
    {
        self.entries
            .iter()
            .find(|c| c.opcode == opcode && scope.matches(c.index) && pred(c))
    }

    /// Returns the entry with `id`.
    #[must_use]
    pub fn get(&self, id: PendingId) -> Option<&PendingCommand> {
        self.entries.iter().find(|c| c.id == id)
    }

    /// Unlinks and returns the entry with `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the list; every id is removed exactly once.
    pub fn remove(&mut self, id: PendingId) -> PendingCommand {
        let pos = self
            .entries
            .iter()
            .position(|c| c.id == id)
            .unwrap_or_else(|| panic!("pending: double remove of {id:?}"));
        let cmd = self.entries.remove(pos);
        tracing::debug!("pending: remove {:?} {:?} hci{}", id, cmd.opcode, cmd.index);
        cmd
    }

    /// Visits every entry for `opcode` within `scope`, oldest first, and
    /// returns the entries the visitor chose to remove, in visit order.
    pub fn for_each_matching<F>(&mut self, opcode: Opcode, scope: IndexScope, mut visitor: F) -> Vec<PendingCommand>
    where
        F: FnMut(&PendingCommand) -> Visit,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for cmd in self.entries.drain(..) {
            if cmd.opcode == opcode && scope.matches(cmd.index) && visitor(&cmd) == Visit::Remove {
                removed.push(cmd);
            } else {
                kept.push(cmd);
            }
        }
        self.entries = kept;
        removed
    }

    /// Unlinks every entry for controller `index`, oldest first.
    pub fn drain_index(&mut self, index: u16) -> Vec<PendingCommand> {
        let (drained, kept) = self.entries.drain(..).partition(|c| c.index == index);
        self.entries = kept;
        drained
    }

    /// Number of outstanding commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the outstanding commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingCommand> {
        self.entries.iter()
    }
}
