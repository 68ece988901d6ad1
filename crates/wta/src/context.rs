//! execution context handed to every state-changing operation

use crate::store::KvStore;
use crate::types::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 32-byte hash
pub type Hash = [u8; 32];

/// Consensus-agreed block data visible to the module
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub time: DateTime<Utc>,
    /// Unpredictable-at-proposal but agreed value from the previous commit
    pub last_commit_hash: Hash,
}

/// Store branch, block header, current transaction bytes and emitted events
/// for one logical step.
pub struct Context<'a> {
    store: &'a mut dyn KvStore,
    header: BlockHeader,
    tx_bytes: Vec<u8>,
    events: Vec<Event>,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut dyn KvStore, header: BlockHeader) -> Self {
        Self {
            store,
            header,
            tx_bytes: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_tx_bytes(mut self, tx_bytes: Vec<u8>) -> Self {
        self.tx_bytes = tx_bytes;
        self
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        &mut *self.store
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        self.header.time
    }

    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    pub fn last_commit_hash(&self) -> &Hash {
        &self.header.last_commit_hash
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
