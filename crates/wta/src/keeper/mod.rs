//! typed access to module state
//!
//! The keeper is a stateless handle: all state lives in the [`KvStore`]
//! reached through the [`crate::context::Context`] (writes) or a plain store
//! reference (reads). Balance movements go through the injected [`Bank`].

mod distribution;
mod draw;
mod genesis;
mod invariants;
mod params;
pub mod query;
mod tickets;

pub use distribution::{split_tickets_cost, TicketsCostSplit};
pub use invariants::{format_invariant, InvariantFn};

use crate::bank::Bank;
use crate::error::Result;
use crate::store::KvStore;
use crate::types::{decode, encode};
use serde::{de::DeserializeOwned, Serialize};

pub struct Keeper<B: Bank> {
    bank: B,
}

impl<B: Bank> Keeper<B> {
    pub fn new(bank: B) -> Self {
        Self { bank }
    }
}

fn read<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> Result<Option<T>> {
    store.get(key)?.map(|bytes| decode(&bytes)).transpose()
}

fn write<T: Serialize>(store: &mut dyn KvStore, key: &[u8], value: &T) -> Result<()> {
    store.set(key, encode(value)?)
}

/// Keys under `prefix`, collected before any deletion touches them
fn collect_keys(store: &dyn KvStore, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
    store
        .prefix_iter(prefix, crate::store::Order::Ascending)
        .map(|item| item.map(|(k, _)| k))
        .collect()
}
