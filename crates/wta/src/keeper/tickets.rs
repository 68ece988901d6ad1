//! ticket registry

use super::{collect_keys, read, write, Keeper};
use crate::bank::Bank;
use crate::context::Context;
use crate::error::Result;
use crate::store::{KvStore, Order};
use crate::types::keys::{participant_key, ticket_key, PARTICIPANTS_PREFIX, TICKETS_PREFIX};
use crate::types::{decode, Address, Ticket};
use std::collections::HashSet;
use tracing::debug;

const PARTICIPANT_MARKER: &[u8] = &[1];

impl<B: Bank> Keeper<B> {
    /// Upsert each ticket under its id and mark its owner as a participant
    pub fn save_tickets(&self, ctx: &mut Context<'_>, tickets: &[Ticket]) -> Result<()> {
        let store = ctx.store_mut();
        for ticket in tickets {
            write(store, &ticket_key(&ticket.id), ticket)?;
            store.set(&participant_key(&ticket.owner), PARTICIPANT_MARKER.to_vec())?;
        }
        Ok(())
    }

    pub fn get_ticket(&self, store: &dyn KvStore, id: &str) -> Result<Option<Ticket>> {
        read(store, &ticket_key(id))
    }

    pub fn has_ticket(&self, store: &dyn KvStore, id: &str) -> Result<bool> {
        store.has(&ticket_key(id))
    }

    /// Whether `owner` holds at least one ticket in the live draw
    pub fn is_participant(&self, store: &dyn KvStore, owner: &Address) -> Result<bool> {
        store.has(&participant_key(owner))
    }

    /// Visit stored tickets in ascending id order until `f` returns `true`
    pub fn iterate_tickets<F>(&self, store: &dyn KvStore, mut f: F) -> Result<()>
    where
        F: FnMut(usize, Ticket) -> bool,
    {
        for (index, item) in store.prefix_iter(TICKETS_PREFIX, Order::Ascending).enumerate() {
            let (_, value) = item?;
            if f(index, decode(&value)?) {
                break;
            }
        }
        Ok(())
    }

    /// All current tickets, ascending by id
    pub fn get_tickets(&self, store: &dyn KvStore) -> Result<Vec<Ticket>> {
        let mut tickets = Vec::new();
        self.iterate_tickets(store, |_, ticket| {
            tickets.push(ticket);
            false
        })?;
        Ok(tickets)
    }

    /// Distinct owners in first-seen order plus every ticket, in one pass
    pub fn get_participants_and_tickets(
        &self,
        store: &dyn KvStore,
    ) -> Result<(Vec<Address>, Vec<Ticket>)> {
        let mut seen = HashSet::new();
        let mut participants = Vec::new();
        let mut tickets = Vec::new();
        self.iterate_tickets(store, |_, ticket| {
            if seen.insert(ticket.owner) {
                participants.push(ticket.owner);
            }
            tickets.push(ticket);
            false
        })?;
        Ok((participants, tickets))
    }

    /// Delete every current ticket and the participant index
    pub fn wipe_current_tickets(&self, ctx: &mut Context<'_>) -> Result<()> {
        let store = ctx.store_mut();
        let mut keys = collect_keys(store, TICKETS_PREFIX)?;
        let wiped = keys.len();
        keys.extend(collect_keys(store, PARTICIPANTS_PREFIX)?);
        for key in keys {
            store.delete(&key)?;
        }
        debug!("wiped {} tickets", wiped);
        Ok(())
    }
}
