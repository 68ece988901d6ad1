//! state invariants, checked after genesis and by the simulation after every block

use super::Keeper;
use crate::bank::Bank;
use crate::error::{Error, Result};
use crate::store::{KvStore, Order};
use crate::types::duplicated_ticket_ids;
use crate::types::keys::{MODULE_NAME, PARTICIPANTS_PREFIX, PRIZE_COLLECTOR_NAME};

/// Returns a report and whether the invariant is broken
pub type InvariantFn<B> = fn(&Keeper<B>, &dyn KvStore) -> Result<(String, bool)>;

pub fn format_invariant(route: &str, message: &str) -> String {
    format!("{}: {} invariant\n{}\n", MODULE_NAME, route, message)
}

impl<B: Bank> Keeper<B> {
    /// Every invariant with the route it is registered under
    pub fn invariants() -> Vec<(&'static str, InvariantFn<B>)> {
        vec![
            ("tickets", Self::tickets_invariant as InvariantFn<B>),
            ("draw-counts", Self::draw_counts_invariant as InvariantFn<B>),
            ("prize-balance", Self::prize_balance_invariant as InvariantFn<B>),
        ]
    }

    /// No two tickets share an id and every ticket predates the draw's close
    pub fn tickets_invariant(&self, store: &dyn KvStore) -> Result<(String, bool)> {
        let draw = self.get_current_draw(store)?;
        let tickets = self.get_tickets(store)?;

        let mut problems = Vec::new();
        let duplicated = duplicated_ticket_ids(&tickets);
        if !duplicated.is_empty() {
            problems.push(format!("\tduplicated ticket ids: {}", duplicated.join(", ")));
        }
        for ticket in &tickets {
            if let Err(e) = ticket.validate(draw.end_time) {
                problems.push(format!("\t{}", e));
            }
        }

        let broken = !problems.is_empty();
        Ok((format_invariant("tickets", &problems.join("\n")), broken))
    }

    /// The tracked counters agree with the live ticket set
    pub fn draw_counts_invariant(&self, store: &dyn KvStore) -> Result<(String, bool)> {
        let draw = self.get_current_draw(store)?;
        let (participants, tickets) = self.get_participants_and_tickets(store)?;
        let indexed = self.participant_index_len(store)?;

        let broken = draw.tickets_sold < draw.participants
            || draw.tickets_sold as usize != tickets.len()
            || draw.participants as usize != participants.len()
            || indexed != participants.len();
        let message = format!(
            "\tdraw tracks {} participants and {} tickets; store holds {} tickets of {} owners, {} indexed",
            draw.participants,
            draw.tickets_sold,
            tickets.len(),
            participants.len(),
            indexed
        );
        Ok((format_invariant("draw-counts", &message), broken))
    }

    /// The prize collector holds at least the tracked prize
    pub fn prize_balance_invariant(&self, store: &dyn KvStore) -> Result<(String, bool)> {
        let draw = self.get_current_draw(store)?;
        let held = self.bank.module_balance(store, PRIZE_COLLECTOR_NAME)?;

        let broken = draw
            .prize
            .iter()
            .any(|coin| held.amount_of(&coin.denom) < coin.amount);
        let message = format!(
            "\tprize collector holds {}, draw prize is {}",
            held, draw.prize
        );
        Ok((format_invariant("prize-balance", &message), broken))
    }

    /// Run every invariant; a broken one is reported as corrupted state
    pub fn assert_invariants(&self, store: &dyn KvStore) -> Result<()> {
        for (_, invariant) in Self::invariants() {
            let (message, broken) = invariant(self, store)?;
            if broken {
                return Err(Error::Corrupted(message));
            }
        }
        Ok(())
    }

    fn participant_index_len(&self, store: &dyn KvStore) -> Result<usize> {
        let mut len = 0;
        for item in store.prefix_iter(PARTICIPANTS_PREFIX, Order::Ascending) {
            item?;
            len += 1;
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use crate::bank::{Bank, StoreBank};
    use crate::error::Error;
    use crate::keeper::testutil::{at, ctx, keeper};
    use crate::store::{KvStore, MemStore};
    use crate::types::keys::{ticket_key, PRIZE_COLLECTOR_NAME};
    use crate::types::{encode, Address, Coin, Coins, Draw, GenesisState, Params, Ticket};

    fn loaded() -> MemStore {
        let mut store = MemStore::new();
        let owner = Address::new([1; 20]);
        let state = GenesisState::new(
            Draw::new(Coins::from(Coin::new("stake", 10)), at(5)).with_counts(1, 2),
            vec![Ticket::new("a", at(1), owner), Ticket::new("b", at(2), owner)],
            vec![],
            Params::default(),
        );
        StoreBank
            .mint_coins(&mut store, PRIZE_COLLECTOR_NAME, &Coins::from(Coin::new("stake", 10)))
            .unwrap();
        keeper()
            .init_genesis(&mut ctx(&mut store, at(1)), &state)
            .unwrap();
        store
    }

    #[test]
    fn test_all_hold_after_genesis() {
        let store = loaded();
        keeper().assert_invariants(&store).unwrap();
    }

    #[test]
    fn test_draw_counts_broken_by_stray_ticket() {
        let mut store = loaded();
        let stray = Ticket::new("c", at(3), Address::new([1; 20]));
        store.set(&ticket_key("c"), encode(&stray).unwrap()).unwrap();

        let (message, broken) = keeper().draw_counts_invariant(&store).unwrap();
        assert!(broken, "{}", message);
        assert!(matches!(
            keeper().assert_invariants(&store),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_tickets_invariant_catches_late_ticket() {
        let mut store = loaded();
        let late = Ticket::new("b", at(9), Address::new([1; 20]));
        store.set(&ticket_key("b"), encode(&late).unwrap()).unwrap();

        let (message, broken) = keeper().tickets_invariant(&store).unwrap();
        assert!(broken);
        assert!(message.starts_with("wta: tickets invariant"));
    }

    #[test]
    fn test_prize_balance_broken_when_collector_drained() {
        let mut store = loaded();
        StoreBank
            .send_coins_from_module_to_account(
                &mut store,
                PRIZE_COLLECTOR_NAME,
                &Address::new([9; 20]),
                &Coins::from(Coin::new("stake", 1)),
            )
            .unwrap();

        let (_, broken) = keeper().prize_balance_invariant(&store).unwrap();
        assert!(broken);
    }
}
