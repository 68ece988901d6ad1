//! purchase handler: delivers `MsgBuyTickets`

use crate::bank::Bank;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::keeper::Keeper;
use crate::random::DrawRng;
use crate::types::events::{
    ATTRIBUTE_KEY_ACTION, ATTRIBUTE_KEY_MODULE, ATTRIBUTE_KEY_SENDER, ATTRIBUTE_KEY_TICKET_BUYER,
    ATTRIBUTE_KEY_TICKET_ID, ATTRIBUTE_KEY_TICKET_TIMESTAMP, EVENT_TYPE_BUY_TICKET,
    EVENT_TYPE_MESSAGE,
};
use crate::types::keys::MODULE_NAME;
use crate::types::{
    duplicated_ticket_ids, format_time, Address, Event, MsgBuyTickets, Ticket, TICKET_ID_BYTES,
    TYPE_MSG_BUY_TICKETS,
};
use tracing::debug;

/// Mint `quantity` tickets stamped with the block time.
///
/// Ticket `i` takes its id from a generator seeded with index `i`, so ids
/// are reproducible by every replica and distinct within one transaction.
pub fn generate_tickets(ctx: &Context<'_>, quantity: u32, owner: Address) -> Vec<Ticket> {
    (0..quantity as u64)
        .map(|i| {
            let mut id = [0u8; TICKET_ID_BYTES];
            DrawRng::from_context_and_index(ctx, i).fill_bytes(&mut id);
            Ticket::new(hex::encode(id), ctx.block_time(), owner)
        })
        .collect()
}

/// Charge the buyer, then register the tickets and grow the draw.
///
/// On error the caller discards the store branch: no funds move and no
/// ticket is issued.
pub fn buy_tickets<B: Bank>(
    ctx: &mut Context<'_>,
    keeper: &Keeper<B>,
    msg: &MsgBuyTickets,
) -> Result<Vec<Ticket>> {
    msg.validate_basic()?;
    let buyer = msg.buyer_address()?;

    let draw = keeper.get_current_draw(ctx.store())?;
    if draw.is_closed_at(ctx.block_time()) {
        return Err(Error::DrawClosed(format_time(&draw.end_time)));
    }

    let params = keeper.get_params(ctx.store())?;
    let split = keeper.withdraw_tickets_cost(ctx, &params, msg.quantity, &buyer)?;

    let tickets = generate_tickets(ctx, msg.quantity, buyer);
    if let Some(id) = duplicated_ticket_ids(&tickets).into_iter().next() {
        return Err(Error::DuplicateTicketId(id));
    }
    for ticket in &tickets {
        if keeper.has_ticket(ctx.store(), &ticket.id)? {
            return Err(Error::DuplicateTicketId(ticket.id.clone()));
        }
    }

    let new_participant = !keeper.is_participant(ctx.store(), &buyer)?;
    keeper.save_tickets(ctx, &tickets)?;
    keeper.update_draw_data(ctx, new_participant as u32, msg.quantity, &split.prize)?;

    for ticket in &tickets {
        ctx.emit(
            Event::new(EVENT_TYPE_BUY_TICKET)
                .attr(ATTRIBUTE_KEY_TICKET_ID, &ticket.id)
                .attr(ATTRIBUTE_KEY_TICKET_BUYER, ticket.owner)
                .attr(ATTRIBUTE_KEY_TICKET_TIMESTAMP, format_time(&ticket.timestamp)),
        );
    }
    ctx.emit(
        Event::new(EVENT_TYPE_MESSAGE)
            .attr(ATTRIBUTE_KEY_MODULE, MODULE_NAME)
            .attr(ATTRIBUTE_KEY_ACTION, TYPE_MSG_BUY_TICKETS)
            .attr(ATTRIBUTE_KEY_SENDER, buyer),
    );

    debug!("{} bought {} tickets for {}", buyer, msg.quantity, split.total);
    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::StoreBank;
    use crate::keeper::testutil::{at, header};
    use crate::store::MemStore;
    use crate::types::keys::PRIZE_COLLECTOR_NAME;
    use crate::types::{Coin, Coins, GenesisState};

    fn setup(balance: u128) -> (MemStore, Keeper<StoreBank>, Address) {
        let mut store = MemStore::new();
        let keeper = Keeper::new(StoreBank);
        let buyer = Address::new([5; 20]);
        StoreBank
            .mint_to_account(&mut store, &buyer, &Coins::from(Coin::new("stake", balance)))
            .unwrap();
        keeper
            .init_genesis(
                &mut Context::new(&mut store, header(at(1))),
                &GenesisState::default_at(at(1)),
            )
            .unwrap();
        (store, keeper, buyer)
    }

    const PRICE: u128 = 10_000_000;

    #[test]
    fn test_buy_registers_tickets() {
        let (mut store, keeper, buyer) = setup(3 * PRICE);
        let msg = MsgBuyTickets::new(3, buyer.to_string());

        let mut ctx = Context::new(&mut store, header(at(1))).with_tx_bytes(b"tx-1".to_vec());
        let tickets = buy_tickets(&mut ctx, &keeper, &msg).unwrap();
        assert_eq!(tickets.len(), 3);
        assert!(tickets.iter().all(|t| t.id.len() == 2 * TICKET_ID_BYTES));
        let buys = ctx
            .events()
            .iter()
            .filter(|e| e.kind == EVENT_TYPE_BUY_TICKET)
            .count();
        assert_eq!(buys, 3);

        let draw = keeper.get_current_draw(&store).unwrap();
        assert_eq!((draw.participants, draw.tickets_sold), (1, 3));
        assert_eq!(draw.prize.amount_of("stake"), 3 * PRICE * 98 / 100);
        assert_eq!(
            StoreBank
                .module_balance(&store, PRIZE_COLLECTOR_NAME)
                .unwrap(),
            draw.prize
        );
        keeper.assert_invariants(&store).unwrap();
    }

    #[test]
    fn test_second_purchase_same_buyer() {
        let (mut store, keeper, buyer) = setup(2 * PRICE);
        let msg = MsgBuyTickets::new(1, buyer.to_string());

        let mut ctx = Context::new(&mut store, header(at(1))).with_tx_bytes(b"tx-1".to_vec());
        buy_tickets(&mut ctx, &keeper, &msg).unwrap();
        let mut ctx = Context::new(&mut store, header(at(1))).with_tx_bytes(b"tx-2".to_vec());
        buy_tickets(&mut ctx, &keeper, &msg).unwrap();

        let draw = keeper.get_current_draw(&store).unwrap();
        assert_eq!((draw.participants, draw.tickets_sold), (1, 2));
    }

    #[test]
    fn test_replayed_tx_bytes_collide() {
        let (mut store, keeper, buyer) = setup(2 * PRICE);
        let msg = MsgBuyTickets::new(1, buyer.to_string());

        let mut ctx = Context::new(&mut store, header(at(1))).with_tx_bytes(b"same".to_vec());
        buy_tickets(&mut ctx, &keeper, &msg).unwrap();
        let mut ctx = Context::new(&mut store, header(at(1))).with_tx_bytes(b"same".to_vec());
        let err = buy_tickets(&mut ctx, &keeper, &msg).unwrap_err();
        assert!(matches!(err, Error::DuplicateTicketId(_)));
    }

    #[test]
    fn test_rejects_before_any_transfer() {
        let (mut store, keeper, buyer) = setup(PRICE - 1);
        let before = store.clone();

        let mut ctx = Context::new(&mut store, header(at(1)));
        let err = buy_tickets(&mut ctx, &keeper, &MsgBuyTickets::new(1, buyer.to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds(_)));

        let err = buy_tickets(&mut ctx, &keeper, &MsgBuyTickets::new(0, buyer.to_string()))
            .unwrap_err();
        assert_eq!(err, Error::InvalidQuantity(0));
        assert!(ctx.events().is_empty());
        assert_eq!(store, before);
    }

    #[test]
    fn test_closed_draw_rejects() {
        let (mut store, keeper, buyer) = setup(PRICE);
        let mut ctx = Context::new(&mut store, header(at(2)));
        let err = buy_tickets(&mut ctx, &keeper, &MsgBuyTickets::new(1, buyer.to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::DrawClosed(_)));
    }
}
