//! per-block draw lifecycle
//!
//! Runs once at the start of every block, before any transaction. While the
//! block time is before the live draw's end time nothing happens; otherwise
//! the draw is closed, possibly paid out, archived, and replaced.

use crate::bank::Bank;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::keeper::Keeper;
use crate::random::DrawRng;
use crate::types::events::{
    ATTRIBUTE_KEY_DRAW_CLOSING, ATTRIBUTE_KEY_WINNER_ADDRESS, ATTRIBUTE_KEY_WON_AMOUNT,
    EVENT_TYPE_NEW_DRAW, EVENT_TYPE_WINNER_DRAWN,
};
use crate::types::{format_time, Coins, Draw, Event, HistoricalDrawData};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

fn next_end_time(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| {
            Error::Overflow(format!("draw end time {}s after {}", duration.as_secs(), now))
        })
}

/// Close the live draw if its time has come.
///
/// Returns the archived draw when one was closed. Any error here is meant to
/// abort the block: a payout that silently failed would destroy the prize.
pub fn begin_blocker<B: Bank>(
    ctx: &mut Context<'_>,
    keeper: &Keeper<B>,
) -> Result<Option<HistoricalDrawData>> {
    let draw = keeper.get_current_draw(ctx.store())?;
    if !draw.is_closed_at(ctx.block_time()) {
        return Ok(None);
    }

    let params = keeper.get_params(ctx.store())?;
    let (participants, tickets) = keeper.get_participants_and_tickets(ctx.store())?;

    let winning_ticket = if params.draw.is_eligible(participants.len(), tickets.len()) {
        let winner = DrawRng::from_context(ctx)
            .choose(&tickets)
            .cloned()
            .ok_or_else(|| Error::Corrupted("eligible draw without tickets".into()))?;

        if !draw.prize.is_empty() {
            keeper.transfer_draw_prize(ctx, &draw.prize, &winner.owner)?;
        }
        ctx.emit(
            Event::new(EVENT_TYPE_WINNER_DRAWN)
                .attr(ATTRIBUTE_KEY_WINNER_ADDRESS, winner.owner)
                .attr(ATTRIBUTE_KEY_WON_AMOUNT, &draw.prize),
        );
        info!(
            "draw closed at height {}: ticket {} of {} wins {} ({} tickets, {} participants)",
            ctx.block_height(),
            winner.id,
            winner.owner,
            draw.prize,
            tickets.len(),
            participants.len()
        );
        Some(winner)
    } else {
        info!(
            "draw closed at height {} without drawing: {} tickets, {} participants, {} required",
            ctx.block_height(),
            tickets.len(),
            participants.len(),
            params.draw.min_participants
        );
        None
    };

    let won = winning_ticket.is_some();
    let archived = HistoricalDrawData::new(draw, winning_ticket);
    keeper.save_historical_draw(ctx, &archived)?;
    keeper.wipe_current_tickets(ctx)?;

    let end_time = next_end_time(ctx.block_time(), params.draw.duration)?;
    let next = if !won && params.draw.rollover_prize {
        keeper.save_current_draw_end_time(ctx, end_time)?
    } else {
        let next = Draw::new(Coins::new(), end_time);
        keeper.save_current_draw(ctx, &next)?;
        next
    };
    if !won && !next.prize.is_empty() {
        info!("prize of {} rolled over", next.prize);
    }

    ctx.emit(
        Event::new(EVENT_TYPE_NEW_DRAW).attr(ATTRIBUTE_KEY_DRAW_CLOSING, format_time(&end_time)),
    );
    Ok(Some(archived))
}
