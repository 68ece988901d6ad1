//! draw ledger: the live draw and the archive of closed ones

use super::{read, write, Keeper};
use crate::bank::Bank;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::{KvStore, Order};
use crate::types::events::{ATTRIBUTE_KEY_PRIZE_AMOUNT, EVENT_TYPE_PRIZE_INCREASE};
use crate::types::keys::{
    historical_draw_key, CURRENT_DRAW_KEY, HISTORICAL_DRAWS_PREFIX, PRIZE_COLLECTOR_NAME,
};
use crate::types::{decode, Address, Coin, Coins, Draw, Event, HistoricalDrawData};
use chrono::{DateTime, Utc};

impl<B: Bank> Keeper<B> {
    pub fn get_current_draw(&self, store: &dyn KvStore) -> Result<Draw> {
        read(store, CURRENT_DRAW_KEY)?
            .ok_or_else(|| Error::Corrupted("current draw not initialized".into()))
    }

    pub fn save_current_draw(&self, ctx: &mut Context<'_>, draw: &Draw) -> Result<()> {
        write(ctx.store_mut(), CURRENT_DRAW_KEY, draw)
    }

    /// Reopen the draw at `end_time` with zeroed counts, keeping the prize
    pub fn save_current_draw_end_time(
        &self,
        ctx: &mut Context<'_>,
        end_time: DateTime<Utc>,
    ) -> Result<Draw> {
        let prize = match read::<Draw>(ctx.store(), CURRENT_DRAW_KEY)? {
            Some(draw) => draw.prize,
            None => Coins::new(),
        };
        let draw = Draw::new(prize, end_time);
        self.save_current_draw(ctx, &draw)?;
        Ok(draw)
    }

    /// Add to the live draw's counters and prize.
    ///
    /// Deltas are unsigned so the draw only ever grows while it is open.
    pub fn update_draw_data(
        &self,
        ctx: &mut Context<'_>,
        participants_delta: u32,
        tickets_delta: u32,
        amount: &Coin,
    ) -> Result<Draw> {
        let mut draw = self.get_current_draw(ctx.store())?;
        draw.participants = draw
            .participants
            .checked_add(participants_delta)
            .ok_or_else(|| Error::Overflow("draw participants".into()))?;
        draw.tickets_sold = draw
            .tickets_sold
            .checked_add(tickets_delta)
            .ok_or_else(|| Error::Overflow("draw tickets sold".into()))?;
        draw.prize.checked_add_coin(amount)?;
        self.save_current_draw(ctx, &draw)?;

        ctx.emit(
            Event::new(EVENT_TYPE_PRIZE_INCREASE).attr(ATTRIBUTE_KEY_PRIZE_AMOUNT, &draw.prize),
        );
        Ok(draw)
    }

    pub fn increment_draw_prize(&self, ctx: &mut Context<'_>, amount: &Coin) -> Result<Draw> {
        self.update_draw_data(ctx, 0, 0, amount)
    }

    /// Pay `prize` out of the prize collector
    pub fn transfer_draw_prize(
        &self,
        ctx: &mut Context<'_>,
        prize: &Coins,
        winner: &Address,
    ) -> Result<()> {
        self.bank
            .send_coins_from_module_to_account(ctx.store_mut(), PRIZE_COLLECTOR_NAME, winner, prize)
    }

    /// Archive under the draw's end time; a second entry with the same end
    /// time replaces the first.
    pub fn save_historical_draw(
        &self,
        ctx: &mut Context<'_>,
        data: &HistoricalDrawData,
    ) -> Result<()> {
        write(ctx.store_mut(), &historical_draw_key(&data.draw.end_time), data)
    }

    /// Visit archived draws oldest first. The visitor returns `true` to stop;
    /// the entry it was handed when stopping counts as visited.
    pub fn iterate_historical_draws<F>(&self, store: &dyn KvStore, mut f: F) -> Result<()>
    where
        F: FnMut(usize, &HistoricalDrawData) -> bool,
    {
        for (index, item) in store
            .prefix_iter(HISTORICAL_DRAWS_PREFIX, Order::Ascending)
            .enumerate()
        {
            let (_, value) = item?;
            if f(index, &decode(&value)?) {
                break;
            }
        }
        Ok(())
    }

    pub fn get_historical_draws(&self, store: &dyn KvStore) -> Result<Vec<HistoricalDrawData>> {
        let mut draws = Vec::new();
        self.iterate_historical_draws(store, |_, data| {
            draws.push(data.clone());
            false
        })?;
        Ok(draws)
    }
}
