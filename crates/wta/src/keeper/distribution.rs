//! distribution engine: splitting a ticket purchase between prize, fee and burn

use super::Keeper;
use crate::bank::Bank;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::types::keys::{FEE_COLLECTOR_NAME, PRIZE_BURNER_NAME, PRIZE_COLLECTOR_NAME};
use crate::types::{Address, Coin, Coins, FeeDestination, Params};
use tracing::debug;

/// How the cost of one purchase divides up; the three shares sum to `total`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketsCostSplit {
    pub total: Coin,
    pub prize: Coin,
    pub fee: Coin,
    pub burn: Coin,
}

/// Split the cost of `quantity` tickets.
///
/// Prize and fee are rounded half to even; burn takes the remainder.
pub fn split_tickets_cost(params: &Params, quantity: u32) -> Result<TicketsCostSplit> {
    if quantity == 0 {
        return Err(Error::InvalidQuantity(0));
    }
    let total = params.ticket.price.checked_mul(quantity as u64)?;
    let prize = params.distribution.prize_percentage.apply_to(total.amount)?;
    let fee = params.distribution.fee_percentage.apply_to(total.amount)?;
    let burn = total
        .amount
        .checked_sub(prize)
        .and_then(|rest| rest.checked_sub(fee))
        .ok_or_else(|| Error::Overflow(format!("shares of {} exceed the total", total)))?;

    let denom = total.denom.clone();
    Ok(TicketsCostSplit {
        prize: Coin::new(denom.clone(), prize),
        fee: Coin::new(denom.clone(), fee),
        burn: Coin::new(denom, burn),
        total,
    })
}

impl<B: Bank> Keeper<B> {
    /// Charge `buyer` for `quantity` tickets and route the shares.
    ///
    /// Every transfer goes through `ctx`'s store branch; on error the caller
    /// drops the branch and nothing is charged.
    pub fn withdraw_tickets_cost(
        &self,
        ctx: &mut Context<'_>,
        params: &Params,
        quantity: u32,
        buyer: &Address,
    ) -> Result<TicketsCostSplit> {
        let split = split_tickets_cost(params, quantity)?;

        let spendable = self.bank.balance(ctx.store(), buyer, &split.total.denom)?;
        if spendable < split.total.amount {
            return Err(Error::InsufficientFunds(format!(
                "cannot purchase {} tickets: {} has {}{}, needs {}",
                quantity, buyer, spendable, split.total.denom, split.total
            )));
        }

        let store = ctx.store_mut();
        self.bank.send_coins_from_account_to_module(
            store,
            buyer,
            PRIZE_COLLECTOR_NAME,
            &Coins::from(split.prize.clone()),
        )?;

        let fee = Coins::from(split.fee.clone());
        match params.distribution.fee_destination {
            FeeDestination::CommunityPool => self.bank.fund_community_pool(store, &fee, buyer)?,
            FeeDestination::FeeCollector => {
                self.bank
                    .send_coins_from_account_to_module(store, buyer, FEE_COLLECTOR_NAME, &fee)?
            }
        }

        let burn = Coins::from(split.burn.clone());
        self.bank
            .send_coins_from_account_to_module(store, buyer, PRIZE_BURNER_NAME, &burn)?;
        self.bank.burn_coins(store, PRIZE_BURNER_NAME, &burn)?;

        debug!(
            "{} paid {}: prize {}, fee {}, burn {}",
            buyer, split.total, split.prize, split.fee, split.burn
        );
        Ok(split)
    }
}
