//! randomized simulation
//!
//! Builds a random genesis, then produces blocks of random purchases while
//! checking every invariant after each block. Everything is driven by one
//! seeded `ChaCha8Rng`, so a failing seed replays exactly.

use crate::bank::{decode_amount, Bank, StoreBank, BALANCES_PREFIX, SUPPLY_PREFIX};
use crate::chain::{AppGenesis, Chain, GenesisAccount, TxOutcome};
use crate::error::{Error, Result};
use crate::keeper::split_tickets_cost;
use crate::store::{KvStore, MemStore, Order};
use crate::types::keys::{
    CURRENT_DRAW_KEY, HISTORICAL_DRAWS_PREFIX, PARAMS_KEY, PARTICIPANTS_PREFIX, TICKETS_PREFIX,
};
use crate::types::{
    decode, tokens_from_power, Address, Coin, Coins, DistributionParams, Draw, DrawParams,
    FeeDestination, GenesisState, HistoricalDrawData, Params, Percentage, Ticket, TicketParams,
    ADDRESS_LEN, DEFAULT_DENOM, TICKET_ID_BYTES,
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

const MAX_TICKETS_PER_PURCHASE: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub seed: u64,
    pub blocks: u64,
    pub accounts: usize,
    pub max_txs_per_block: usize,
    /// Upper bound on the time between two blocks
    pub max_block_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            blocks: 200,
            accounts: 10,
            max_txs_per_block: 5,
            max_block_secs: 900,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimReport {
    pub blocks: u64,
    pub txs_ok: u64,
    pub txs_failed: u64,
    /// Purchases not attempted because the buyer could not afford them
    pub txs_skipped: u64,
    pub draws_closed: u64,
    pub winners: u64,
    pub last_commit_hash: String,
}

fn random_address<R: Rng>(rng: &mut R) -> Address {
    let mut bytes = [0u8; ADDRESS_LEN];
    rng.fill_bytes(&mut bytes);
    Address::new(bytes)
}

fn random_ticket_id<R: Rng>(rng: &mut R) -> String {
    let mut id = [0u8; TICKET_ID_BYTES];
    rng.fill_bytes(&mut id);
    hex::encode(id)
}

pub fn random_accounts<R: Rng>(rng: &mut R, n: usize) -> Vec<GenesisAccount> {
    (0..n)
        .map(|_| GenesisAccount {
            address: random_address(rng),
            coins: Coins::from(Coin::new(
                DEFAULT_DENOM,
                tokens_from_power(rng.gen_range(0..=1_000)),
            )),
        })
        .collect()
}

/// Valid parameters: each share at least 0.01%, shares summing to 1
pub fn random_params<R: Rng>(rng: &mut R) -> Params {
    let prize = rng.gen_range(8_000..=9_800u32);
    let fee = rng.gen_range(1..(10_000 - prize));
    let burn = 10_000 - prize - fee;
    let destination = if rng.gen_bool(0.5) {
        FeeDestination::CommunityPool
    } else {
        FeeDestination::FeeCollector
    };

    Params::new(
        DistributionParams::new(
            Percentage::from_bps(prize),
            Percentage::from_bps(fee),
            Percentage::from_bps(burn),
        )
        .with_fee_destination(destination),
        DrawParams::new(Duration::from_secs(rng.gen_range(60..=7_200)))
            .with_min_participants(rng.gen_range(1..=3))
            .with_rollover_prize(rng.gen_bool(0.5)),
        TicketParams::new(Coin::new(DEFAULT_DENOM, tokens_from_power(rng.gen_range(1..=20)))),
    )
}

/// Random module genesis whose tickets belong to `owners`
pub fn random_genesis<R: Rng>(
    rng: &mut R,
    genesis_time: DateTime<Utc>,
    owners: &[Address],
) -> Result<GenesisState> {
    let params = random_params(rng);
    let duration = ChronoDuration::from_std(params.draw.duration)
        .map_err(|e| Error::InvalidParams(e.to_string()))?;

    let mut tickets = Vec::new();
    let mut seen = HashSet::new();
    let mut holders = HashSet::new();
    for owner in owners {
        for _ in 0..rng.gen_range(0..=3) {
            let id = random_ticket_id(rng);
            if !seen.insert(id.clone()) {
                continue;
            }
            let bought = genesis_time - ChronoDuration::seconds(rng.gen_range(0..=600));
            tickets.push(Ticket::new(id, bought, *owner));
            holders.insert(*owner);
        }
    }
    tickets.sort_by(|a, b| a.id.cmp(&b.id));

    let prize = if tickets.is_empty() {
        Coins::new()
    } else {
        Coins::from(split_tickets_cost(&params, tickets.len() as u32)?.prize)
    };
    let draw = Draw::new(prize, genesis_time + duration)
        .with_counts(holders.len() as u32, tickets.len() as u32);

    let history = (1..=rng.gen_range(0..=3i32))
        .rev()
        .map(|k| {
            let end_time = genesis_time - duration * k;
            let winner = rng.gen_bool(0.5).then(|| {
                Ticket::new(random_ticket_id(rng), end_time - duration / 2, random_address(rng))
            });
            let sold = winner.is_some() as u32;
            HistoricalDrawData::new(Draw::new(Coins::new(), end_time).with_counts(sold, sold), winner)
        })
        .collect();

    let genesis = GenesisState::new(draw, tickets, history, params);
    genesis.validate()?;
    Ok(genesis)
}

/// Random chain genesis seeded from `rng`
pub fn random_app_genesis<R: Rng>(
    rng: &mut R,
    genesis_time: DateTime<Utc>,
    accounts: usize,
) -> Result<AppGenesis> {
    let accounts = random_accounts(rng, accounts);
    let owners: Vec<_> = accounts.iter().map(|a| a.address).collect();
    let wta = random_genesis(rng, genesis_time, &owners)?;
    Ok(AppGenesis {
        chain_id: format!("wta-sim-{}", rng.next_u32()),
        genesis_time,
        accounts,
        wta,
    })
}

/// A purchase of 1 to 10 tickets by a random account, or `None` when the
/// chosen account cannot pay for it.
pub fn simulate_buy_tickets<R: Rng, S: KvStore>(
    rng: &mut R,
    chain: &Chain<S>,
    accounts: &[Address],
) -> Result<Option<Vec<u8>>> {
    let Some(buyer) = accounts.get(rng.gen_range(0..accounts.len().max(1))) else {
        return Ok(None);
    };
    let quantity = rng.gen_range(1..=MAX_TICKETS_PER_PURCHASE);

    let params = chain.keeper().get_params(chain.store())?;
    let cost = params.ticket.price.checked_mul(quantity as u64)?;
    if chain.balance(buyer, &cost.denom)? < cost.amount {
        return Ok(None);
    }
    chain.build_buy_tickets_tx(quantity, buyer).map(Some)
}

/// Total supply equals the sum of every balance, per denom
fn check_supply(store: &dyn KvStore) -> Result<()> {
    let mut held = Coins::new();
    for (_, coins) in StoreBank.accounts(store)? {
        held = held.checked_add(&coins)?;
    }
    for coin in held.iter() {
        let supply = StoreBank.supply(store, &coin.denom)?;
        if supply != coin.amount {
            return Err(Error::Corrupted(format!(
                "supply of {} is {}, balances sum to {}",
                coin.denom, supply, coin.amount
            )));
        }
    }
    Ok(())
}

fn sim_genesis_time() -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(1_577_836_800, 0)
        .single()
        .ok_or_else(|| Error::InvalidGenesis("simulation genesis time".into()))
}

pub fn run_simulation(config: &SimConfig) -> Result<SimReport> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let genesis_time = sim_genesis_time()?;
    let genesis = random_app_genesis(&mut rng, genesis_time, config.accounts)?;
    let accounts: Vec<_> = genesis.accounts.iter().map(|a| a.address).collect();
    let mut chain = Chain::init(MemStore::new(), &genesis)?;

    let mut report = SimReport::default();
    let mut time = genesis_time;
    for _ in 0..config.blocks {
        time += ChronoDuration::seconds(rng.gen_range(1..=config.max_block_secs.max(1)) as i64);
        let (closed, _) = chain.begin_block(time)?;
        if let Some(data) = closed {
            report.draws_closed += 1;
            report.winners += data.winning_ticket.is_some() as u64;
        }

        for _ in 0..rng.gen_range(0..=config.max_txs_per_block) {
            match simulate_buy_tickets(&mut rng, &chain, &accounts)? {
                Some(tx) => match chain.deliver_tx(&tx)? {
                    TxOutcome::Ok(_) => report.txs_ok += 1,
                    TxOutcome::Failed(reason) => {
                        debug!("simulated tx failed: {}", reason);
                        report.txs_failed += 1;
                    }
                },
                None => report.txs_skipped += 1,
            }
        }

        let hash = chain.commit()?;
        chain.keeper().assert_invariants(chain.store())?;
        check_supply(chain.store())?;
        report.blocks += 1;
        report.last_commit_hash = hex::encode(hash);
    }

    info!(
        "simulated {} blocks: {} txs ok, {} failed, {} draws closed, {} winners",
        report.blocks, report.txs_ok, report.txs_failed, report.draws_closed, report.winners
    );
    Ok(report)
}

fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Human-readable rendering of one raw store entry
pub fn decode_store_entry(key: &[u8], value: &[u8]) -> Result<String> {
    if key == CURRENT_DRAW_KEY {
        return Ok(format!("draw {}", json(&decode::<Draw>(value)?)?));
    }
    if key == PARAMS_KEY {
        return Ok(format!("params {}", json(&decode::<Params>(value)?)?));
    }
    if key.starts_with(TICKETS_PREFIX) {
        return Ok(format!("ticket {}", json(&decode::<Ticket>(value)?)?));
    }
    if let Some(owner) = key.strip_prefix(PARTICIPANTS_PREFIX) {
        return Ok(format!("participant {}", Address::from_slice(owner)?));
    }
    if key.starts_with(HISTORICAL_DRAWS_PREFIX) {
        let data = decode::<HistoricalDrawData>(value)?;
        return Ok(format!("historical draw {}", json(&data)?));
    }
    if let Some(rest) = key.strip_prefix(BALANCES_PREFIX) {
        if rest.len() > ADDRESS_LEN {
            let owner = Address::from_slice(&rest[..ADDRESS_LEN])?;
            let denom = String::from_utf8_lossy(&rest[ADDRESS_LEN..]);
            return Ok(format!("balance {} {}{}", owner, decode_amount(value)?, denom));
        }
    }
    if let Some(denom) = key.strip_prefix(SUPPLY_PREFIX) {
        return Ok(format!(
            "supply {}{}",
            decode_amount(value)?,
            String::from_utf8_lossy(denom)
        ));
    }
    Ok(format!(
        "{} = {}",
        String::from_utf8_lossy(key),
        hex::encode(value)
    ))
}

/// Every store entry, decoded, in key order
pub fn dump_store(store: &dyn KvStore) -> Result<Vec<String>> {
    store
        .prefix_iter(b"", Order::Ascending)
        .map(|item| item.and_then(|(k, v)| decode_store_entry(&k, &v)))
        .collect()
}
