//! host-level behaviour: transactions, blocks, export/import

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use wta::store::{KvIter, Write};
use wta::types::events::{EVENT_TYPE_NEW_DRAW, EVENT_TYPE_WINNER_DRAWN};
use wta::types::keys::PRIZE_COLLECTOR_NAME;
use wta::types::{DistributionParams, Percentage, TicketParams};
use wta::{
    Address, AppGenesis, Bank, Chain, Coin, Coins, Error, GenesisAccount, KvStore, MemStore,
    Order, Result, StoreBank, TxOutcome,
};

const PRICE: u128 = 10_000_000;

fn genesis_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap()
}

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn funded(n: u8, amount: u128) -> GenesisAccount {
    GenesisAccount {
        address: addr(n),
        coins: Coins::from(Coin::new("stake", amount)),
    }
}

fn new_chain(accounts: Vec<GenesisAccount>) -> Chain<MemStore> {
    let genesis = AppGenesis::new("wta-test", genesis_time(), accounts);
    Chain::init(MemStore::new(), &genesis).unwrap()
}

fn at_secs(secs: i64) -> DateTime<Utc> {
    genesis_time() + Duration::seconds(secs)
}

#[derive(Default)]
struct Faults {
    reads: Cell<bool>,
    writes: Cell<bool>,
}

/// MemStore whose reads or writes can be switched to fail
struct FlakyStore {
    inner: MemStore,
    faults: Rc<Faults>,
}

impl FlakyStore {
    fn new() -> (Self, Rc<Faults>) {
        let faults = Rc::new(Faults::default());
        let store = Self {
            inner: MemStore::new(),
            faults: faults.clone(),
        };
        (store, faults)
    }

    fn check(&self, failing: &Cell<bool>) -> Result<()> {
        if failing.get() {
            return Err(Error::Store("disk full".into()));
        }
        Ok(())
    }
}

impl KvStore for FlakyStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check(&self.faults.reads)?;
        self.inner.get(key)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.check(&self.faults.writes)?;
        self.inner.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.check(&self.faults.writes)?;
        self.inner.delete(key)
    }

    fn prefix_iter<'a>(&'a self, prefix: &[u8], order: Order) -> KvIter<'a> {
        match self.check(&self.faults.reads) {
            Ok(()) => self.inner.prefix_iter(prefix, order),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn write_batch(&mut self, writes: Vec<Write>) -> Result<()> {
        self.check(&self.faults.writes)?;
        self.inner.write_batch(writes)
    }
}

fn flaky_chain(accounts: Vec<GenesisAccount>) -> (Chain<FlakyStore>, Rc<Faults>) {
    let (store, faults) = FlakyStore::new();
    let genesis = AppGenesis::new("wta-test", genesis_time(), accounts);
    (Chain::init(store, &genesis).unwrap(), faults)
}

fn failed(outcome: &TxOutcome) -> &str {
    match outcome {
        TxOutcome::Failed(e) => e,
        TxOutcome::Ok(_) => panic!("expected failure"),
    }
}

#[test]
fn test_replayed_tx_rejected_by_sequence() {
    let mut chain = new_chain(vec![funded(1, 10 * PRICE)]);
    let tx = chain.build_buy_tickets_tx(2, &addr(1)).unwrap();

    let result = chain.produce_block(at_secs(5), &[tx.clone(), tx]).unwrap();
    assert!(matches!(result.txs[0], TxOutcome::Ok(_)));
    assert!(failed(&result.txs[1]).contains("sequence mismatch"));

    assert_eq!(chain.sequence(&addr(1)).unwrap(), 1);
    assert_eq!(chain.balance(&addr(1), "stake").unwrap(), 8 * PRICE);
    let draw = chain.keeper().get_current_draw(chain.store()).unwrap();
    assert_eq!(draw.tickets_sold, 2);
}

#[test]
fn test_garbage_tx_fails_cleanly() {
    let mut chain = new_chain(vec![funded(1, PRICE)]);
    let result = chain.produce_block(at_secs(5), &[vec![0xde, 0xad]]).unwrap();
    assert!(failed(&result.txs[0]).starts_with("invalid request"));
}

#[test]
fn test_zero_quantity_rejected_before_execution() {
    let mut chain = new_chain(vec![funded(1, PRICE)]);
    let tx = chain.build_buy_tickets_tx(0, &addr(1)).unwrap();
    let result = chain.produce_block(at_secs(5), &[tx]).unwrap();
    assert_eq!(
        failed(&result.txs[0]),
        Error::InvalidQuantity(0).to_string()
    );
}

#[test]
fn test_block_time_cannot_go_backwards() {
    let mut chain = new_chain(vec![]);
    chain.produce_block(at_secs(10), &[]).unwrap();
    assert!(matches!(
        chain.produce_block(at_secs(9), &[]),
        Err(Error::InvalidRequest(_))
    ));
    assert_eq!(chain.last_block().height, 1);
}

#[test]
fn test_full_draw_lifecycle() {
    let mut chain = new_chain(vec![
        funded(1, 10 * PRICE),
        funded(2, 10 * PRICE),
        funded(3, 10 * PRICE),
    ]);

    let mut txs = Vec::new();
    for (n, quantity) in [(1, 1), (2, 2), (3, 3)] {
        txs.push(chain.build_buy_tickets_tx(quantity, &addr(n)).unwrap());
    }
    chain.produce_block(at_secs(60), &txs).unwrap();

    let draw = chain.keeper().get_current_draw(chain.store()).unwrap();
    assert_eq!((draw.participants, draw.tickets_sold), (3, 6));
    let prize = draw.prize.amount_of("stake");
    assert_eq!(prize, 6 * PRICE * 98 / 100);

    let result = chain.produce_block(at_secs(3_600), &[]).unwrap();
    let archived = result.closed_draw.expect("draw should close");
    let winner = archived.winning_ticket.expect("draw should have a winner").owner;
    let kinds: Vec<_> = result.begin_events.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, vec![EVENT_TYPE_WINNER_DRAWN, EVENT_TYPE_NEW_DRAW]);

    let spent = match winner {
        w if w == addr(1) => PRICE,
        w if w == addr(2) => 2 * PRICE,
        _ => 3 * PRICE,
    };
    assert_eq!(
        chain.balance(&winner, "stake").unwrap(),
        10 * PRICE - spent + prize
    );
    assert!(StoreBank
        .module_balance(chain.store(), PRIZE_COLLECTOR_NAME)
        .unwrap()
        .is_empty());

    let keeper = chain.keeper();
    assert!(keeper.get_tickets(chain.store()).unwrap().is_empty());
    assert_eq!(keeper.get_historical_draws(chain.store()).unwrap().len(), 1);
    let next = keeper.get_current_draw(chain.store()).unwrap();
    assert_eq!(next.end_time, at_secs(3_600) + Duration::hours(1));
    assert!(next.prize.is_empty());
    keeper.assert_invariants(chain.store()).unwrap();
}

#[test]
fn test_same_inputs_same_chain() {
    let run = || {
        let mut chain = new_chain(vec![funded(1, 50 * PRICE), funded(2, 50 * PRICE)]);
        let mut hashes = Vec::new();
        for block in 1..=8i64 {
            let buyer = addr((block % 2 + 1) as u8);
            let tx = chain.build_buy_tickets_tx(block as u32, &buyer).unwrap();
            hashes.push(chain.produce_block(at_secs(block * 900), &[tx]).unwrap().commit_hash);
        }
        (hashes, chain.export_genesis().unwrap())
    };
    assert_eq!(run(), run());
}

#[test]
fn test_export_reimport_round_trip() {
    let mut chain = new_chain(vec![funded(1, 20 * PRICE), funded(2, 20 * PRICE)]);
    let txs = vec![
        chain.build_buy_tickets_tx(2, &addr(1)).unwrap(),
        chain.build_buy_tickets_tx(1, &addr(2)).unwrap(),
    ];
    chain.produce_block(at_secs(30), &txs).unwrap();
    chain.produce_block(at_secs(4_000), &[]).unwrap();
    let tx = chain.build_buy_tickets_tx(3, &addr(2)).unwrap();
    chain.produce_block(at_secs(4_100), &[tx]).unwrap();

    let exported = chain.export_genesis().unwrap();
    exported.validate().unwrap();
    let reloaded = Chain::init(MemStore::new(), &exported).unwrap();
    assert_eq!(reloaded.export_genesis().unwrap(), exported);

    let json = serde_json::to_string(&exported).unwrap();
    let parsed: AppGenesis = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, exported);
}

#[test]
fn test_failed_commit_leaves_no_trace() {
    let (mut chain, faults) = flaky_chain(vec![funded(1, 10 * PRICE)]);
    let tx = chain.build_buy_tickets_tx(2, &addr(1)).unwrap();
    chain.produce_block(at_secs(5), &[tx]).unwrap();

    let tx = chain.build_buy_tickets_tx(1, &addr(1)).unwrap();
    faults.writes.set(true);
    assert!(matches!(
        chain.produce_block(at_secs(3_600), &[tx.clone()]),
        Err(Error::Store(_))
    ));
    faults.writes.set(false);

    let keeper = chain.keeper();
    assert_eq!(chain.last_block().height, 1);
    assert_eq!(
        keeper.get_current_draw(chain.store()).unwrap().end_time,
        at_secs(3_600)
    );
    assert!(keeper.get_historical_draws(chain.store()).unwrap().is_empty());
    assert_eq!(keeper.get_tickets(chain.store()).unwrap().len(), 2);
    assert_eq!(chain.balance(&addr(1), "stake").unwrap(), 8 * PRICE);
    assert_eq!(chain.sequence(&addr(1)).unwrap(), 1);

    // the same block goes through once the store recovers
    let result = chain.produce_block(at_secs(3_600), &[tx]).unwrap();
    assert_eq!(result.height, 2);
    assert!(result.closed_draw.is_some());
    assert!(matches!(result.txs[0], TxOutcome::Ok(_)));
    assert_eq!(chain.keeper().get_historical_draws(chain.store()).unwrap().len(), 1);
}

#[test]
fn test_fatal_tx_error_aborts_block() {
    let (mut chain, faults) = flaky_chain(vec![funded(1, 10 * PRICE)]);
    let tx = chain.build_buy_tickets_tx(1, &addr(1)).unwrap();
    chain.produce_block(at_secs(5), &[tx]).unwrap();

    let tx = chain.build_buy_tickets_tx(1, &addr(1)).unwrap();
    let (closed, _) = chain.begin_block(at_secs(3_600)).unwrap();
    assert!(closed.is_some());
    faults.reads.set(true);
    assert!(matches!(chain.deliver_tx(&tx), Err(Error::Store(_))));
    faults.reads.set(false);

    // the draw close buffered by the aborted block never reached the store
    assert!(matches!(chain.commit(), Err(Error::InvalidRequest(_))));
    let keeper = chain.keeper();
    assert_eq!(
        keeper.get_current_draw(chain.store()).unwrap().end_time,
        at_secs(3_600)
    );
    assert!(keeper.get_historical_draws(chain.store()).unwrap().is_empty());

    let (closed, _) = chain.begin_block(at_secs(3_600)).unwrap();
    assert!(closed.is_some());
    assert!(matches!(chain.deliver_tx(&tx).unwrap(), TxOutcome::Ok(_)));
    chain.commit().unwrap();
    assert_eq!(chain.last_block().height, 2);
    assert_eq!(chain.keeper().get_historical_draws(chain.store()).unwrap().len(), 1);
}

#[test]
fn test_block_reads_see_earlier_txs() {
    let mut chain = new_chain(vec![funded(1, 10 * PRICE)]);
    chain.begin_block(at_secs(5)).unwrap();
    for _ in 0..3 {
        let tx = chain.build_buy_tickets_tx(1, &addr(1)).unwrap();
        assert!(matches!(chain.deliver_tx(&tx).unwrap(), TxOutcome::Ok(_)));
    }
    assert_eq!(chain.sequence(&addr(1)).unwrap(), 3);
    assert_eq!(chain.balance(&addr(1), "stake").unwrap(), 7 * PRICE);
    // nothing is written before commit
    assert!(chain.keeper().get_tickets(chain.store()).unwrap().is_empty());

    chain.commit().unwrap();
    assert_eq!(chain.keeper().get_tickets(chain.store()).unwrap().len(), 3);
}

#[test]
fn test_init_twice_rejected() {
    let chain = new_chain(vec![]);
    let genesis = AppGenesis::new("wta-test", genesis_time(), vec![]);
    let store = chain.into_store();
    assert!(matches!(
        Chain::init(store, &genesis),
        Err(Error::InvalidGenesis(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_purchase_conserves_funds(
        price in 1u128..1_000_000,
        quantity in 1u32..50,
        prize in 1u32..9_000,
        fee in 1u32..1_000,
    ) {
        let burn = 10_000 - prize - fee;
        let mut genesis = AppGenesis::new("wta-prop", genesis_time(), vec![funded(1, u64::MAX as u128)]);
        genesis.wta.params.ticket = TicketParams::new(Coin::new("stake", price));
        genesis.wta.params.distribution = DistributionParams::new(
            Percentage::from_bps(prize),
            Percentage::from_bps(fee),
            Percentage::from_bps(burn),
        );
        let mut chain = Chain::init(MemStore::new(), &genesis).unwrap();
        let supply_before = StoreBank.supply(chain.store(), "stake").unwrap();

        let tx = chain.build_buy_tickets_tx(quantity, &addr(1)).unwrap();
        let result = chain.produce_block(at_secs(1), &[tx]).unwrap();
        prop_assert!(matches!(result.txs[0], TxOutcome::Ok(_)));

        let total = price * quantity as u128;
        let spent = u64::MAX as u128 - chain.balance(&addr(1), "stake").unwrap();
        let burned = supply_before - StoreBank.supply(chain.store(), "stake").unwrap();
        let pooled = StoreBank.module_balance(chain.store(), PRIZE_COLLECTOR_NAME).unwrap().amount_of("stake");
        let fees = StoreBank.module_balance(chain.store(), wta::types::keys::COMMUNITY_POOL_NAME).unwrap().amount_of("stake");

        prop_assert_eq!(spent, total);
        prop_assert_eq!(pooled + fees + burned, total);
    }
}
