//! deterministic single-node host
//!
//! Drives the module the way a consensus engine would: genesis, then for
//! each block the draw scheduler followed by the block's transactions in
//! order, then a commit that fixes the entropy the next block sees.
//!
//! A block is buffered in one [`StoreCache`] branch and every transaction
//! runs in a nested branch that is folded in only if it succeeds. The
//! backing store sees the whole block, chain state included, in a single
//! batch at commit; a block aborted before that leaves no trace.

use crate::bank::{Bank, StoreBank};
use crate::context::{BlockHeader, Context, Hash};
use crate::error::{Error, Result};
use crate::handler;
use crate::keeper::Keeper;
use crate::scheduler;
use crate::store::{KvStore, StoreCache, Write};
use crate::types::keys::PRIZE_COLLECTOR_NAME;
use crate::types::{
    decode, encode, Address, Coin, Coins, Event, GenesisState, HistoricalDrawData,
    MsgBuyTickets, Ticket,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const CHAIN_STATE_KEY: &[u8] = b"chain/state";
const SEQUENCES_PREFIX: &[u8] = b"chain/sequences/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub coins: Coins,
}

/// Full chain genesis: funded accounts plus the module state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppGenesis {
    pub chain_id: String,
    pub genesis_time: DateTime<Utc>,
    pub accounts: Vec<GenesisAccount>,
    pub wta: GenesisState,
}

impl AppGenesis {
    /// Default module genesis with the given accounts
    pub fn new(
        chain_id: impl Into<String>,
        genesis_time: DateTime<Utc>,
        accounts: Vec<GenesisAccount>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_time,
            accounts,
            wta: GenesisState::default_at(genesis_time),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id.is_empty() {
            return Err(Error::InvalidGenesis("empty chain id".into()));
        }
        let mut seen = HashSet::with_capacity(self.accounts.len());
        for account in &self.accounts {
            if !seen.insert(account.address) {
                return Err(Error::InvalidGenesis(format!(
                    "duplicate account {}",
                    account.address
                )));
            }
            for coin in account.coins.iter() {
                coin.validate()?;
            }
        }
        self.wta.validate()
    }
}

/// Signed-enough transaction: the message plus the sender's sequence, which
/// makes the bytes of two otherwise identical purchases differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub msg: MsgBuyTickets,
    pub sequence: u64,
}

impl Tx {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::InvalidRequest(format!("tx decode: {}", e)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub tickets: Vec<Ticket>,
    pub events: Vec<Event>,
}

/// Outcome of one delivered transaction; failures carry the error message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutcome {
    Ok(TxResult),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResult {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub closed_draw: Option<HistoricalDrawData>,
    pub begin_events: Vec<Event>,
    pub txs: Vec<TxOutcome>,
    pub commit_hash: Hash,
}

/// Persisted between blocks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ChainState {
    chain_id: String,
    /// header of the last committed block; its hash seeds the next one
    last: BlockHeader,
}

struct OpenBlock {
    header: BlockHeader,
    txs: Vec<Vec<u8>>,
    /// buffered state delta of the block so far
    writes: Vec<Write>,
}

pub struct Chain<S: KvStore> {
    store: S,
    keeper: Keeper<StoreBank>,
    state: ChainState,
    block: Option<OpenBlock>,
}

fn sequence_key(account: &Address) -> Vec<u8> {
    let mut key = SEQUENCES_PREFIX.to_vec();
    key.extend_from_slice(account.as_bytes());
    key
}

fn genesis_hash(chain_id: &str, time: &DateTime<Utc>) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.as_bytes());
    hasher.update(time.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.finalize().into()
}

/// sha256(height || time || previous hash || tx bytes...)
pub fn commit_hash(header: &BlockHeader, txs: &[Vec<u8>]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(header.height.to_be_bytes());
    hasher.update(header.time.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(header.last_commit_hash);
    for tx in txs {
        hasher.update((tx.len() as u64).to_be_bytes());
        hasher.update(tx);
    }
    hasher.finalize().into()
}

impl<S: KvStore> Chain<S> {
    /// Initialize an empty store from `genesis`
    pub fn init(mut store: S, genesis: &AppGenesis) -> Result<Self> {
        if store.has(CHAIN_STATE_KEY)? {
            return Err(Error::InvalidGenesis("store already initialized".into()));
        }
        genesis.validate()?;

        let keeper = Keeper::new(StoreBank);
        let state = ChainState {
            chain_id: genesis.chain_id.clone(),
            last: BlockHeader {
                height: 0,
                time: genesis.genesis_time,
                last_commit_hash: genesis_hash(&genesis.chain_id, &genesis.genesis_time),
            },
        };

        let mut cache = StoreCache::new(&store);
        for account in &genesis.accounts {
            StoreBank.mint_to_account(&mut cache, &account.address, &account.coins)?;
        }
        // the collector must back the genesis draw prize
        let held = StoreBank.module_balance(&cache, PRIZE_COLLECTOR_NAME)?;
        let mut missing = Coins::new();
        for coin in genesis.wta.draw.prize.iter() {
            let short = coin.amount.saturating_sub(held.amount_of(&coin.denom));
            missing.checked_add_coin(&Coin::new(coin.denom, short))?;
        }
        StoreBank.mint_coins(&mut cache, PRIZE_COLLECTOR_NAME, &missing)?;

        let mut ctx = Context::new(&mut cache, state.last.clone());
        keeper.init_genesis(&mut ctx, &genesis.wta)?;
        keeper.assert_invariants(&cache)?;
        cache.set(CHAIN_STATE_KEY, encode(&state)?)?;

        let writes = cache.into_writes();
        store.write_batch(writes)?;
        info!(
            "initialized chain {} at {} with {} accounts",
            genesis.chain_id,
            genesis.genesis_time,
            genesis.accounts.len()
        );

        Ok(Self {
            store,
            keeper,
            state,
            block: None,
        })
    }

    /// Reopen a store written by [`Chain::init`]
    pub fn load(store: S) -> Result<Self> {
        let state: ChainState = match store.get(CHAIN_STATE_KEY)? {
            Some(bytes) => decode(&bytes)?,
            None => return Err(Error::Corrupted("chain not initialized".into())),
        };
        Ok(Self {
            store,
            keeper: Keeper::new(StoreBank),
            state,
            block: None,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn keeper(&self) -> &Keeper<StoreBank> {
        &self.keeper
    }

    pub fn chain_id(&self) -> &str {
        &self.state.chain_id
    }

    /// Header of the last committed block (height 0 is genesis)
    pub fn last_block(&self) -> &BlockHeader {
        &self.state.last
    }

    /// Committed state with the open block's writes on top
    fn pending(&self) -> StoreCache<'_> {
        let writes = match &self.block {
            Some(block) => block.writes.clone(),
            None => Vec::new(),
        };
        StoreCache::with_writes(&self.store, writes)
    }

    /// Balance as seen by the next transaction of the open block
    pub fn balance(&self, account: &Address, denom: &str) -> Result<u128> {
        StoreBank.balance(&self.pending(), account, denom)
    }

    /// Sequence the next transaction from `account` must carry
    pub fn sequence(&self, account: &Address) -> Result<u64> {
        read_sequence(&self.pending(), account)
    }

    /// Encode a purchase from `buyer` with its next sequence
    pub fn build_buy_tickets_tx(&self, quantity: u32, buyer: &Address) -> Result<Vec<u8>> {
        Tx {
            msg: MsgBuyTickets::new(quantity, buyer.to_string()),
            sequence: self.sequence(buyer)?,
        }
        .to_bytes()
    }

    /// Open the next block at `time` and run the draw scheduler.
    ///
    /// A scheduler error aborts the block; nothing is buffered.
    pub fn begin_block(
        &mut self,
        time: DateTime<Utc>,
    ) -> Result<(Option<HistoricalDrawData>, Vec<Event>)> {
        if self.block.is_some() {
            return Err(Error::InvalidRequest("block already open".into()));
        }
        if time < self.state.last.time {
            return Err(Error::InvalidRequest(format!(
                "block time {} before last block time {}",
                time, self.state.last.time
            )));
        }
        let header = BlockHeader {
            height: self.state.last.height + 1,
            time,
            last_commit_hash: self.state.last.last_commit_hash,
        };

        let mut cache = StoreCache::new(&self.store);
        let mut ctx = Context::new(&mut cache, header.clone());
        let closed = scheduler::begin_blocker(&mut ctx, &self.keeper)?;
        let events = ctx.into_events();
        let writes = cache.into_writes();

        debug!("began block {} at {}", header.height, header.time);
        self.block = Some(OpenBlock {
            header,
            txs: Vec::new(),
            writes,
        });
        Ok((closed, events))
    }

    /// Deliver one transaction in the open block.
    ///
    /// Non-fatal failures are returned as `Ok(TxOutcome::Failed)` with
    /// nothing applied. A fatal error aborts the whole block: its buffered
    /// writes are dropped and the next `begin_block` starts over.
    pub fn deliver_tx(&mut self, tx_bytes: &[u8]) -> Result<TxOutcome> {
        let mut block = self
            .block
            .take()
            .ok_or_else(|| Error::InvalidRequest("no open block".into()))?;
        block.txs.push(tx_bytes.to_vec());

        let mut branch = StoreCache::with_writes(&self.store, std::mem::take(&mut block.writes));
        let outcome = match execute_tx(&mut branch, &self.keeper, block.header.clone(), tx_bytes) {
            Ok(result) => TxOutcome::Ok(result),
            Err(e) if e.is_fatal() => {
                warn!("block {} aborted: {}", block.header.height, e);
                return Err(e);
            }
            Err(e) => {
                warn!("tx failed: {}", e);
                TxOutcome::Failed(e.to_string())
            }
        };
        block.writes = branch.into_writes();
        self.block = Some(block);
        Ok(outcome)
    }

    /// Write the open block to the store and derive the entropy for the
    /// next one. On a store error the block is dropped and the chain stays
    /// at the previous height.
    pub fn commit(&mut self) -> Result<Hash> {
        let block = self
            .block
            .take()
            .ok_or_else(|| Error::InvalidRequest("no open block".into()))?;
        let hash = commit_hash(&block.header, &block.txs);
        let state = ChainState {
            chain_id: self.state.chain_id.clone(),
            last: BlockHeader {
                height: block.header.height,
                time: block.header.time,
                last_commit_hash: hash,
            },
        };

        let mut branch = StoreCache::with_writes(&self.store, block.writes);
        branch.set(CHAIN_STATE_KEY, encode(&state)?)?;
        let writes = branch.into_writes();
        self.store.write_batch(writes)?;
        self.state = state;
        debug!(
            "committed block {} with {} txs: {}",
            block.header.height,
            block.txs.len(),
            hex::encode(hash)
        );
        Ok(hash)
    }

    /// Begin, deliver every transaction, and commit
    pub fn produce_block(&mut self, time: DateTime<Utc>, txs: &[Vec<u8>]) -> Result<BlockResult> {
        let (closed_draw, begin_events) = self.begin_block(time)?;
        let height = self.state.last.height + 1;
        let mut outcomes = Vec::with_capacity(txs.len());
        for tx in txs {
            outcomes.push(self.deliver_tx(tx)?);
        }
        let commit_hash = self.commit()?;
        Ok(BlockResult {
            height,
            time,
            closed_draw,
            begin_events,
            txs: outcomes,
            commit_hash,
        })
    }

    /// Current state as a genesis document, re-loadable with [`Chain::init`]
    pub fn export_genesis(&self) -> Result<AppGenesis> {
        let accounts = StoreBank
            .accounts(&self.store)?
            .into_iter()
            .map(|(address, coins)| GenesisAccount { address, coins })
            .collect();
        Ok(AppGenesis {
            chain_id: self.state.chain_id.clone(),
            genesis_time: self.state.last.time,
            accounts,
            wta: self.keeper.export_genesis(&self.store)?,
        })
    }
}

/// Run one transaction against `branch`. On error the caller drops whatever
/// the nested branch buffered.
fn execute_tx(
    branch: &mut StoreCache<'_>,
    keeper: &Keeper<StoreBank>,
    header: BlockHeader,
    tx_bytes: &[u8],
) -> Result<TxResult> {
    let tx = Tx::from_bytes(tx_bytes)?;
    tx.msg.validate_basic()?;
    let sender = tx.msg.buyer_address()?;

    let mut cache = StoreCache::new(&*branch);
    let expected = read_sequence(&cache, &sender)?;
    if tx.sequence != expected {
        return Err(Error::InvalidRequest(format!(
            "account sequence mismatch, expected {}, got {}",
            expected, tx.sequence
        )));
    }

    let mut ctx = Context::new(&mut cache, header).with_tx_bytes(tx_bytes.to_vec());
    let tickets = handler::buy_tickets(&mut ctx, keeper, &tx.msg)?;
    let events = ctx.into_events();
    cache.set(&sequence_key(&sender), (expected + 1).to_be_bytes().to_vec())?;

    let writes = cache.into_writes();
    branch.write_batch(writes)?;
    Ok(TxResult { tickets, events })
}

fn read_sequence(store: &dyn KvStore, account: &Address) -> Result<u64> {
    match store.get(&sequence_key(account))? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| Error::Corrupted(format!("sequence of {} bytes", bytes.len())))?;
            Ok(u64::from_be_bytes(arr))
        }
        None => Ok(0),
    }
}
