//! wta - winner-take-all lottery ledger
//!
//! Accounts buy tickets for the live draw. Each purchase is split between a
//! prize pool, a fee destination and a burn. When a block's time passes the
//! draw's end time, one ticket is drawn with randomness every replica derives
//! from consensus data, the winner takes the pool, the draw is archived, and
//! a new one opens.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     HOST (chain / casinod)                   │
//! │   begin_block ──► scheduler        deliver_tx ──► handler    │
//! ├──────────────────────────────────────────────────────────────┤
//! │                          KEEPER                              │
//! │  tickets │ draw ledger │ distribution │ params │ genesis     │
//! │  query   │ invariants                                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │   random (seed from last commit hash + tx bytes)             │
//! ├──────────────────────────────────────────────────────────────┤
//! │   bank (balances, supply)  +  module state  in one KvStore   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every state change runs against a [`store::StoreCache`] branch; the host
//! commits the branch only when the step succeeds.

pub mod bank;
pub mod chain;
pub mod context;
pub mod error;
pub mod handler;
pub mod keeper;
pub mod random;
pub mod scheduler;
pub mod simulation;
pub mod store;
pub mod types;

pub use bank::{Bank, StoreBank};
pub use chain::{AppGenesis, BlockResult, Chain, GenesisAccount, Tx, TxOutcome, TxResult};
pub use context::{BlockHeader, Context, Hash};
pub use error::{Error, Result};
pub use keeper::Keeper;
pub use random::{derive_seed, DrawRng};
pub use store::{KvStore, MemStore, Order, StoreCache};
pub use types::{
    Address, Coin, Coins, Draw, GenesisState, HistoricalDrawData, MsgBuyTickets, Params, Ticket,
};
