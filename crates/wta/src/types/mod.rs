//! core types for the wta module

pub mod address;
pub mod coin;
pub mod events;
pub mod genesis;
pub mod keys;
pub mod models;
pub mod msgs;
pub mod params;

pub use address::{Address, ADDRESS_LEN};
pub use coin::{tokens_from_power, validate_denom, Coin, Coins, DEFAULT_DENOM};
pub use events::Event;
pub use genesis::GenesisState;
pub use models::{
    duplicated_ticket_ids, format_time, Draw, HistoricalDrawData, Ticket, TICKET_ID_BYTES,
};
pub use msgs::{MsgBuyTickets, TYPE_MSG_BUY_TICKETS};
pub use params::{
    DistributionParams, DrawParams, FeeDestination, Params, Percentage, TicketParams,
    DEFAULT_DRAW_DURATION, MIN_DRAW_DURATION,
};

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Encode a value for the store
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Decode a stored value; failures mean the store is corrupted
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Corrupted(e.to_string()))
}
