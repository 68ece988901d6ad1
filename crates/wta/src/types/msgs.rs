//! transaction messages

use crate::error::{Error, Result};
use crate::types::Address;
use serde::{Deserialize, Serialize};

pub const TYPE_MSG_BUY_TICKETS: &str = "buy_tickets";

/// Buy `quantity` tickets for the current draw as `buyer`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBuyTickets {
    pub quantity: u32,
    pub buyer: String,
}

impl MsgBuyTickets {
    pub fn new(quantity: u32, buyer: impl Into<String>) -> Self {
        Self {
            quantity,
            buyer: buyer.into(),
        }
    }

    /// Stateless checks, run before submission and again on delivery
    pub fn validate_basic(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(Error::InvalidQuantity(self.quantity as u64));
        }
        self.buyer_address()
            .map_err(|_| Error::InvalidAddress("invalid buyer address".into()))?;
        Ok(())
    }

    pub fn buyer_address(&self) -> Result<Address> {
        self.buyer.parse()
    }
}
