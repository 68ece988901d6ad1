//! notifications emitted while executing module logic

use serde::{Deserialize, Serialize};

pub const EVENT_TYPE_BUY_TICKET: &str = "buy_ticket";
pub const EVENT_TYPE_PRIZE_INCREASE: &str = "prize_increase";
pub const EVENT_TYPE_WINNER_DRAWN: &str = "winner_drawn";
pub const EVENT_TYPE_NEW_DRAW: &str = "new_draw";
pub const EVENT_TYPE_MESSAGE: &str = "message";

pub const ATTRIBUTE_KEY_TICKET_ID: &str = "ticket_id";
pub const ATTRIBUTE_KEY_TICKET_BUYER: &str = "ticket_buyer";
pub const ATTRIBUTE_KEY_TICKET_TIMESTAMP: &str = "ticket_timestamp";
pub const ATTRIBUTE_KEY_PRIZE_AMOUNT: &str = "prize_amount";
pub const ATTRIBUTE_KEY_WINNER_ADDRESS: &str = "winner_address";
pub const ATTRIBUTE_KEY_WON_AMOUNT: &str = "won_amount";
pub const ATTRIBUTE_KEY_DRAW_CLOSING: &str = "draw_closing";
pub const ATTRIBUTE_KEY_MODULE: &str = "module";
pub const ATTRIBUTE_KEY_ACTION: &str = "action";
pub const ATTRIBUTE_KEY_SENDER: &str = "sender";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
