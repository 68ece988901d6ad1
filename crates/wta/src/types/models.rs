//! tickets, draws and the historical draw archive

use crate::error::{Error, Result};
use crate::types::{Address, Coins};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ticket id length in bytes before hex encoding
pub const TICKET_ID_BYTES: usize = 16;

/// A single lottery entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub owner: Address,
    pub timestamp: DateTime<Utc>,
}

impl Ticket {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, owner: Address) -> Self {
        Self {
            id: id.into(),
            owner,
            timestamp,
        }
    }

    /// Checks the ticket against the latest instant it may have been bought at
    /// (the end time of the draw it belongs to).
    pub fn validate(&self, latest: DateTime<Utc>) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidTicket("empty ticket id".into()));
        }
        if self.timestamp > latest {
            return Err(Error::InvalidTicket(format!(
                "ticket {} creation time {} is after {}",
                self.id,
                format_time(&self.timestamp),
                format_time(&latest)
            )));
        }
        Ok(())
    }
}

/// Ids that appear more than once in `tickets`, each reported once, in
/// first-seen order.
pub fn duplicated_ticket_ids(tickets: &[Ticket]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(tickets.len());
    let mut reported = HashSet::new();
    let mut duplicated = Vec::new();
    for ticket in tickets {
        if !seen.insert(ticket.id.as_str()) && reported.insert(ticket.id.as_str()) {
            duplicated.push(ticket.id.clone());
        }
    }
    duplicated
}

// ============================================================================
// Draw
// ============================================================================

/// The live lottery round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub participants: u32,
    pub tickets_sold: u32,
    pub prize: Coins,
    pub end_time: DateTime<Utc>,
}

impl Draw {
    /// Fresh draw with no tickets sold
    pub fn new(prize: Coins, end_time: DateTime<Utc>) -> Self {
        Self {
            participants: 0,
            tickets_sold: 0,
            prize,
            end_time,
        }
    }

    pub fn with_counts(mut self, participants: u32, tickets_sold: u32) -> Self {
        self.participants = participants;
        self.tickets_sold = tickets_sold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_time.timestamp() <= 0 {
            return Err(Error::InvalidDraw("invalid draw end time".into()));
        }
        if self.tickets_sold < self.participants {
            return Err(Error::InvalidDraw(format!(
                "tickets sold ({}) lower than participants ({})",
                self.tickets_sold, self.participants
            )));
        }
        for coin in self.prize.iter() {
            coin.validate()?;
        }
        Ok(())
    }

    /// Has this draw's closing time been reached at `now`
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }
}

/// Archived outcome of a closed draw
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDrawData {
    pub draw: Draw,
    pub winning_ticket: Option<Ticket>,
}

impl HistoricalDrawData {
    pub fn new(draw: Draw, winning_ticket: Option<Ticket>) -> Self {
        Self {
            draw,
            winning_ticket,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.draw.validate()?;
        if let Some(ticket) = &self.winning_ticket {
            ticket.validate(self.draw.end_time)?;
        }
        Ok(())
    }
}

/// Fixed-width RFC 3339 with nanoseconds, lexicographically ordered
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
