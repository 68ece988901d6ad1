//! module genesis state

use crate::error::{Error, Result};
use crate::types::{duplicated_ticket_ids, Coins, Draw, HistoricalDrawData, Params, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Module genesis. Tickets are listed ascending by id and historical draws
/// ascending by end time, the order `export_genesis` produces; `validate`
/// rejects any other order so that import then export is the identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub draw: Draw,
    pub tickets: Vec<Ticket>,
    pub historical_draws: Vec<HistoricalDrawData>,
    pub params: Params,
}

impl GenesisState {
    pub fn new(
        draw: Draw,
        tickets: Vec<Ticket>,
        historical_draws: Vec<HistoricalDrawData>,
        params: Params,
    ) -> Self {
        Self {
            draw,
            tickets,
            historical_draws,
            params,
        }
    }

    /// Empty genesis whose first draw closes one default duration after `genesis_time`
    pub fn default_at(genesis_time: DateTime<Utc>) -> Self {
        let params = Params::default();
        let end_time = genesis_time + chrono::Duration::seconds(params.draw.duration.as_secs() as i64);
        Self::new(Draw::new(Coins::new(), end_time), vec![], vec![], params)
    }

    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        self.draw.validate()?;

        for ticket in &self.tickets {
            ticket.validate(self.draw.end_time)?;
        }
        if let Some(id) = duplicated_ticket_ids(&self.tickets).into_iter().next() {
            return Err(Error::DuplicateTicketId(id));
        }
        if let Some(pair) = self.tickets.windows(2).find(|w| w[0].id > w[1].id) {
            return Err(Error::InvalidGenesis(format!(
                "tickets out of order: {} listed before {}",
                pair[0].id, pair[1].id
            )));
        }

        let owners: HashSet<_> = self.tickets.iter().map(|t| t.owner).collect();
        if self.draw.tickets_sold as usize != self.tickets.len()
            || self.draw.participants as usize != owners.len()
        {
            return Err(Error::InvalidGenesis(format!(
                "draw counts ({} participants, {} tickets) do not match the {} tickets of {} owners",
                self.draw.participants,
                self.draw.tickets_sold,
                self.tickets.len(),
                owners.len()
            )));
        }

        let mut end_times = HashSet::with_capacity(self.historical_draws.len());
        for data in &self.historical_draws {
            data.validate()?;
            if !end_times.insert(data.draw.end_time) {
                return Err(Error::InvalidGenesis(format!(
                    "historical draws share end time {}",
                    crate::types::format_time(&data.draw.end_time)
                )));
            }
        }
        if let Some(pair) = self
            .historical_draws
            .windows(2)
            .find(|w| w[0].draw.end_time > w[1].draw.end_time)
        {
            return Err(Error::InvalidGenesis(format!(
                "historical draws out of order: {} listed before {}",
                crate::types::format_time(&pair[0].draw.end_time),
                crate::types::format_time(&pair[1].draw.end_time)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap()
    }

    fn genesis_with(tickets: Vec<Ticket>, participants: u32) -> GenesisState {
        let count = tickets.len() as u32;
        GenesisState::new(
            Draw::new(Coins::new(), at(10)).with_counts(participants, count),
            tickets,
            vec![],
            Params::default(),
        )
    }

    #[test]
    fn test_default_genesis_valid() {
        assert!(GenesisState::default_at(at(1)).validate().is_ok());
    }

    #[test]
    fn test_duplicate_ticket_rejected() {
        let owner = Address::new([1; 20]);
        let genesis = genesis_with(
            vec![Ticket::new("1", at(1), owner), Ticket::new("1", at(2), owner)],
            1,
        );
        assert_eq!(genesis.validate(), Err(Error::DuplicateTicketId("1".into())));
    }

    #[test]
    fn test_unsorted_tickets_rejected() {
        let owner = Address::new([1; 20]);
        let genesis = genesis_with(
            vec![Ticket::new("bb", at(1), owner), Ticket::new("aa", at(1), owner)],
            1,
        );
        assert!(matches!(genesis.validate(), Err(Error::InvalidGenesis(_))));
    }

    #[test]
    fn test_unsorted_history_rejected() {
        let mut genesis = genesis_with(vec![], 0);
        genesis.historical_draws = vec![
            HistoricalDrawData::new(Draw::new(Coins::new(), at(3)), None),
            HistoricalDrawData::new(Draw::new(Coins::new(), at(2)), None),
        ];
        assert!(matches!(genesis.validate(), Err(Error::InvalidGenesis(_))));

        genesis.historical_draws.reverse();
        assert!(genesis.validate().is_ok());
    }

    #[test]
    fn test_counts_must_match_tickets() {
        let genesis = genesis_with(vec![Ticket::new("1", at(1), Address::new([1; 20]))], 0);
        assert!(matches!(genesis.validate(), Err(Error::InvalidGenesis(_))));
    }

    #[test]
    fn test_ticket_after_end_time_rejected() {
        let genesis = genesis_with(vec![Ticket::new("1", at(11), Address::new([1; 20]))], 1);
        assert!(matches!(genesis.validate(), Err(Error::InvalidTicket(_))));
    }
}
