//! module names and store key layout

use crate::types::{format_time, Address};
use chrono::{DateTime, Utc};

pub const MODULE_NAME: &str = "wta";

/// Module account accumulating prize shares until payout
pub const PRIZE_COLLECTOR_NAME: &str = "wta_prize_collector";

/// Module account that receives and destroys burn shares
pub const PRIZE_BURNER_NAME: &str = "wta_prize_burner";

/// Module account receiving fee shares when configured as fee collector
pub const FEE_COLLECTOR_NAME: &str = "fee_collector";

/// Module account holding the community pool
pub const COMMUNITY_POOL_NAME: &str = "distribution";

pub const CURRENT_DRAW_KEY: &[u8] = b"wta/draw";
pub const PARAMS_KEY: &[u8] = b"wta/params";
pub const TICKETS_PREFIX: &[u8] = b"wta/tickets/";
pub const PARTICIPANTS_PREFIX: &[u8] = b"wta/participants/";
pub const HISTORICAL_DRAWS_PREFIX: &[u8] = b"wta/history/";

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

/// `wta/tickets/<id>`
pub fn ticket_key(id: &str) -> Vec<u8> {
    prefixed(TICKETS_PREFIX, id.as_bytes())
}

/// `wta/participants/<address bytes>`
pub fn participant_key(owner: &Address) -> Vec<u8> {
    prefixed(PARTICIPANTS_PREFIX, owner.as_bytes())
}

/// `wta/history/<end time>`, ordered by end time
pub fn historical_draw_key(end_time: &DateTime<Utc>) -> Vec<u8> {
    prefixed(HISTORICAL_DRAWS_PREFIX, format_time(end_time).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_historical_keys_sort_by_time() {
        let a = historical_draw_key(&Utc.with_ymd_and_hms(2020, 1, 9, 0, 0, 0).unwrap());
        let b = historical_draw_key(&Utc.with_ymd_and_hms(2020, 1, 10, 0, 0, 0).unwrap());
        assert!(a < b);
        assert!(a.starts_with(HISTORICAL_DRAWS_PREFIX));
    }

    #[test]
    fn test_ticket_key() {
        assert_eq!(ticket_key("ab"), b"wta/tickets/ab".to_vec());
    }
}
