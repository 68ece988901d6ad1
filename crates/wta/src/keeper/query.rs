//! read-only query surface with offset/key pagination

use super::Keeper;
use crate::bank::Bank;
use crate::error::{Error, Result};
use crate::store::{KvStore, Order};
use crate::types::keys::{HISTORICAL_DRAWS_PREFIX, TICKETS_PREFIX};
use crate::types::{decode, Draw, HistoricalDrawData, Params, Ticket};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Page size used when a request leaves `limit` at zero
pub const DEFAULT_LIMIT: u64 = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Resume from this key (relative to the collection prefix), as returned
    /// in a previous [`PageResponse::next_key`]. Exclusive with `offset`.
    pub key: Option<Vec<u8>>,
    pub offset: u64,
    pub limit: u64,
    /// Count every entry of the collection. Offset pages only: a request
    /// that also sets `key` is rejected.
    pub count_total: bool,
    pub reverse: bool,
}

impl PageRequest {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    pub next_key: Option<Vec<u8>>,
    pub total: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCurrentDrawRequest {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCurrentDrawResponse {
    pub draw: Draw,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTicketsRequest {
    pub pagination: Option<PageRequest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub pagination: PageResponse,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistoricalDrawsRequest {
    pub pagination: Option<PageRequest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistoricalDrawsResponse {
    pub draws: Vec<HistoricalDrawData>,
    pub pagination: PageResponse,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParamsRequest {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParamsResponse {
    pub params: Params,
}

fn require<T>(req: Option<&T>) -> Result<&T> {
    req.ok_or_else(|| Error::InvalidRequest("empty request".into()))
}

/// Decode one page of the collection under `prefix`
pub fn paginate<T: DeserializeOwned>(
    store: &dyn KvStore,
    prefix: &[u8],
    page: Option<&PageRequest>,
) -> Result<(Vec<T>, PageResponse)> {
    let default = PageRequest::default();
    let page = page.unwrap_or(&default);
    if page.key.is_some() && page.offset > 0 {
        return Err(Error::InvalidRequest(
            "either offset or key is expected, got both".into(),
        ));
    }
    if page.key.is_some() && page.count_total {
        return Err(Error::InvalidRequest(
            "count_total is only supported with offset pagination".into(),
        ));
    }

    let limit = if page.limit == 0 { DEFAULT_LIMIT } else { page.limit };
    let order = if page.reverse {
        Order::Descending
    } else {
        Order::Ascending
    };
    let count_total = page.count_total;

    let mut items = Vec::new();
    let mut next_key = None;
    let mut skipped = 0u64;
    let mut seen = 0u64;
    for item in store.prefix_iter(prefix, order) {
        let (key, value) = item?;
        let relative = &key[prefix.len()..];

        if let Some(start) = &page.key {
            let before_start = match order {
                Order::Ascending => relative < start.as_slice(),
                Order::Descending => relative > start.as_slice(),
            };
            if before_start {
                continue;
            }
        } else if skipped < page.offset {
            skipped += 1;
            seen += 1;
            continue;
        }

        seen += 1;
        if (items.len() as u64) < limit {
            items.push(decode(&value)?);
        } else {
            if next_key.is_none() {
                next_key = Some(relative.to_vec());
            }
            if !count_total {
                break;
            }
        }
    }

    let total = count_total.then_some(seen);
    Ok((items, PageResponse { next_key, total }))
}

impl<B: Bank> Keeper<B> {
    pub fn query_current_draw(
        &self,
        store: &dyn KvStore,
        req: Option<&QueryCurrentDrawRequest>,
    ) -> Result<QueryCurrentDrawResponse> {
        require(req)?;
        Ok(QueryCurrentDrawResponse {
            draw: self.get_current_draw(store)?,
        })
    }

    pub fn query_tickets(
        &self,
        store: &dyn KvStore,
        req: Option<&QueryTicketsRequest>,
    ) -> Result<QueryTicketsResponse> {
        let req = require(req)?;
        let (tickets, pagination) = paginate(store, TICKETS_PREFIX, req.pagination.as_ref())?;
        Ok(QueryTicketsResponse {
            tickets,
            pagination,
        })
    }

    pub fn query_historical_draws(
        &self,
        store: &dyn KvStore,
        req: Option<&QueryHistoricalDrawsRequest>,
    ) -> Result<QueryHistoricalDrawsResponse> {
        let req = require(req)?;
        let (draws, pagination) =
            paginate(store, HISTORICAL_DRAWS_PREFIX, req.pagination.as_ref())?;
        Ok(QueryHistoricalDrawsResponse { draws, pagination })
    }

    pub fn query_params(
        &self,
        store: &dyn KvStore,
        req: Option<&QueryParamsRequest>,
    ) -> Result<QueryParamsResponse> {
        require(req)?;
        Ok(QueryParamsResponse {
            params: self.get_params(store)?,
        })
    }
}
