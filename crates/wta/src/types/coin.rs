//! single- and multi-denomination token amounts

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default staking denomination
pub const DEFAULT_DENOM: &str = "stake";

/// Base units per whole token
pub const POWER_REDUCTION: u128 = 1_000_000;

/// Convert a number of whole tokens into base units
pub fn tokens_from_power(power: u64) -> u128 {
    power as u128 * POWER_REDUCTION
}

/// Denoms are 3-128 chars, start with a letter, then `[a-zA-Z0-9/:._-]`
pub fn validate_denom(denom: &str) -> Result<()> {
    let len = denom.len();
    if !(3..=128).contains(&len) {
        return Err(Error::InvalidCoin(format!("invalid denom length: {}", denom)));
    }
    let mut chars = denom.chars();
    if !chars.next().map_or(false, |c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidCoin(format!("invalid denom: {}", denom)));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-')) {
        return Err(Error::InvalidCoin(format!("invalid denom: {}", denom)));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self { denom: denom.into(), amount }
    }

    pub fn validate(&self) -> Result<()> {
        validate_denom(&self.denom)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// `self * n`, same denom
    pub fn checked_mul(&self, n: u64) -> Result<Coin> {
        let amount = self
            .amount
            .checked_mul(n as u128)
            .ok_or_else(|| Error::Overflow(format!("{} * {}", self, n)))?;
        Ok(Coin::new(self.denom.clone(), amount))
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Sorted set of coins, at most one entry per denom, never holding zero amounts
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, rejecting invalid and duplicated denoms
    pub fn from_coins(coins: Vec<Coin>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for coin in coins {
            coin.validate()?;
            if map.contains_key(&coin.denom) {
                return Err(Error::InvalidCoin(format!("duplicate denom: {}", coin.denom)));
            }
            if coin.amount > 0 {
                map.insert(coin.denom, coin.amount);
            }
        }
        Ok(Self(map))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0.iter().map(|(d, a)| Coin::new(d.clone(), *a))
    }

    pub fn checked_add_coin(&mut self, coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Ok(());
        }
        let entry = self.0.entry(coin.denom.clone()).or_insert(0);
        *entry = entry
            .checked_add(coin.amount)
            .ok_or_else(|| Error::Overflow(format!("adding {}", coin)))?;
        Ok(())
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins> {
        let mut out = self.clone();
        for coin in other.iter() {
            out.checked_add_coin(&coin)?;
        }
        Ok(out)
    }

    /// `self - other`, failing if any denom would go negative
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins> {
        let mut out = self.clone();
        for coin in other.iter() {
            let have = out.amount_of(&coin.denom);
            let left = have.checked_sub(coin.amount).ok_or_else(|| {
                Error::InsufficientFunds(format!(
                    "{}{} is smaller than {}",
                    have, coin.denom, coin
                ))
            })?;
            if left == 0 {
                out.0.remove(&coin.denom);
            } else {
                out.0.insert(coin.denom.clone(), left);
            }
        }
        Ok(out)
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        let mut coins = Coins::new();
        if !coin.is_zero() {
            coins.0.insert(coin.denom, coin.amount);
        }
        coins
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = Error;

    fn try_from(coins: Vec<Coin>) -> Result<Self> {
        Coins::from_coins(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.iter().collect()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
