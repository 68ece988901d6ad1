//! balance ledger the module calls into
//!
//! [`Bank`] is the adapter surface the module needs. [`StoreBank`] keeps
//! balances and total supply in the same [`KvStore`] as module state, so a
//! host that branches the store for a transaction rolls back transfers and
//! module writes together.

use crate::error::{Error, Result};
use crate::store::{KvStore, Order};
use crate::types::keys::COMMUNITY_POOL_NAME;
use crate::types::{Address, Coin, Coins, ADDRESS_LEN};
use tracing::debug;

pub const BALANCES_PREFIX: &[u8] = b"bank/balances/";
pub const SUPPLY_PREFIX: &[u8] = b"bank/supply/";

pub trait Bank {
    fn balance(&self, store: &dyn KvStore, account: &Address, denom: &str) -> Result<u128>;

    fn all_balances(&self, store: &dyn KvStore, account: &Address) -> Result<Coins>;

    fn supply(&self, store: &dyn KvStore, denom: &str) -> Result<u128>;

    fn send_coins(
        &self,
        store: &mut dyn KvStore,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> Result<()>;

    /// Create `amount` in the given module account, growing supply
    fn mint_coins(&self, store: &mut dyn KvStore, module: &str, amount: &Coins) -> Result<()>;

    /// Destroy `amount` held by the given module account, shrinking supply
    fn burn_coins(&self, store: &mut dyn KvStore, module: &str, amount: &Coins) -> Result<()>;

    fn send_coins_from_account_to_module(
        &self,
        store: &mut dyn KvStore,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<()> {
        self.send_coins(store, from, &Address::module(module), amount)
    }

    fn send_coins_from_module_to_account(
        &self,
        store: &mut dyn KvStore,
        module: &str,
        to: &Address,
        amount: &Coins,
    ) -> Result<()> {
        self.send_coins(store, &Address::module(module), to, amount)
    }

    fn fund_community_pool(
        &self,
        store: &mut dyn KvStore,
        amount: &Coins,
        payer: &Address,
    ) -> Result<()> {
        self.send_coins_from_account_to_module(store, payer, COMMUNITY_POOL_NAME, amount)
    }

    fn module_balance(&self, store: &dyn KvStore, module: &str) -> Result<Coins> {
        self.all_balances(store, &Address::module(module))
    }
}

/// [`Bank`] backed by the shared module store
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreBank;

fn balance_prefix(account: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(BALANCES_PREFIX.len() + ADDRESS_LEN);
    key.extend_from_slice(BALANCES_PREFIX);
    key.extend_from_slice(account.as_bytes());
    key
}

fn balance_key(account: &Address, denom: &str) -> Vec<u8> {
    let mut key = balance_prefix(account);
    key.extend_from_slice(denom.as_bytes());
    key
}

fn supply_key(denom: &str) -> Vec<u8> {
    let mut key = SUPPLY_PREFIX.to_vec();
    key.extend_from_slice(denom.as_bytes());
    key
}

fn read_amount(store: &dyn KvStore, key: &[u8]) -> Result<u128> {
    match store.get(key)? {
        Some(bytes) => decode_amount(&bytes),
        None => Ok(0),
    }
}

pub(crate) fn decode_amount(bytes: &[u8]) -> Result<u128> {
    let arr: [u8; 16] = bytes
        .try_into()
        .map_err(|_| Error::Corrupted(format!("amount of {} bytes", bytes.len())))?;
    Ok(u128::from_be_bytes(arr))
}

fn write_amount(store: &mut dyn KvStore, key: &[u8], amount: u128) -> Result<()> {
    if amount == 0 {
        store.delete(key)
    } else {
        store.set(key, amount.to_be_bytes().to_vec())
    }
}

impl StoreBank {
    fn sub_balance(&self, store: &mut dyn KvStore, account: &Address, coin: &Coin) -> Result<()> {
        let key = balance_key(account, &coin.denom);
        let have = read_amount(store, &key)?;
        let left = have.checked_sub(coin.amount).ok_or_else(|| {
            Error::InsufficientFunds(format!(
                "{} has {}{}, needs {}",
                account, have, coin.denom, coin
            ))
        })?;
        write_amount(store, &key, left)
    }

    fn add_balance(&self, store: &mut dyn KvStore, account: &Address, coin: &Coin) -> Result<()> {
        let key = balance_key(account, &coin.denom);
        let have = read_amount(store, &key)?;
        let total = have
            .checked_add(coin.amount)
            .ok_or_else(|| Error::Overflow(format!("balance of {}", account)))?;
        write_amount(store, &key, total)
    }

    /// Credit an account with newly created coins (genesis allocation)
    pub fn mint_to_account(
        &self,
        store: &mut dyn KvStore,
        account: &Address,
        amount: &Coins,
    ) -> Result<()> {
        for coin in amount.iter() {
            let key = supply_key(&coin.denom);
            let supply = read_amount(store, &key)?
                .checked_add(coin.amount)
                .ok_or_else(|| Error::Overflow(format!("supply of {}", coin.denom)))?;
            write_amount(store, &key, supply)?;
            self.add_balance(store, account, &coin)?;
        }
        Ok(())
    }

    /// Every account holding a non-zero balance, ordered by address
    pub fn accounts(&self, store: &dyn KvStore) -> Result<Vec<(Address, Coins)>> {
        let mut accounts: Vec<(Address, Coins)> = Vec::new();
        for item in store.prefix_iter(BALANCES_PREFIX, Order::Ascending) {
            let (key, value) = item?;
            let rest = &key[BALANCES_PREFIX.len()..];
            if rest.len() <= ADDRESS_LEN {
                return Err(Error::Corrupted(format!("balance key of {} bytes", key.len())));
            }
            let address = Address::from_slice(&rest[..ADDRESS_LEN])?;
            let denom = String::from_utf8(rest[ADDRESS_LEN..].to_vec())
                .map_err(|e| Error::Corrupted(format!("balance denom: {}", e)))?;
            let coin = Coin::new(denom, decode_amount(&value)?);

            match accounts.last_mut() {
                Some((last, coins)) if *last == address => coins.checked_add_coin(&coin)?,
                _ => accounts.push((address, Coins::from(coin))),
            }
        }
        Ok(accounts)
    }
}

impl Bank for StoreBank {
    fn balance(&self, store: &dyn KvStore, account: &Address, denom: &str) -> Result<u128> {
        read_amount(store, &balance_key(account, denom))
    }

    fn all_balances(&self, store: &dyn KvStore, account: &Address) -> Result<Coins> {
        let prefix = balance_prefix(account);
        let mut coins = Coins::new();
        for item in store.prefix_iter(&prefix, Order::Ascending) {
            let (key, value) = item?;
            let denom = String::from_utf8(key[prefix.len()..].to_vec())
                .map_err(|e| Error::Corrupted(format!("balance denom: {}", e)))?;
            coins.checked_add_coin(&Coin::new(denom, decode_amount(&value)?))?;
        }
        Ok(coins)
    }

    fn supply(&self, store: &dyn KvStore, denom: &str) -> Result<u128> {
        read_amount(store, &supply_key(denom))
    }

    fn send_coins(
        &self,
        store: &mut dyn KvStore,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> Result<()> {
        for coin in amount.iter() {
            self.sub_balance(store, from, &coin)?;
            self.add_balance(store, to, &coin)?;
        }
        debug!("sent {} from {} to {}", amount, from, to);
        Ok(())
    }

    fn mint_coins(&self, store: &mut dyn KvStore, module: &str, amount: &Coins) -> Result<()> {
        self.mint_to_account(store, &Address::module(module), amount)
    }

    fn burn_coins(&self, store: &mut dyn KvStore, module: &str, amount: &Coins) -> Result<()> {
        let account = Address::module(module);
        for coin in amount.iter() {
            self.sub_balance(store, &account, &coin)?;
            let key = supply_key(&coin.denom);
            let supply = read_amount(store, &key)?
                .checked_sub(coin.amount)
                .ok_or_else(|| Error::Corrupted(format!("supply of {} below zero", coin.denom)))?;
            write_amount(store, &key, supply)?;
        }
        debug!("burned {} from {}", amount, module);
        Ok(())
    }
}
