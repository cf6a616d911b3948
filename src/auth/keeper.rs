use log::{debug, info};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::store::keys::ACCOUNTS;
use crate::store::{prefix_iter, KvStore};
use crate::types::{Address, PublicKey, ADDRESS_LEN};

use super::{Account, GenesisAccount};

fn account_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_LEN);
    key.push(ACCOUNTS);
    key.extend_from_slice(address.as_bytes());
    key
}

#[derive(Clone, Copy)]
pub struct Keeper {
    codec: Codec,
}

impl Keeper {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    pub fn get_account(&self, store: &dyn KvStore, address: &Address) -> Result<Option<Account>> {
        match store.get(&account_key(address)) {
            Some(bytes) => Ok(Some(self.codec.unmarshal(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The stored account, or an empty one for an address never seen.
    pub fn account(&self, store: &dyn KvStore, address: &Address) -> Result<Account> {
        Ok(self.get_account(store, address)?.unwrap_or_else(|| Account::new(*address)))
    }

    pub fn set_account(&self, store: &mut dyn KvStore, account: &Account) -> Result<()> {
        store.set(&account_key(&account.address), self.codec.marshal(account)?);
        Ok(())
    }

    pub fn all_accounts(&self, store: &dyn KvStore) -> Result<Vec<Account>> {
        prefix_iter(store, &[ACCOUNTS])
            .map(|(_, bytes)| self.codec.unmarshal(&bytes))
            .collect()
    }

    pub fn balance(&self, store: &dyn KvStore, address: &Address) -> Result<u64> {
        Ok(self.account(store, address)?.coins)
    }

    pub fn sequence(&self, store: &dyn KvStore, address: &Address) -> Result<u64> {
        Ok(self.account(store, address)?.sequence)
    }

    pub fn add_coins(&self, store: &mut dyn KvStore, address: &Address, amount: u64) -> Result<u64> {
        let mut account = self.account(store, address)?;
        account.coins = account.coins.checked_add(amount).ok_or_else(|| {
            Error::InvalidArgument(format!("balance of {} would overflow", address))
        })?;
        self.set_account(store, &account)?;
        debug!("Credited {} to {}, balance {}", amount, address, account.coins);
        Ok(account.coins)
    }

    pub fn sub_coins(&self, store: &mut dyn KvStore, address: &Address, amount: u64) -> Result<u64> {
        let mut account = self.account(store, address)?;
        account.coins = account.coins.checked_sub(amount).ok_or_else(|| {
            Error::InsufficientFunds(format!("{} holds {}, needs {}", address, account.coins, amount))
        })?;
        self.set_account(store, &account)?;
        debug!("Debited {} from {}, balance {}", amount, address, account.coins);
        Ok(account.coins)
    }

    /// Moves `amount` between accounts. Fails before writing if the sender
    /// cannot cover it.
    pub fn send(&self, store: &mut dyn KvStore, from: &Address, to: &Address, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidArgument("send amount must be positive".into()));
        }
        if from == to {
            return Err(Error::InvalidArgument("sender and recipient are the same account".into()));
        }
        let available = self.balance(store, from)?;
        if available < amount {
            return Err(Error::InsufficientFunds(format!("{} holds {}, needs {}", from, available, amount)));
        }
        if self.balance(store, to)?.checked_add(amount).is_none() {
            return Err(Error::InvalidArgument(format!("balance of {} would overflow", to)));
        }
        self.sub_coins(store, from, amount)?;
        self.add_coins(store, to, amount)?;
        info!("Sent {} from {} to {}", amount, from, to);
        Ok(())
    }

    /// Rejects a transaction whose sequence is not the account's next one.
    pub fn check_sequence(&self, store: &dyn KvStore, address: &Address, sequence: u64) -> Result<()> {
        let expected = self.sequence(store, address)?;
        if sequence != expected {
            return Err(Error::Unauthorized(format!(
                "sequence {} for {} does not match expected {}",
                sequence, address, expected
            )));
        }
        Ok(())
    }

    /// Consumes the current sequence and records the signer's key.
    pub fn increment_sequence(&self, store: &mut dyn KvStore, public_key: &PublicKey) -> Result<u64> {
        let mut account = self.account(store, &public_key.address())?;
        account.public_key = Some(*public_key);
        account.sequence += 1;
        self.set_account(store, &account)?;
        Ok(account.sequence)
    }

    pub fn init_genesis(&self, store: &mut dyn KvStore, accounts: &[GenesisAccount]) -> Result<()> {
        for genesis in accounts {
            self.add_coins(store, &genesis.address, genesis.coins)?;
        }
        info!("Initialized {} genesis accounts", accounts.len());
        Ok(())
    }
}
