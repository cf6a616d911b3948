//! A single-process block executor around the account, staking and
//! governance keepers, backed by a file-persisted [`MemStore`].

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::codec::Codec;
use crate::config::{Genesis, NodeConfig};
use crate::cryptography::verify_signature;
use crate::error::{Error, Result};
use crate::gov::{self, ParamChange};
use crate::module::AppModule;
use crate::params::ParamRegistry;
use crate::pos::{self, ValidatorUpdate};
use crate::store::{keys, KvStore, MemStore};
use crate::types::{Address, BeginBlockRequest, BlockHeader, PublicKey, VoteInfo};

/// Operations a key holder can submit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Msg {
    Send { to: Address, amount: u64 },
    Stake { amount: u64 },
    Unstake,
    Unjail,
    ModifyParam { key: String, change: ParamChange },
}

#[derive(Serialize)]
struct SignDoc<'a> {
    sequence: u64,
    msg: &'a Msg,
}

impl Msg {
    /// Bytes covered by the signature: the message bound to the signer's
    /// account sequence.
    pub fn sign_bytes(&self, sequence: u64) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&SignDoc { sequence, msg: self })?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedMsg {
    pub msg: Msg,
    pub sequence: u64,
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

impl SignedMsg {
    pub fn verify(&self) -> Result<bool> {
        Ok(verify_signature(&self.public_key, &self.msg.sign_bytes(self.sequence)?, &self.signature))
    }
}

fn last_block_key() -> Vec<u8> {
    vec![keys::LAST_BLOCK]
}

pub fn registry() -> ParamRegistry {
    ParamRegistry::new()
        .with(pos::Params::subspace())
        .with(gov::Params::subspace())
}

pub struct Node {
    store: MemStore,
    codec: Codec,
    accounts: auth::Keeper,
    staking: pos::Keeper,
    gov: gov::Keeper,
    last: BlockHeader,
    state_path: Option<PathBuf>,
}

impl Node {
    /// Wraps `store`, writing genesis first if the store has never seen a block.
    pub fn new(mut store: MemStore, genesis: &Genesis, state_path: Option<PathBuf>) -> Result<Self> {
        let codec = Codec::new();
        let registry = registry();
        let staking = pos::Keeper::new(codec, &registry)?;
        let accounts = *staking.accounts();
        let gov = gov::Keeper::new(&registry)?;

        let last = match store.get(&last_block_key()) {
            Some(bytes) => codec.unmarshal(&bytes)?,
            None => {
                let header = BlockHeader::new(0, genesis.time);
                let mut working = store.clone();
                accounts.init_genesis(&mut working, &genesis.accounts)?;
                gov.init_genesis(&mut working, &genesis.gov)?;
                let updates = staking.init_genesis(&mut working, &header, &genesis.pos, &genesis.validators)?;
                working.set(&last_block_key(), codec.marshal(&header)?);
                store = working;
                info!("Wrote genesis with {} initial validators", updates.len());
                header
            }
        };

        Ok(Self { store, codec, accounts, staking, gov, last, state_path })
    }

    pub fn open(config: &NodeConfig) -> Result<Self> {
        let store = MemStore::load(&config.state_path)?;
        Self::new(store, &config.genesis, Some(config.state_path.clone()))
    }

    pub fn store(&self) -> &MemStore {
        &self.store
    }

    pub fn accounts(&self) -> &auth::Keeper {
        &self.accounts
    }

    pub fn staking(&self) -> &pos::Keeper {
        &self.staking
    }

    pub fn gov(&self) -> &gov::Keeper {
        &self.gov
    }

    pub fn last_block(&self) -> &BlockHeader {
        &self.last
    }

    pub fn save(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            self.store.save(path)?;
            debug!("Saved state at height {} to {}", self.last.height, path.display());
        }
        Ok(())
    }

    /// Checks the signature and the sender's sequence, then applies the
    /// message in the context of the last committed block.
    ///
    /// The sequence is consumed even when the message itself fails, so a
    /// rejected transaction cannot succeed on a later replay.
    pub fn deliver(&mut self, tx: &SignedMsg) -> Result<()> {
        if !tx.verify()? {
            return Err(Error::Unauthorized("signature does not match message".into()));
        }
        let address = tx.public_key.address();
        self.accounts.check_sequence(&self.store, &address, tx.sequence)?;
        self.accounts.increment_sequence(&mut self.store, &tx.public_key)?;

        let header = self.last.clone();
        match &tx.msg {
            Msg::Send { to, amount } => {
                self.accounts.send(&mut self.store, &address, to, *amount)?;
            }
            Msg::Stake { amount } => {
                self.staking.stake_from_account(&mut self.store, &header, tx.public_key, *amount)?;
            }
            Msg::Unstake => {
                self.staking.begin_unstake(&mut self.store, &header, &address)?;
            }
            Msg::Unjail => {
                self.staking.unjail(&mut self.store, &header, &address)?;
            }
            Msg::ModifyParam { key, change } => {
                self.gov.modify_param(&mut self.store, key, &address, change.clone())?;
            }
        }
        Ok(())
    }

    /// Request for the next block: every validator of the current set is
    /// reported as having signed the last one.
    pub fn next_request(&self, time: u64) -> Result<BeginBlockRequest> {
        let last_commit = self
            .staking
            .prev_state_powers(&self.store)?
            .into_keys()
            .map(|address| VoteInfo { address, signed_last_block: true })
            .collect();
        Ok(BeginBlockRequest {
            header: BlockHeader::new(self.last.height + 1, time.max(self.last.time)),
            last_commit,
            evidence: Vec::new(),
        })
    }

    /// Runs every module's block hooks. The block commits only if all of them
    /// succeed; otherwise the store is left as it was.
    pub fn apply_block(&mut self, request: &BeginBlockRequest) -> Result<Vec<ValidatorUpdate>> {
        let header = &request.header;
        if header.height != self.last.height + 1 || header.time < self.last.time {
            return Err(Error::InvalidArgument(format!(
                "block {} at {} does not follow block {} at {}",
                header.height, header.time, self.last.height, self.last.time
            )));
        }

        let mut working = self.store.clone();
        let modules: [&dyn AppModule; 2] = [&self.gov, &self.staking];
        for module in modules {
            module.begin_block(&mut working, request)?;
        }
        let mut updates = Vec::new();
        for module in modules {
            updates.extend(module.end_block(&mut working, header)?);
        }
        working.set(&last_block_key(), self.codec.marshal(header)?);

        self.store = working;
        self.last = header.clone();
        Ok(updates)
    }

    /// Produces a block every `interval` until `blocks` have been applied, or
    /// forever when `blocks` is `None`. Stops on the first failing block.
    pub async fn run(&mut self, blocks: Option<u64>, interval: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        let mut produced = 0u64;
        while blocks.map_or(true, |n| produced < n) {
            ticker.tick().await;
            let request = self.next_request(unix_now())?;
            let updates = match self.apply_block(&request) {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Block {} failed: {}", request.header.height, e);
                    return Err(e);
                }
            };
            info!(
                "Committed block {} at {} with {} validator updates",
                request.header.height,
                request.header.time,
                updates.len()
            );
            self.save()?;
            produced += 1;
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::cryptography::{Keybase, KeyPair};
    use crate::pos::{GenesisValidator, Params};

    fn signed(node: &Node, kb: &Keybase<MemStore>, key: &KeyPair, msg: Msg) -> SignedMsg {
        let sequence = node.accounts().sequence(node.store(), &key.address).unwrap();
        let (signature, public_key) = kb.sign(&key.address, "pass", &msg.sign_bytes(sequence).unwrap()).unwrap();
        SignedMsg { msg, sequence, public_key, signature }
    }

    fn genesis() -> Genesis {
        Genesis {
            time: 1_000,
            pos: Params { unstaking_time: 10, ..Params::default() },
            validators: vec![GenesisValidator { public_key: PublicKey([3; 32]), tokens: 500 }],
            ..Genesis::default()
        }
    }

    fn funded(keys: &[&KeyPair], coins: u64) -> Genesis {
        let accounts = keys.iter().map(|key| auth::GenesisAccount { address: key.address, coins }).collect();
        Genesis { accounts, ..genesis() }
    }

    #[test]
    fn genesis_is_written_once() {
        let node = Node::new(MemStore::new(), &genesis(), None).unwrap();
        assert_eq!(node.last_block(), &BlockHeader::new(0, 1_000));
        assert_eq!(node.staking().prev_state_total_power(node.store()).unwrap(), 500);

        let reopened = Node::new(node.store().clone(), &Genesis::default(), None).unwrap();
        assert_eq!(reopened.staking().params(reopened.store()).unwrap().unstaking_time, 10);
    }

    #[test]
    fn signed_stake_flows_into_the_validator_set() {
        let kb = Keybase::new(MemStore::new(), Codec::new(), 1);
        let key = kb.create("pass").unwrap();
        let mut node = Node::new(MemStore::new(), &funded(&[&key], 1_000), None).unwrap();

        node.deliver(&signed(&node, &kb, &key, Msg::Stake { amount: 900 })).unwrap();
        assert_eq!(node.accounts().balance(node.store(), &key.address).unwrap(), 100);
        let request = node.next_request(1_005).unwrap();
        assert_eq!(request.last_commit.len(), 1);
        let updates = node.apply_block(&request).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].address, key.address);
        assert_eq!(updates[0].power, 900);

        node.deliver(&signed(&node, &kb, &key, Msg::Unstake)).unwrap();
        let request = node.next_request(1_020).unwrap();
        let updates = node.apply_block(&request).unwrap();
        assert_eq!(updates[0].power, 0);
        assert!(node.staking().get_validator(node.store(), &key.address).unwrap().is_unstaked());
        assert_eq!(node.accounts().balance(node.store(), &key.address).unwrap(), 1_000);
    }

    #[test]
    fn stake_beyond_balance_is_refused() {
        let kb = Keybase::new(MemStore::new(), Codec::new(), 1);
        let key = kb.create("pass").unwrap();
        let mut node = Node::new(MemStore::new(), &funded(&[&key], 50), None).unwrap();

        let tx = signed(&node, &kb, &key, Msg::Stake { amount: 51 });
        assert!(matches!(node.deliver(&tx), Err(Error::InsufficientFunds(_))));
        assert!(!node.staking().has_validator(node.store(), &key.address));
        assert_eq!(node.accounts().balance(node.store(), &key.address).unwrap(), 50);
        assert_eq!(node.accounts().sequence(node.store(), &key.address).unwrap(), 1);
    }

    #[test]
    fn send_moves_coins_between_accounts() {
        let kb = Keybase::new(MemStore::new(), Codec::new(), 1);
        let alice = kb.create("pass").unwrap();
        let bob = kb.create("pass").unwrap();
        let mut node = Node::new(MemStore::new(), &funded(&[&alice], 100), None).unwrap();

        node.deliver(&signed(&node, &kb, &alice, Msg::Send { to: bob.address, amount: 70 })).unwrap();
        let overdraft = signed(&node, &kb, &alice, Msg::Send { to: bob.address, amount: 31 });
        assert!(matches!(node.deliver(&overdraft), Err(Error::InsufficientFunds(_))));
        assert_eq!(node.accounts().balance(node.store(), &alice.address).unwrap(), 30);
        assert_eq!(node.accounts().balance(node.store(), &bob.address).unwrap(), 70);
    }

    #[test]
    fn replayed_transaction_is_rejected() {
        let kb = Keybase::new(MemStore::new(), Codec::new(), 1);
        let alice = kb.create("pass").unwrap();
        let bob = kb.create("pass").unwrap();
        let mut node = Node::new(MemStore::new(), &funded(&[&alice], 100), None).unwrap();

        let tx = signed(&node, &kb, &alice, Msg::Send { to: bob.address, amount: 10 });
        node.deliver(&tx).unwrap();
        assert!(matches!(node.deliver(&tx), Err(Error::Unauthorized(_))));
        assert_eq!(node.accounts().balance(node.store(), &bob.address).unwrap(), 10);

        // rewinding the sequence breaks the signature
        let mut stale = signed(&node, &kb, &alice, Msg::Send { to: bob.address, amount: 10 });
        stale.sequence = 0;
        assert!(matches!(node.deliver(&stale), Err(Error::Unauthorized(_))));
        assert_eq!(node.accounts().sequence(node.store(), &alice.address).unwrap(), 1);
    }

    #[test]
    fn forged_signature_is_rejected() {
        let kb = Keybase::new(MemStore::new(), Codec::new(), 1);
        let key = kb.create("pass").unwrap();
        let mut node = Node::new(MemStore::new(), &funded(&[&key], 10), None).unwrap();

        let mut tx = signed(&node, &kb, &key, Msg::Stake { amount: 1 });
        tx.msg = Msg::Stake { amount: 10 };
        assert!(matches!(node.deliver(&tx), Err(Error::Unauthorized(_))));
        assert!(!node.staking().has_validator(node.store(), &key.address));
        assert_eq!(node.accounts().sequence(node.store(), &key.address).unwrap(), 0);
    }

    #[test]
    fn param_change_goes_through_the_acl() {
        let kb = Keybase::new(MemStore::new(), Codec::new(), 1);
        let owner = kb.create("pass").unwrap();
        let other = kb.create("pass").unwrap();
        let mut genesis = genesis();
        genesis.gov.acl = vec![gov::ACLPair { key: "pos/max_validators".into(), owner: owner.address }];
        let mut node = Node::new(MemStore::new(), &genesis, None).unwrap();

        let change = |v| Msg::ModifyParam { key: "pos/max_validators".into(), change: ParamChange::Value(json!(v)) };
        let refused = signed(&node, &kb, &other, change(5));
        assert!(matches!(node.deliver(&refused), Err(Error::Unauthorized(_))));
        node.deliver(&signed(&node, &kb, &owner, change(5))).unwrap();
        assert_eq!(node.staking().params(node.store()).unwrap().max_validators, 5);
    }

    #[test]
    fn out_of_order_block_is_refused_without_changes() {
        let mut node = Node::new(MemStore::new(), &genesis(), None).unwrap();
        let mut request = node.next_request(1_001).unwrap();
        request.header.height = 5;
        assert!(matches!(node.apply_block(&request), Err(Error::InvalidArgument(_))));
        assert_eq!(node.last_block().height, 0);
    }

    #[test]
    fn failing_block_rolls_back() {
        let mut node = Node::new(MemStore::new(), &genesis(), None).unwrap();
        // corrupt the power index so the reconciler halts
        node.store.set(&pos::keys::power_key(1, &Address([0xee; 20])), Vec::new());
        let before = node.store().clone();
        let request = node.next_request(1_001).unwrap();
        let err = node.apply_block(&request).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(node.store().len(), before.len());
        assert_eq!(node.last_block().height, 0);
    }

    #[tokio::test]
    async fn run_produces_blocks() {
        let mut node = Node::new(MemStore::new(), &genesis(), None).unwrap();
        node.run(Some(3), Duration::from_millis(1)).await.unwrap();
        assert_eq!(node.last_block().height, 3);
    }
}
