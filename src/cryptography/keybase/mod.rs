//! Encrypted key storage.
//!
//! Private keys are sealed with a passphrase before they reach the store and
//! are only ever decrypted inside a single call. One mutex covers the whole
//! keybase, so decrypt, use and persist never interleave between callers.

pub mod armor;
pub mod cipher;

use std::sync::{Mutex, MutexGuard};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::store::{keys, prefix_iter, KvStore};
use crate::types::{Address, PublicKey};

use super::crypto::{CryptoOperations, Ed25519};
use armor::Armor;
use cipher::EncryptedKey;

pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

type PrivateKey = <Ed25519 as CryptoOperations>::PrivateKey;

/// A stored key. The private half only exists encrypted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub address: Address,
    pub public_key: PublicKey,
    pub encrypted: EncryptedKey,
}

fn record_key(address: &Address) -> Vec<u8> {
    let mut key = vec![keys::KEYBASE];
    key.extend_from_slice(address.as_bytes());
    key
}

pub struct Keybase<S: KvStore> {
    store: Mutex<S>,
    codec: Codec,
    iterations: u32,
}

impl<S: KvStore> Keybase<S> {
    pub fn new(store: S, codec: Codec, iterations: u32) -> Self {
        Self {
            store: Mutex::new(store),
            codec,
            iterations: iterations.clamp(1, cipher::MAX_KDF_ITERATIONS),
        }
    }

    /// Hands back the underlying store, e.g. to persist it.
    pub fn into_inner(self) -> Result<S> {
        self.store
            .into_inner()
            .map_err(|_| Error::InvalidState("keybase lock poisoned".into()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| Error::InvalidState("keybase lock poisoned".into()))
    }

    fn read(&self, store: &S, address: &Address) -> Result<KeyPair> {
        match store.get(&record_key(address)) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Err(Error::NotFound(format!("no key for address {}", address))),
        }
    }

    fn write(&self, store: &mut S, pair: &KeyPair) -> Result<()> {
        store.set(&record_key(&pair.address), self.codec.marshal(pair)?);
        Ok(())
    }

    fn seal(&self, private_key: &PrivateKey, passphrase: &str) -> Result<KeyPair> {
        let public_key = Ed25519::public_key(private_key);
        Ok(KeyPair {
            address: public_key.address(),
            public_key,
            encrypted: cipher::encrypt(private_key, passphrase, self.iterations)?,
        })
    }

    /// Decrypts and checks that the key still matches its record.
    fn open(pair: &KeyPair, passphrase: &str) -> Result<PrivateKey> {
        let plain = cipher::decrypt(&pair.encrypted, passphrase)?;
        let private_key = Ed25519::private_key_from_bytes(&plain)?;
        if Ed25519::public_key(&private_key) != pair.public_key {
            return Err(Error::Corrupt(format!("stored key for {} does not match its public key", pair.address)));
        }
        Ok(private_key)
    }

    /// Stores `private_key` under a fresh encryption unless its address is taken.
    fn insert(&self, store: &mut S, private_key: &PrivateKey, passphrase: &str) -> Result<KeyPair> {
        let pair = self.seal(private_key, passphrase)?;
        if store.has(&record_key(&pair.address)) {
            return Err(Error::AlreadyExists(format!("key for address {} already stored", pair.address)));
        }
        self.write(store, &pair)?;
        Ok(pair)
    }

    pub fn create(&self, passphrase: &str) -> Result<KeyPair> {
        let (private_key, _) = Ed25519::generate_keypair()?;
        let mut store = self.lock()?;
        let pair = self.insert(&mut store, &private_key, passphrase)?;
        info!("Created key {}", pair.address);
        Ok(pair)
    }

    pub fn get(&self, address: &Address) -> Result<KeyPair> {
        let store = self.lock()?;
        self.read(&store, address)
    }

    pub fn list(&self) -> Result<Vec<KeyPair>> {
        let store = self.lock()?;
        let pairs = prefix_iter(&*store, &[keys::KEYBASE])
            .map(|(_, bytes)| self.codec.unmarshal(&bytes))
            .collect();
        pairs
    }

    /// Removes a key. The passphrase must open it first.
    pub fn delete(&self, address: &Address, passphrase: &str) -> Result<()> {
        let mut store = self.lock()?;
        let pair = self.read(&store, address)?;
        Self::open(&pair, passphrase)?;
        store.delete(&record_key(address));
        warn!("Deleted key {}", address);
        Ok(())
    }

    /// Signs `message`, returning the signature and the public key to check it with.
    pub fn sign(&self, address: &Address, passphrase: &str, message: &[u8]) -> Result<(Vec<u8>, PublicKey)> {
        let store = self.lock()?;
        let pair = self.read(&store, address)?;
        let private_key = Self::open(&pair, passphrase)?;
        Ok((Ed25519::sign(&private_key, message), pair.public_key))
    }

    /// Re-encrypts a stored key under a new passphrase.
    pub fn update(&self, address: &Address, old_passphrase: &str, new_passphrase: &str) -> Result<KeyPair> {
        let mut store = self.lock()?;
        let pair = self.read(&store, address)?;
        let private_key = Self::open(&pair, old_passphrase)?;
        let updated = self.seal(&private_key, new_passphrase)?;
        self.write(&mut store, &updated)?;
        info!("Changed passphrase of key {}", address);
        Ok(updated)
    }

    pub fn export_encrypted_armor(
        &self,
        address: &Address,
        unlock_passphrase: &str,
        export_passphrase: &str,
    ) -> Result<String> {
        let store = self.lock()?;
        let pair = self.read(&store, address)?;
        let private_key = Self::open(&pair, unlock_passphrase)?;
        let armor = Armor {
            address: pair.address,
            key: cipher::encrypt(&private_key, export_passphrase, self.iterations)?,
        };
        Ok(armor::encode(&armor))
    }

    /// `Corrupt` for a damaged armor, `Unauthorized` for a wrong export
    /// passphrase, `AlreadyExists` when the key is already stored.
    pub fn import_encrypted_armor(
        &self,
        armored: &str,
        export_passphrase: &str,
        new_passphrase: &str,
    ) -> Result<KeyPair> {
        let armor = armor::decode(armored)?;
        let plain = cipher::decrypt(&armor.key, export_passphrase)?;
        let private_key = Ed25519::private_key_from_bytes(&plain)?;
        if Ed25519::public_key(&private_key).address() != armor.address {
            return Err(Error::Corrupt(format!("armored key does not belong to {}", armor.address)));
        }
        let mut store = self.lock()?;
        let pair = self.insert(&mut store, &private_key, new_passphrase)?;
        info!("Imported key {}", pair.address);
        Ok(pair)
    }

    /// Hex of the unencrypted private key.
    pub fn export_raw_key(&self, address: &Address, passphrase: &str) -> Result<String> {
        let store = self.lock()?;
        let pair = self.read(&store, address)?;
        let private_key = Self::open(&pair, passphrase)?;
        warn!("Exported unencrypted key {}", address);
        Ok(hex::encode(private_key))
    }

    pub fn import_raw_key(&self, raw_hex: &str, passphrase: &str) -> Result<KeyPair> {
        let bytes = hex::decode(raw_hex.trim()).map_err(|_| Error::Corrupt("raw key is not hex".into()))?;
        let private_key = Ed25519::private_key_from_bytes(&bytes)?;
        let mut store = self.lock()?;
        let pair = self.insert(&mut store, &private_key, passphrase)?;
        info!("Imported raw key {}", pair.address);
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cryptography::verify_signature;
    use crate::store::MemStore;

    fn keybase() -> Keybase<MemStore> {
        Keybase::new(MemStore::new(), Codec::new(), 1)
    }

    #[test]
    fn create_sign_verify() {
        let kb = keybase();
        let pair = kb.create("pass").unwrap();
        assert_eq!(pair.address, pair.public_key.address());
        assert_eq!(kb.get(&pair.address).unwrap(), pair);

        let (sig, pk) = kb.sign(&pair.address, "pass", b"unstake").unwrap();
        assert_eq!(pk, pair.public_key);
        assert!(verify_signature(&pk, b"unstake", &sig));
        assert!(!verify_signature(&pk, b"unstakf", &sig));
        let mut bad = sig.clone();
        bad[63] ^= 0x80;
        assert!(!verify_signature(&pk, b"unstake", &bad));
    }

    #[test]
    fn wrong_passphrase_is_unauthorized() {
        let kb = keybase();
        let pair = kb.create("pass").unwrap();
        assert!(matches!(kb.sign(&pair.address, "nope", b"m"), Err(Error::Unauthorized(_))));
        assert!(matches!(kb.delete(&pair.address, "nope"), Err(Error::Unauthorized(_))));
        assert!(kb.get(&pair.address).is_ok());
    }

    #[test]
    fn missing_keys_are_not_found() {
        let kb = keybase();
        let addr = Address([4; 20]);
        assert!(matches!(kb.get(&addr), Err(Error::NotFound(_))));
        assert!(matches!(kb.delete(&addr, "p"), Err(Error::NotFound(_))));
        assert!(matches!(kb.sign(&addr, "p", b"m"), Err(Error::NotFound(_))));
    }

    #[test]
    fn delete_and_list() {
        let kb = keybase();
        let a = kb.create("a").unwrap();
        let b = kb.create("b").unwrap();
        let mut listed: Vec<Address> = kb.list().unwrap().into_iter().map(|k| k.address).collect();
        listed.sort();
        let mut expected = vec![a.address, b.address];
        expected.sort();
        assert_eq!(listed, expected);

        kb.delete(&a.address, "a").unwrap();
        assert!(matches!(kb.get(&a.address), Err(Error::NotFound(_))));
        assert_eq!(kb.list().unwrap().len(), 1);
    }

    #[test]
    fn update_changes_passphrase() {
        let kb = keybase();
        let pair = kb.create("old").unwrap();
        assert!(matches!(kb.update(&pair.address, "wrong", "new"), Err(Error::Unauthorized(_))));
        let updated = kb.update(&pair.address, "old", "new").unwrap();
        assert_eq!(updated.public_key, pair.public_key);
        assert!(kb.sign(&pair.address, "old", b"m").is_err());
        assert!(kb.sign(&pair.address, "new", b"m").is_ok());
    }

    #[test]
    fn armor_round_trip_into_another_keybase() {
        let source = keybase();
        let pair = source.create("p1").unwrap();
        let armored = source.export_encrypted_armor(&pair.address, "p1", "p2").unwrap();
        assert!(matches!(
            source.export_encrypted_armor(&pair.address, "bad", "p2"),
            Err(Error::Unauthorized(_))
        ));

        let target = keybase();
        assert!(matches!(target.import_encrypted_armor(&armored, "bad", "p3"), Err(Error::Unauthorized(_))));
        let imported = target.import_encrypted_armor(&armored, "p2", "p3").unwrap();
        assert_eq!(imported.address, pair.address);
        assert_eq!(imported.public_key, pair.public_key);

        let (original, _) = source.sign(&pair.address, "p1", b"msg").unwrap();
        let (copy, pk) = target.sign(&pair.address, "p3", b"msg").unwrap();
        assert_eq!(original, copy);
        assert!(verify_signature(&pk, b"msg", &original));
    }

    #[test]
    fn import_refuses_existing_address() {
        let kb = keybase();
        let pair = kb.create("p").unwrap();
        let armored = kb.export_encrypted_armor(&pair.address, "p", "x").unwrap();
        assert!(matches!(kb.import_encrypted_armor(&armored, "x", "y"), Err(Error::AlreadyExists(_))));

        let raw = kb.export_raw_key(&pair.address, "p").unwrap();
        assert!(matches!(kb.import_raw_key(&raw, "y"), Err(Error::AlreadyExists(_))));
        // the original record is untouched
        assert!(kb.sign(&pair.address, "p", b"m").is_ok());
    }

    #[test]
    fn raw_key_round_trip() {
        let source = keybase();
        let pair = source.create("p").unwrap();
        let raw = source.export_raw_key(&pair.address, "p").unwrap();
        assert_eq!(raw.len(), 64);

        let target = keybase();
        let imported = target.import_raw_key(&raw, "q").unwrap();
        assert_eq!(imported.public_key, pair.public_key);
        assert!(matches!(target.import_raw_key("xyz", "q"), Err(Error::Corrupt(_))));
    }

    #[test]
    fn tampered_armor_is_corrupt_not_unauthorized() {
        let kb = keybase();
        let pair = kb.create("p").unwrap();
        let armored = kb.export_encrypted_armor(&pair.address, "p", "x").unwrap();
        let other = Address([0x11; 20]).to_string();
        let tampered = armored.replace(&pair.address.to_string(), &other);
        assert!(matches!(keybase().import_encrypted_armor(&tampered, "x", "y"), Err(Error::Corrupt(_))));
    }

    #[test]
    fn concurrent_use_is_serialized() {
        let kb = Arc::new(keybase());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let kb = Arc::clone(&kb);
                thread::spawn(move || {
                    let pass = format!("pass{}", i);
                    let pair = kb.create(&pass).unwrap();
                    let (sig, pk) = kb.sign(&pair.address, &pass, b"block").unwrap();
                    assert!(verify_signature(&pk, b"block", &sig));
                    pair.address
                })
            })
            .collect();
        let addresses: Vec<Address> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(kb.list().unwrap().len(), addresses.len());
    }

    #[test]
    fn racing_calls_on_one_address_never_interleave() {
        let kb = Arc::new(keybase());
        let pair = kb.create("live").unwrap();
        let armored = kb.export_encrypted_armor(&pair.address, "live", "export").unwrap();
        let (address, public_key) = (pair.address, pair.public_key);

        let mut handles = Vec::new();
        for role in 0..4 {
            let kb = Arc::clone(&kb);
            let armored = armored.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    match role {
                        0 => match kb.delete(&address, "live") {
                            Ok(()) | Err(Error::NotFound(_)) => {}
                            Err(e) => panic!("delete: {}", e),
                        },
                        1 => match kb.sign(&address, "live", b"block") {
                            Ok((sig, pk)) => {
                                assert_eq!(pk, public_key);
                                assert!(verify_signature(&pk, b"block", &sig));
                            }
                            Err(Error::NotFound(_)) => {}
                            Err(e) => panic!("sign: {}", e),
                        },
                        2 => match kb.update(&address, "live", "live") {
                            Ok(updated) => assert_eq!(updated.public_key, public_key),
                            Err(Error::NotFound(_)) => {}
                            Err(e) => panic!("update: {}", e),
                        },
                        _ => match kb.import_encrypted_armor(&armored, "export", "live") {
                            Ok(imported) => assert_eq!(imported.address, address),
                            Err(Error::AlreadyExists(_)) => {}
                            Err(e) => panic!("import: {}", e),
                        },
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        match kb.get(&address) {
            Ok(stored) => {
                assert_eq!(stored.public_key, public_key);
                assert!(kb.sign(&address, "live", b"m").is_ok());
                assert!(matches!(kb.sign(&address, "export", b"m"), Err(Error::Unauthorized(_))));
            }
            Err(Error::NotFound(_)) => {
                kb.import_encrypted_armor(&armored, "export", "live").unwrap();
            }
            Err(e) => panic!("get: {}", e),
        }
        assert_eq!(kb.list().unwrap().len(), 1);
    }
}
