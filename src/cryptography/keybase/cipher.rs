//! Passphrase encryption of private keys: PBKDF2-HMAC-SHA256 stretches the
//! passphrase into an AES-256-GCM key.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

pub const KDF_NAME: &str = "pbkdf2-hmac-sha256";
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
/// Upper bound on PBKDF2 rounds accepted from stored or imported keys.
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;
const KEY_LEN: usize = 32;

/// Ciphertext plus everything needed to re-derive its key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    pub iterations: u32,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    /// AES-GCM output, tag included.
    pub ciphertext: Vec<u8>,
}

fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> Result<[u8; KEY_LEN]> {
    if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
        return Err(Error::InvalidArgument(format!(
            "kdf iterations must be between 1 and {}",
            MAX_KDF_ITERATIONS
        )));
    }
    let mut key = [0u8; KEY_LEN];
    pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), salt, iterations, &mut key)
        .map_err(|e| Error::InvalidArgument(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

fn cipher(passphrase: &str, salt: &[u8], iterations: u32) -> Result<Aes256Gcm> {
    let key = derive_key(passphrase, salt, iterations)?;
    Aes256Gcm::new_from_slice(&key).map_err(|e| Error::InvalidArgument(format!("bad cipher key: {}", e)))
}

pub fn encrypt(secret: &[u8], passphrase: &str, iterations: u32) -> Result<EncryptedKey> {
    let mut rng = rand::thread_rng();
    let mut salt = vec![0u8; SALT_LEN];
    let mut nonce = vec![0u8; NONCE_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let ciphertext = cipher(passphrase, &salt, iterations)?
        .encrypt(Nonce::from_slice(&nonce), secret)
        .map_err(|e| Error::InvalidArgument(format!("encryption failed: {}", e)))?;
    Ok(EncryptedKey { iterations, salt, nonce, ciphertext })
}

/// Fails with `Unauthorized` when the passphrase does not open the ciphertext.
pub fn decrypt(encrypted: &EncryptedKey, passphrase: &str) -> Result<Vec<u8>> {
    if encrypted.nonce.len() != NONCE_LEN {
        return Err(Error::Corrupt(format!("nonce must be {} bytes", NONCE_LEN)));
    }
    if encrypted.iterations == 0 || encrypted.iterations > MAX_KDF_ITERATIONS {
        return Err(Error::Corrupt(format!("{} kdf iterations out of range", encrypted.iterations)));
    }
    cipher(passphrase, &encrypted.salt, encrypted.iterations)?
        .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_ref())
        .map_err(|_| Error::Unauthorized("invalid passphrase".into()))
}
