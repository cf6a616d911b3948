use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;

use super::traits::CryptoOperations;
use crate::error::{Error, Result};
use crate::types::PublicKey;

pub const PRIVATE_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

pub struct Ed25519;

impl CryptoOperations for Ed25519 {
    type PrivateKey = [u8; PRIVATE_KEY_LEN];

    fn generate_keypair() -> Result<(Self::PrivateKey, PublicKey)> {
        let mut seed = [0u8; PRIVATE_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut seed);
        let public_key = Self::public_key(&seed);
        Ok((seed, public_key))
    }

    fn private_key_from_bytes(bytes: &[u8]) -> Result<Self::PrivateKey> {
        bytes
            .try_into()
            .map_err(|_| Error::Corrupt(format!("private key must be {} bytes, got {}", PRIVATE_KEY_LEN, bytes.len())))
    }

    fn public_key(private_key: &Self::PrivateKey) -> PublicKey {
        PublicKey(SigningKey::from_bytes(private_key).verifying_key().to_bytes())
    }

    fn sign(private_key: &Self::PrivateKey, message: &[u8]) -> Vec<u8> {
        SigningKey::from_bytes(private_key).sign(message).to_bytes().to_vec()
    }

    fn verify(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }
}

/// Checks an ed25519 signature. Touches no store.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    Ed25519::verify(public_key, message, signature)
}
