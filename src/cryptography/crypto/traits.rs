use crate::error::Result;
use crate::types::PublicKey;

/// A signature scheme usable by the keybase.
pub trait CryptoOperations {
    /// Raw private key material, as stored encrypted in the keybase.
    type PrivateKey;

    fn generate_keypair() -> Result<(Self::PrivateKey, PublicKey)>;
    fn private_key_from_bytes(bytes: &[u8]) -> Result<Self::PrivateKey>;
    fn public_key(private_key: &Self::PrivateKey) -> PublicKey;
    fn sign(private_key: &Self::PrivateKey, message: &[u8]) -> Vec<u8>;
    fn verify(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool;
}
