//! Signing primitives and the keybase that keeps private keys encrypted at rest.

pub mod crypto;
pub mod keybase;

pub use crypto::{verify_signature, CryptoOperations, Ed25519};
pub use keybase::{KeyPair, Keybase};
