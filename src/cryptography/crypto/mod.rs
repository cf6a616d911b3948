pub mod ed25519;
pub mod traits;

pub use ed25519::{verify_signature, Ed25519, PRIVATE_KEY_LEN, SIGNATURE_LEN};
pub use traits::CryptoOperations;
