/*!
Julius PoS - staking core and keybase for a proof-of-stake chain.

The crate tracks validators and their stake, reconciles the stake-weighted
validator set with the consensus engine block by block, and keeps signing
keys encrypted at rest.

# Main Components

- `auth`: account balances and the per-account transaction sequence
- `pos`: validator store, power index, stake/unstake lifecycle, set reconciliation and the signing-info ledger
- `gov`: parameter ownership (ACL) and protected parameter changes
- `cryptography`: ed25519 signing and the encrypted keybase with armored export
- `params`: named parameter subspaces and the registry passed to each keeper
- `store`: the ordered key/value interface every keeper reads and writes through
- `node` / `cli`: a file-backed block executor and its command line

# Example Usage

```rust
use julius_pos::codec::Codec;
use julius_pos::pos::{Keeper, Params};
use julius_pos::store::MemStore;
use julius_pos::types::{BlockHeader, PublicKey};

let registry = julius_pos::node::registry();
let keeper = Keeper::new(Codec::new(), &registry).unwrap();
let mut store = MemStore::new();
keeper.set_params(&mut store, &Params::default()).unwrap();

keeper.stake(&mut store, &BlockHeader::new(1, 0), PublicKey([1; 32]), 100).unwrap();
let updates = keeper.update_validator_set(&mut store).unwrap();
assert_eq!(updates[0].power, 100);
```
*/

/// Typed errors shared by every component.
pub mod error;

/// Binary encoding of stored values.
pub mod codec;

/// Ordered key/value store interface and the in-memory implementation.
pub mod store;

/// Addresses, public keys and block context.
pub mod types;

/// Per-block hooks implemented by each module.
pub mod module;

/// Parameter subspaces and the registry.
pub mod params;

/// Account balances and transaction sequences.
pub mod auth;

/// Validator staking, power reconciliation and liveness tracking.
pub mod pos;

/// Parameter ownership checks.
pub mod gov;

/// Signing keys and the encrypted keybase.
pub mod cryptography;

/// Node configuration file.
pub mod config;

/// Block executor used by the binary.
pub mod node;

/// Command-line interface.
pub mod cli;

pub use cryptography::{verify_signature, KeyPair, Keybase};
pub use error::{Error, Result};
pub use node::Node;
pub use pos::{Validator, ValidatorUpdate};
