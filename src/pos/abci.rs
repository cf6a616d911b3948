use log::{debug, error};

use crate::error::Result;
use crate::module::AppModule;
use crate::store::KvStore;
use crate::types::{BeginBlockRequest, BlockHeader};

use super::keeper::Keeper;
use super::types::ValidatorUpdate;
use super::MODULE_NAME;

impl AppModule for Keeper {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    /// Liveness from the last commit, then double-sign evidence, then
    /// unstaking maturity.
    fn begin_block(&self, store: &mut dyn KvStore, request: &BeginBlockRequest) -> Result<()> {
        let header = &request.header;
        for vote in &request.last_commit {
            self.handle_validator_signature(store, header, &vote.address, vote.signed_last_block)?;
        }
        for evidence in &request.evidence {
            self.handle_double_sign(store, header, evidence)?;
        }
        let matured = self.mature_unstaking(store, header)?;
        if !matured.is_empty() {
            debug!("{} validators finished unstaking at height {}", matured.len(), header.height);
        }
        Ok(())
    }

    fn end_block(&self, store: &mut dyn KvStore, header: &BlockHeader) -> Result<Vec<ValidatorUpdate>> {
        self.update_validator_set(store).map_err(|e| {
            if e.is_fatal() {
                error!("Halting at height {}: {}", header.height, e);
            }
            e
        })
    }
}
