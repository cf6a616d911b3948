use crate::error::Result;
use crate::pos::ValidatorUpdate;
use crate::store::KvStore;
use crate::types::{BeginBlockRequest, BlockHeader};

/// Per-block hooks a module exposes to the block executor.
pub trait AppModule {
    fn name(&self) -> &'static str;

    fn begin_block(&self, _store: &mut dyn KvStore, _request: &BeginBlockRequest) -> Result<()> {
        Ok(())
    }

    fn end_block(&self, _store: &mut dyn KvStore, _header: &BlockHeader) -> Result<Vec<ValidatorUpdate>> {
        Ok(Vec::new())
    }
}
