//! Unit-of-work runner for mutating operations.

use crate::domain::error::MarketError;
use crate::ports::store_port::{StorePort, UnitOfWork};

/// A named mutation executed inside one store transaction.
pub trait Operation {
    type Output;

    const NAME: &'static str;

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Self::Output, MarketError>;
}

/// Run `op` in a fresh transaction: commit on success, roll back on any error.
///
/// Nothing is retried here. A failed run leaves no trace in the store, so the
/// caller may simply submit the operation again.
pub fn run<O: Operation>(store: &dyn StorePort, op: &O) -> Result<O::Output, MarketError> {
    let _span = tracing::debug_span!("operation", name = O::NAME).entered();

    let mut tx = store.begin()?;
    match op.execute(&mut *tx) {
        Ok(output) => {
            tx.commit()?;
            Ok(output)
        }
        Err(err) => {
            drop(tx);
            if err.is_internal() {
                tracing::error!(error = %err, "operation failed");
            } else {
                tracing::debug!(error = %err, "operation rejected");
            }
            Err(err)
        }
    }
}
