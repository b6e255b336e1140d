use crate::database::{ObjectStore, WriteTransaction};
use crate::error::ModelResult;
use crate::model::pending::Pending;
use crate::observer::{HookDispatch, HookScheduler, ModelDefinition};
use crate::types::Operation;

/// Run `body` inside one write transaction.
///
/// Commits when `body` succeeds. On error the transaction is dropped, which
/// rolls back every change made so far.
pub(crate) fn write<T>(
    store: &dyn ObjectStore,
    model: &'static str,
    operation: Operation,
    body: impl FnOnce(&mut dyn WriteTransaction) -> ModelResult<T>,
) -> ModelResult<T> {
    let mut txn = store.begin_write()?;

    match body(&mut *txn) {
        Ok(value) => {
            txn.commit()?;
            tracing::debug!("Committed {} transaction on {}", operation, model);
            Ok(value)
        }
        Err(e) => {
            drop(txn);
            tracing::debug!("Rolled back {} transaction on {}: {}", operation, model, e);
            Err(e)
        }
    }
}

/// Turn a transaction outcome into a `Pending`, releasing after-hooks only on commit
pub(crate) fn settle<D: ModelDefinition, T>(
    operation: Operation,
    outcome: ModelResult<T>,
    hooks: HookDispatch<D>,
    scheduler: &HookScheduler,
) -> Pending<T> {
    match outcome {
        Ok(value) => {
            hooks.release(scheduler);
            Pending::resolved(value)
        }
        Err(e) => {
            if hooks.staged() > 0 {
                tracing::debug!("Discarding {} after-hooks of aborted {} on {}", hooks.staged(), operation, D::NAME);
            }
            Pending::rejected(e)
        }
    }
}
