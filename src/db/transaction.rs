//! Transaction helper that keeps the caller's error type.

use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can tell an anticipated rejection from a failure.
pub trait RollbackCause {
    /// `true` when the rollback is an expected business outcome.
    fn is_rejection(&self) -> bool;
}

impl RollbackCause for ServiceError {
    fn is_rejection(&self) -> bool {
        !self.status_code().is_server_error()
    }
}

/// Runs `f` inside a transaction: commit on `Ok`, rollback on `Err`.
///
/// Errors returned by `f` come back unchanged; only connection-level
/// failures are converted through `From<DbErr>`.
///
/// ```rust,ignore
/// let batch = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let plan = plan.insert(txn).await?;
///         let batch = batch.insert(txn).await?;
///         Ok::<_, ServiceError>(batch)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, E>> + Send,
    T: Send,
    E: From<DbErr> + RollbackCause + std::error::Error + Send,
{
    let transaction_id = Uuid::new_v4();
    let start = std::time::Instant::now();

    debug!(transaction_id = %transaction_id, "Starting database transaction");
    counter!("sppg_db.transaction.started", 1);

    let result = db.transaction(f).await;

    let elapsed = start.elapsed();
    histogram!("sppg_db.transaction.duration", elapsed);

    match &result {
        Ok(_) => {
            counter!("sppg_db.transaction.committed", 1);
            debug!(transaction_id = %transaction_id, "Transaction committed in {:?}", elapsed);
        }
        Err(TransactionError::Transaction(err)) if err.is_rejection() => {
            counter!("sppg_db.transaction.rolled_back", 1, "cause" => "rejected");
            debug!(
                transaction_id = %transaction_id,
                error = %err,
                "Transaction rolled back after {:?}",
                elapsed
            );
        }
        Err(_) => {
            counter!("sppg_db.transaction.rolled_back", 1, "cause" => "failure");
            warn!(transaction_id = %transaction_id, "Transaction rolled back after {:?}", elapsed);
        }
    }

    result.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}
