use std::sync::Arc;

use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;

use medtag_db::repository::StoreError;

/// Shared handle to one database transaction.
///
/// All repositories created for a request clone the same executor, so every
/// statement of that request lands in one transaction and commits (or rolls
/// back) together. Dropping the last clone without calling [`commit`]
/// (Executor::commit) rolls the transaction back — the behaviour tests rely
/// on for isolation.
#[derive(Clone)]
pub struct Executor {
    pub tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Executor {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub async fn commit(&self) -> Result<(), StoreError> {
        let mut tx = self.tx.lock().await;
        match tx.take() {
            Some(transaction) => transaction
                .commit()
                .await
                .map_err(|e| StoreError::Backend(e.into())),
            None => Err(consumed()),
        }
    }

    pub async fn rollback(&self) -> Result<(), StoreError> {
        let mut tx = self.tx.lock().await;
        match tx.take() {
            Some(transaction) => transaction
                .rollback()
                .await
                .map_err(|e| StoreError::Backend(e.into())),
            None => Err(consumed()),
        }
    }
}

/// Error for operations arriving after commit/rollback took the transaction.
pub fn consumed() -> StoreError {
    StoreError::Backend("transaction has been consumed".into())
}
