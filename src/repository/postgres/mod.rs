//! PostgreSQL store
//!
//! Status swaps are `UPDATE ... WHERE status = $expected`, so a concurrent
//! writer blocks on the row lock and then matches zero rows. Ledger
//! uniqueness is backed by partial unique indexes (see migrations).

mod inventory;
mod ledger;
mod reports;
mod requests;
mod users;

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres, Transaction};

use super::{StoreTransaction, TransitionStore};
use crate::error::{AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

pub struct PgTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl TransitionStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx: Some(tx) }))
    }
}

fn violates(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// Unique index hit: the business rule it backs was violated
fn unique_as_rejected(err: sqlx::Error, message: impl Into<String>) -> AppError {
    if violates(&err, UNIQUE_VIOLATION) {
        AppError::rejected(message, None)
    } else {
        err.into()
    }
}

fn foreign_key_as(err: sqlx::Error, mapped: impl FnOnce() -> AppError) -> AppError {
    if violates(&err, FOREIGN_KEY_VIOLATION) {
        mapped()
    } else {
        err.into()
    }
}
