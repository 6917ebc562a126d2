use crate::models::{Link, NewLink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::DatabaseErrorKind;
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryDb;
pub use postgres::PostgresDb;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    General(String),
    #[error("Duplicate Code Error")]
    DuplicateCode,
}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                DbError::DuplicateCode
            }
            _ => DbError::General(e.to_string()),
        }
    }
}

impl From<deadpool::managed::PoolError<diesel_async::pooled_connection::PoolError>> for DbError {
    fn from(e: deadpool::managed::PoolError<diesel_async::pooled_connection::PoolError>) -> Self {
        DbError::General(e.to_string())
    }
}

/// Storage for link records.
///
/// Implementations must enforce code uniqueness themselves (`create` returns
/// [`DbError::DuplicateCode`] when the code is taken, even if a concurrent
/// `exists` said otherwise) and must apply `increment_click` as one
/// indivisible update of `clicks` and `last_clicked`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinksDB: Send + Sync {
    /// All links, newest first.
    async fn list(&self) -> Result<Vec<Link>, DbError>;
    async fn get(&self, code: &str) -> Result<Option<Link>, DbError>;
    async fn create(&self, link: &NewLink) -> Result<Link, DbError>;
    /// Returns `false` if no link with `code` exists.
    async fn increment_click(&self, code: &str, at: DateTime<Utc>) -> Result<bool, DbError>;
    /// Returns `false` if no link with `code` exists.
    async fn delete(&self, code: &str) -> Result<bool, DbError>;
    async fn exists(&self, code: &str) -> Result<bool, DbError>;
}
