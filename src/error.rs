//! Error types for the clipboard history store

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`HistoryStore`](crate::storage::HistoryStore) operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad path, permissions or options at open time; the store cannot start
    #[error("Configuration error: {0}")]
    Config(String),

    /// A durable read or write failed; the transaction was rolled back
    #[error("Transaction failed: {0}")]
    Transaction(#[from] redb::Error),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The storage handle could not be acquired in time
    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, &'static str),

    /// A stored key is not a valid 8-byte sequence id
    #[error("Corrupt key in {table}: expected 8 bytes, found {len}")]
    Corrupt { table: &'static str, len: usize },

    /// Every u64 sequence id has been issued
    #[error("Sequence id space exhausted")]
    SequenceExhausted,
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// True for the NotFound class
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// True for the Timeout class
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout(..))
    }
}

macro_rules! impl_from_redb {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for StoreError {
                fn from(err: $err) -> Self {
                    StoreError::Transaction(redb::Error::from(err))
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
