use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("database query failed: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Flat key-value map holding JSON documents.
pub trait KvStore: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> StoreResult<()>;
    /// Writes `value` only if `key` is vacant. Returns whether the write happened.
    fn set_if_absent(&self, key: &str, value: Value) -> StoreResult<bool>;
    fn remove(&self, key: &str) -> StoreResult<()>;
    /// Values of all keys starting with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<Value>>;
}
