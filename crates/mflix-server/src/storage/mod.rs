//! Storage layer
//!
//! Persons live either in SQLite (embedded) or in a lock-guarded in-memory
//! list, selected at startup. Movies always live in SQLite.

pub mod db;
pub mod memory;

pub use db::Database;
pub use memory::MemoryStore;

use async_trait::async_trait;
use mflix_types::{Person, PersonInput, PersonPatch};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("a record with email {0} already exists")]
    DuplicateEmail(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Person persistence backend
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// Insert one record; rejects a duplicate email.
    async fn insert(&self, input: PersonInput) -> StoreResult<Person>;

    /// Insert a batch, all-or-nothing.
    async fn insert_many(&self, inputs: Vec<PersonInput>) -> StoreResult<usize>;

    async fn get(&self, id: &str) -> StoreResult<Option<Person>>;

    async fn list(&self) -> StoreResult<Vec<Person>>;

    /// Full-field overwrite keyed by id.
    async fn update(&self, id: &str, input: PersonInput) -> StoreResult<()>;

    /// Partial merge keyed by email; empty incoming fields leave stored values.
    async fn merge(&self, email: &str, patch: PersonPatch) -> StoreResult<Person>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn delete_by_email(&self, email: &str) -> StoreResult<()>;

    /// Remove every record, returning how many were deleted.
    async fn clear(&self) -> StoreResult<u64>;

    /// Case-insensitive substring match over name or email.
    /// An empty query returns the full set.
    async fn search(&self, query: &str) -> StoreResult<Vec<Person>>;

    async fn count(&self) -> StoreResult<u64>;
}
