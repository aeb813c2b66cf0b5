//! Storage layer error types.

use crate::storage::page::PageId;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("record not found: slot {slot_id} is empty or deleted")]
    RecordNotFound { slot_id: u16 },

    #[error("invalid slot id: {slot_id} (max: {max_slot})")]
    InvalidSlotId { slot_id: u16, max_slot: u16 },

    #[error("page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("buffer pool is full: cannot allocate new frame")]
    BufferPoolFull,

    #[error("page not found: {0:?}")]
    PageNotFound(PageId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
