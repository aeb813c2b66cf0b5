//! Access layer error types.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by heap files and their scans.
#[derive(Error, Debug)]
pub enum HeapError {
    #[error("heap file already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid scan parameter")]
    BadScanParameter,

    #[error("record of {len} bytes exceeds maximum page payload of {max} bytes")]
    RecordTooLarge { len: usize, max: usize },

    #[error("scan reached end of file")]
    EndOfFile,

    #[error("no current record at the cursor")]
    NoCurrentRecord,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for heap-file operations.
pub type HeapResult<T> = Result<T, HeapError>;
