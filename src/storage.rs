//! Storage layer: the collaborators the heap-file engine is built on.
//!
//! - **DiskManager**: a named file of fixed-size pages, the basic unit of I/O
//! - **BufferPool**: in-memory page cache with pin counting, dirty tracking
//!   and LRU eviction; pins are held through scoped guards
//! - **HeapPage**: slotted page format for variable-length records, carrying
//!   the next-page link that chains data pages into a file
//! - **HeaderPage**: the file's first physical page, holding chain bounds and
//!   record/page counts
//!
//! The access layer above drives everything through these types; nothing here
//! knows about predicates, scans or record identity.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, PageReadGuard, PageWriteGuard};
pub use disk::{DiskManager, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeaderPage, HeapPage, Page, PageId};
