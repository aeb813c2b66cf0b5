//! Access layer: record-oriented operations over chained heap pages.
//!
//! - **HeapFile**: an open heap file; create/destroy/open/close, point
//!   lookup by RID, insertion with automatic page-chain growth
//! - **HeapFileScan**: predicate-filtered sequential scan with bookmarks
//! - **Predicate**: single-attribute comparison against a typed literal
//! - **Rid / Record**: physical record address and payload
//!
//! A handle keeps the header page pinned plus at most one data page as its
//! cursor; all cross-page movement goes through unpin-then-pin so the buffer
//! pool's pin accounting stays exact.

pub mod error;
pub mod heap;
pub mod predicate;
pub mod record;
pub mod scan;

pub use error::{HeapError, HeapResult};
pub use heap::HeapFile;
pub use predicate::{AttrType, CompareOp, FilterValue, Predicate};
pub use record::{Record, Rid};
pub use scan::HeapFileScan;
