pub mod header_page;
pub mod heap_page;

use crate::storage::PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(pub u32);

/// In-band sentinel for "no page", the on-disk encoding of a missing link.
pub const INVALID_PAGE_ID: u32 = u32::MAX;

pub trait Page {
    fn page_id(&self) -> PageId;
    fn data(&self) -> &[u8; PAGE_SIZE];
    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE];
}

pub use header_page::HeaderPage;
pub use heap_page::{HeapPage, MAX_RECORD_SIZE};
