use crate::storage::page::PageId;
use std::cmp::Ordering;

/// Physical address of one record: (page number, slot number).
///
/// Stable until the record is deleted or its page reorganized; not a logical
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl Rid {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

impl PartialOrd for Rid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rid {
    fn cmp(&self, other: &Self) -> Ordering {
        // Page order first, slot order within a page
        match self.page_id.0.cmp(&other.page_id.0) {
            Ordering::Equal => self.slot_id.cmp(&other.slot_id),
            other => other,
        }
    }
}

/// One record pulled out of a heap file: its address plus an owned copy of
/// the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub rid: Rid,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(rid: Rid, data: Vec<u8>) -> Self {
        Self { rid, data }
    }
}
