use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId, INVALID_PAGE_ID};
use crate::storage::PAGE_SIZE;

// Header structure (16 bytes)
const HEADER_SIZE: usize = 16;
const PAGE_ID_OFFSET: usize = 0;
const NEXT_PAGE_OFFSET: usize = 4;
const FREE_SPACE_POINTER_OFFSET: usize = 12;
const SLOT_COUNT_OFFSET: usize = 14;

// Slot size (4 bytes: 2 for offset, 2 for length)
const SLOT_SIZE: usize = 4;

/// Largest record payload any page can ever hold: a whole page minus the
/// header and the one slot the record needs. Independent of current free
/// space.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - HEADER_SIZE - SLOT_SIZE;

/// Slotted page for variable-length records.
///
/// Records grow forward from the header, the slot directory grows backward
/// from the page tail. A deleted slot keeps its directory entry (zeroed) so
/// slot numbers of surviving records stay stable. The header also carries the
/// link to the next page of the chain.
pub struct HeapPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> HeapPage<'a> {
    /// Initialize a fresh page's internal structure.
    pub fn new(data: &'a mut [u8; PAGE_SIZE], page_id: PageId) -> Self {
        data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&page_id.0.to_le_bytes());
        data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 4]
            .copy_from_slice(&INVALID_PAGE_ID.to_le_bytes());

        // Free space starts right after the header
        let free_space_pointer = HEADER_SIZE as u16;
        data[FREE_SPACE_POINTER_OFFSET..FREE_SPACE_POINTER_OFFSET + 2]
            .copy_from_slice(&free_space_pointer.to_le_bytes());

        data[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 2].copy_from_slice(&0u16.to_le_bytes());

        Self { data }
    }

    /// View an already-initialized page.
    pub fn from_data(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    pub fn insert_record(&mut self, record: &[u8]) -> StorageResult<u16> {
        let record_size = record.len();
        let slot_count = self.slot_count();
        let free_space_pointer = self.free_space_pointer();

        let required = Self::required_space_for(record_size);
        let available = self.free_space();
        if available < required {
            return Err(StorageError::PageFull {
                required,
                available,
            });
        }

        // Write record payload
        let record_offset = free_space_pointer;
        self.data[record_offset as usize..record_offset as usize + record_size]
            .copy_from_slice(record);
        self.set_free_space_pointer(record_offset + record_size as u16);

        // Append slot entry
        let slot_offset = PAGE_SIZE - ((slot_count + 1) as usize * SLOT_SIZE);
        self.data[slot_offset..slot_offset + 2].copy_from_slice(&record_offset.to_le_bytes());
        self.data[slot_offset + 2..slot_offset + 4]
            .copy_from_slice(&(record_size as u16).to_le_bytes());

        self.set_slot_count(slot_count + 1);

        Ok(slot_count)
    }

    pub fn get_record(&self, slot_id: u16) -> StorageResult<&[u8]> {
        let (offset, length) = self.slot(slot_id)?;
        match (offset, length) {
            (0, 0) => Err(StorageError::RecordNotFound { slot_id }),
            _ => Ok(&self.data[offset as usize..(offset + length) as usize]),
        }
    }

    pub fn delete_record(&mut self, slot_id: u16) -> StorageResult<()> {
        let (offset, length) = self.slot(slot_id)?;
        if offset == 0 && length == 0 {
            return Err(StorageError::RecordNotFound { slot_id });
        }

        // Mark slot as deleted; the payload bytes stay dead until the page
        // is reinitialized
        let slot_offset = PAGE_SIZE - ((slot_id + 1) as usize * SLOT_SIZE);
        self.data[slot_offset..slot_offset + 4].fill(0);

        Ok(())
    }

    /// First occupied slot, if the page holds any live record.
    pub fn first_slot(&self) -> Option<u16> {
        (0..self.slot_count()).find(|&slot_id| !self.slot_is_deleted(slot_id))
    }

    /// Next occupied slot after the given one.
    pub fn next_slot(&self, after: u16) -> Option<u16> {
        (after + 1..self.slot_count()).find(|&slot_id| !self.slot_is_deleted(slot_id))
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        let raw = u32::from_le_bytes([
            self.data[NEXT_PAGE_OFFSET],
            self.data[NEXT_PAGE_OFFSET + 1],
            self.data[NEXT_PAGE_OFFSET + 2],
            self.data[NEXT_PAGE_OFFSET + 3],
        ]);
        if raw == INVALID_PAGE_ID {
            None
        } else {
            Some(PageId(raw))
        }
    }

    pub fn set_next_page_id(&mut self, next: Option<PageId>) {
        let raw = next.map_or(INVALID_PAGE_ID, |p| p.0);
        self.data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 4].copy_from_slice(&raw.to_le_bytes());
    }

    pub fn free_space(&self) -> usize {
        let free_space_pointer = self.free_space_pointer();
        let slot_array_start = PAGE_SIZE - (self.slot_count() as usize * SLOT_SIZE);

        slot_array_start.saturating_sub(free_space_pointer as usize)
    }

    /// Space an insert of `record_len` bytes consumes: payload plus one slot.
    pub fn required_space_for(record_len: usize) -> usize {
        record_len + SLOT_SIZE
    }

    /// Number of slot directory entries, live or deleted.
    pub fn slot_count(&self) -> u16 {
        u16::from_le_bytes([
            self.data[SLOT_COUNT_OFFSET],
            self.data[SLOT_COUNT_OFFSET + 1],
        ])
    }

    fn slot(&self, slot_id: u16) -> StorageResult<(u16, u16)> {
        let slot_count = self.slot_count();
        if slot_id >= slot_count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: slot_count,
            });
        }

        let slot_offset = PAGE_SIZE - ((slot_id + 1) as usize * SLOT_SIZE);
        let offset = u16::from_le_bytes([self.data[slot_offset], self.data[slot_offset + 1]]);
        let length = u16::from_le_bytes([self.data[slot_offset + 2], self.data[slot_offset + 3]]);
        Ok((offset, length))
    }

    fn slot_is_deleted(&self, slot_id: u16) -> bool {
        matches!(self.slot(slot_id), Ok((0, 0)))
    }

    fn free_space_pointer(&self) -> u16 {
        u16::from_le_bytes([
            self.data[FREE_SPACE_POINTER_OFFSET],
            self.data[FREE_SPACE_POINTER_OFFSET + 1],
        ])
    }

    fn set_free_space_pointer(&mut self, pointer: u16) {
        self.data[FREE_SPACE_POINTER_OFFSET..FREE_SPACE_POINTER_OFFSET + 2]
            .copy_from_slice(&pointer.to_le_bytes());
    }

    fn set_slot_count(&mut self, count: u16) {
        self.data[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 2].copy_from_slice(&count.to_le_bytes());
    }
}

impl<'a> Page for HeapPage<'a> {
    fn page_id(&self) -> PageId {
        let bytes = [
            self.data[PAGE_ID_OFFSET],
            self.data[PAGE_ID_OFFSET + 1],
            self.data[PAGE_ID_OFFSET + 2],
            self.data[PAGE_ID_OFFSET + 3],
        ];
        PageId(u32::from_le_bytes(bytes))
    }

    fn data(&self) -> &[u8; PAGE_SIZE] {
        self.data
    }

    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.data
    }
}
