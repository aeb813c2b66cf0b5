use crate::storage::page::{Page, PageId};
use crate::storage::PAGE_SIZE;

const FIRST_PAGE_OFFSET: usize = 0;
const LAST_PAGE_OFFSET: usize = 4;
const PAGE_COUNT_OFFSET: usize = 8;
const RECORD_COUNT_OFFSET: usize = 12;
const NAME_LEN_OFFSET: usize = 16;
const NAME_OFFSET: usize = 18;

/// The file name stored in the header is diagnostic only; longer names are
/// truncated.
const MAX_NAME_LEN: usize = 64;

/// The first physical page of a heap file: chain bounds and counts.
///
/// A typed view over a raw page buffer. The header page is pinned for the
/// whole lifetime of an open heap-file handle, so one view is cheap to
/// recreate per access.
pub struct HeaderPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> HeaderPage<'a> {
    /// Initialize a fresh header page for a one-data-page file.
    pub fn new(data: &'a mut [u8; PAGE_SIZE], first_data_page: PageId, name: &str) -> Self {
        let mut header = Self { data };
        header.set_first_page(first_data_page);
        header.set_last_page(first_data_page);
        header.set_page_count(1);
        header.set_record_count(0);
        header.set_file_name(name);
        header
    }

    /// View an already-initialized header page.
    pub fn from_data(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    pub fn first_page(&self) -> PageId {
        PageId(self.read_u32(FIRST_PAGE_OFFSET))
    }

    pub fn set_first_page(&mut self, page_id: PageId) {
        self.write_u32(FIRST_PAGE_OFFSET, page_id.0);
    }

    pub fn last_page(&self) -> PageId {
        PageId(self.read_u32(LAST_PAGE_OFFSET))
    }

    pub fn set_last_page(&mut self, page_id: PageId) {
        self.write_u32(LAST_PAGE_OFFSET, page_id.0);
    }

    pub fn page_count(&self) -> u32 {
        self.read_u32(PAGE_COUNT_OFFSET)
    }

    pub fn set_page_count(&mut self, count: u32) {
        self.write_u32(PAGE_COUNT_OFFSET, count);
    }

    pub fn record_count(&self) -> u32 {
        self.read_u32(RECORD_COUNT_OFFSET)
    }

    pub fn set_record_count(&mut self, count: u32) {
        self.write_u32(RECORD_COUNT_OFFSET, count);
    }

    pub fn file_name(&self) -> String {
        let len = u16::from_le_bytes([self.data[NAME_LEN_OFFSET], self.data[NAME_LEN_OFFSET + 1]])
            as usize;
        String::from_utf8_lossy(&self.data[NAME_OFFSET..NAME_OFFSET + len]).into_owned()
    }

    fn set_file_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);
        self.data[NAME_LEN_OFFSET..NAME_LEN_OFFSET + 2]
            .copy_from_slice(&(len as u16).to_le_bytes());
        self.data[NAME_OFFSET..NAME_OFFSET + len].copy_from_slice(&bytes[..len]);
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl<'a> Page for HeaderPage<'a> {
    fn page_id(&self) -> PageId {
        // The header always lives on the file's first physical page
        PageId(0)
    }

    fn data(&self) -> &[u8; PAGE_SIZE] {
        self.data
    }

    fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.data
    }
}
