use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const PAGE_SIZE: usize = 4096;

/// A named file of fixed-size pages on the storage volume.
pub struct DiskManager {
    file: File,
}

impl DiskManager {
    /// Create a new page file. Fails if a file of that name already exists.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self { file })
    }

    /// Open an existing page file. Fails if the file is absent.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self { file })
    }

    /// Remove a page file from the volume. The file need not be open.
    pub fn destroy(path: &Path) -> StorageResult<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> StorageResult<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);

        let offset = Self::page_offset(page_id);
        let file_size = self.file.metadata()?.len();

        if offset >= file_size {
            return Err(StorageError::PageNotFound(page_id));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;

        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> StorageResult<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);

        let offset = Self::page_offset(page_id);
        let file_size = self.file.metadata()?.len();

        // Extend file if necessary
        if offset >= file_size {
            self.file.set_len(offset + PAGE_SIZE as u64)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_all()?;

        Ok(())
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / PAGE_SIZE as u64) as u32)
    }

    /// Extend the file by one page and return its number.
    pub fn allocate_page(&mut self) -> StorageResult<PageId> {
        let current_pages = self.num_pages()?;
        let new_page_id = PageId(current_pages);

        let new_size = (current_pages as u64 + 1) * PAGE_SIZE as u64;
        self.file.set_len(new_size)?;

        Ok(new_page_id)
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id.0 as u64 * PAGE_SIZE as u64
    }
}
