use crate::access::error::{HeapError, HeapResult};
use crate::access::record::{Record, Rid};
use crate::storage::buffer::lru::LruReplacer;
use crate::storage::buffer::{BufferPool, PageWriteGuard};
use crate::storage::page::{HeaderPage, HeapPage, PageId, MAX_RECORD_SIZE};
use crate::storage::{DiskManager, StorageError};
use log::{info, warn};
use std::path::Path;

/// The header always occupies the file's first physical page.
const HEADER_PAGE_ID: PageId = PageId(0);

/// Frame budget for the pool a handle builds for itself. A handle keeps at
/// most two pages pinned (header + cursor), so a small pool suffices.
const DEFAULT_POOL_FRAMES: usize = 16;

pub(crate) struct PinnedPage {
    pub(crate) page_id: PageId,
    pub(crate) guard: PageWriteGuard,
}

/// An open heap file: a chain of slotted data pages behind a header page.
///
/// The handle keeps the header pinned for its whole lifetime and at most one
/// data page pinned as the cursor. Every page access goes through the buffer
/// pool; pins are released by dropping guards, dirty state is declared
/// explicitly at the mutation site.
pub struct HeapFile {
    pool: BufferPool,
    header: PageWriteGuard,
    pub(crate) cur: Option<PinnedPage>,
    pub(crate) cur_rid: Option<Rid>,
}

impl HeapFile {
    /// Create a new, empty heap file: a header page plus one initialized
    /// data page, flushed to disk.
    ///
    /// Fails with `AlreadyExists` if a file of that name is openable. On a
    /// later allocation failure the partially created file is left behind;
    /// no rollback is attempted.
    pub fn create(path: &Path) -> HeapResult<()> {
        if DiskManager::open(path).is_ok() {
            return Err(HeapError::AlreadyExists(path.display().to_string()));
        }

        let disk = DiskManager::create(path)?;
        let pool = BufferPool::new(
            disk,
            Box::new(LruReplacer::new(DEFAULT_POOL_FRAMES)),
            DEFAULT_POOL_FRAMES,
        );

        let (header_page_id, mut header_guard) = pool.new_page()?;
        debug_assert_eq!(header_page_id, HEADER_PAGE_ID);

        let (data_page_id, mut data_guard) = pool.new_page()?;
        HeapPage::new(&mut data_guard, data_page_id);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        HeaderPage::new(&mut header_guard, data_page_id, &name);

        // Freshly allocated pages are already dirty; dropping the guards
        // unpins them and the flush persists the empty file
        drop(data_guard);
        drop(header_guard);
        pool.flush_all()?;

        info!("created heap file {}", path.display());
        Ok(())
    }

    /// Remove a heap file from the storage volume. The file need not be
    /// open; no heap-level invariants are checked.
    pub fn destroy(path: &Path) -> HeapResult<()> {
        DiskManager::destroy(path)?;
        Ok(())
    }

    /// Open an existing heap file, pinning its header page and its first
    /// data page.
    pub fn open(path: &Path) -> HeapResult<Self> {
        let disk = DiskManager::open(path)?;
        let pool = BufferPool::new(
            disk,
            Box::new(LruReplacer::new(DEFAULT_POOL_FRAMES)),
            DEFAULT_POOL_FRAMES,
        );
        let file = Self::open_with_pool(pool)?;
        info!("opened heap file {}", path.display());
        Ok(file)
    }

    /// Open over a caller-supplied buffer pool.
    pub fn open_with_pool(pool: BufferPool) -> HeapResult<Self> {
        let mut header = pool.fetch_page_write(HEADER_PAGE_ID)?;
        let first_page = HeaderPage::from_data(&mut header).first_page();

        let guard = pool.fetch_page_write(first_page)?;
        Ok(Self {
            pool,
            header,
            cur: Some(PinnedPage {
                page_id: first_page,
                guard,
            }),
            cur_rid: None,
        })
    }

    /// Close the handle: release the cursor and header pins and flush.
    ///
    /// Teardown is best-effort; a flush failure is reported but the pins are
    /// released regardless when the handle drops.
    pub fn close(mut self) -> HeapResult<()> {
        self.cur = None;
        self.cur_rid = None;
        if let Err(e) = self.pool.flush_all() {
            warn!("flush during heap file close failed: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Number of live records in the file.
    pub fn record_count(&mut self) -> u32 {
        HeaderPage::from_data(&mut self.header).record_count()
    }

    /// Number of data pages in the file.
    pub fn page_count(&mut self) -> u32 {
        HeaderPage::from_data(&mut self.header).page_count()
    }

    /// Name recorded in the header at creation; diagnostic only.
    pub fn file_name(&mut self) -> String {
        HeaderPage::from_data(&mut self.header).file_name()
    }

    pub(crate) fn first_page(&mut self) -> PageId {
        HeaderPage::from_data(&mut self.header).first_page()
    }

    pub(crate) fn last_page(&mut self) -> PageId {
        HeaderPage::from_data(&mut self.header).last_page()
    }

    /// Fetch the record at `rid`, moving the cursor to its page.
    ///
    /// If the page is already pinned no re-pin happens; otherwise the old
    /// cursor pin is released first, honoring the one-pin discipline.
    pub fn get_record(&mut self, rid: Rid) -> HeapResult<Record> {
        self.pin_current(rid.page_id)?;

        let Some(cur) = self.cur.as_mut() else {
            return Err(StorageError::PageNotFound(rid.page_id).into());
        };
        let page = HeapPage::from_data(&mut cur.guard);
        let data = page.get_record(rid.slot_id)?.to_vec();

        self.cur_rid = Some(rid);
        Ok(Record::new(rid, data))
    }

    /// Insert a record, appending a page to the chain when the last page is
    /// out of space.
    pub fn insert_record(&mut self, record: &[u8]) -> HeapResult<Rid> {
        // A record that can never fit on any page fails before any page is
        // touched
        if record.len() > MAX_RECORD_SIZE {
            return Err(HeapError::RecordTooLarge {
                len: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        // Inserts always target the chain's last page; linking a fresh page
        // behind any earlier page would orphan the rest of the chain
        let last = self.last_page();
        self.pin_current(last)?;

        let (page_id, result) = {
            let Some(cur) = self.cur.as_mut() else {
                return Err(HeapError::NoCurrentRecord);
            };
            let mut page = HeapPage::from_data(&mut cur.guard);
            let result = page.insert_record(record);
            if result.is_ok() {
                cur.guard.mark_dirty();
            }
            (cur.page_id, result)
        };

        match result {
            Ok(slot_id) => {
                self.increment_record_count();
                Ok(Rid::new(page_id, slot_id))
            }
            Err(StorageError::PageFull { .. }) => self.insert_with_overflow(record),
            Err(e) => Err(e.into()),
        }
    }

    /// Overflow path: append a fresh page, link it behind the full current
    /// page, and retry the insert exactly once.
    fn insert_with_overflow(&mut self, record: &[u8]) -> HeapResult<Rid> {
        let (new_page_id, mut new_guard) = self.pool.new_page()?;
        HeapPage::new(&mut new_guard, new_page_id);

        // Link the full page to the new one, then release its pin
        if let Some(cur) = self.cur.as_mut() {
            let mut page = HeapPage::from_data(&mut cur.guard);
            page.set_next_page_id(Some(new_page_id));
            cur.guard.mark_dirty();
        }
        self.cur = None;

        let mut page = HeapPage::from_data(&mut new_guard);
        let slot_id = match page.insert_record(record) {
            Ok(slot_id) => slot_id,
            Err(e) => {
                // A second failure on an empty page is fatal for this
                // insert; drop the pin and leave the cursor unset
                drop(new_guard);
                self.cur_rid = None;
                return Err(e.into());
            }
        };
        self.cur = Some(PinnedPage {
            page_id: new_page_id,
            guard: new_guard,
        });

        // The appended page is now the chain's last page
        {
            let mut header = HeaderPage::from_data(&mut self.header);
            header.set_last_page(new_page_id);
            let pages = header.page_count();
            header.set_page_count(pages + 1);
        }
        self.header.mark_dirty();
        self.increment_record_count();

        Ok(Rid::new(new_page_id, slot_id))
    }

    /// Delete the record at the cursor RID and decrement the live count.
    /// The cursor does not advance.
    pub(crate) fn delete_current(&mut self) -> HeapResult<()> {
        let Some(rid) = self.cur_rid else {
            return Err(HeapError::NoCurrentRecord);
        };
        let Some(cur) = self.cur.as_mut() else {
            return Err(HeapError::NoCurrentRecord);
        };
        debug_assert_eq!(cur.page_id, rid.page_id);

        let mut page = HeapPage::from_data(&mut cur.guard);
        page.delete_record(rid.slot_id)?;
        cur.guard.mark_dirty();

        self.decrement_record_count();
        Ok(())
    }

    /// Make `page_id` the current page. A no-op when it already is; any
    /// other pinned page is released before the new pin is taken, and the
    /// fresh pin starts clean.
    pub(crate) fn pin_current(&mut self, page_id: PageId) -> HeapResult<()> {
        if let Some(cur) = &self.cur {
            if cur.page_id == page_id {
                return Ok(());
            }
        }

        // Unpin before re-pinning a different page
        self.cur = None;
        let guard = self.pool.fetch_page_write(page_id)?;
        self.cur = Some(PinnedPage { page_id, guard });
        Ok(())
    }

    /// Release the cursor pin, if any.
    pub(crate) fn unpin_current(&mut self) {
        self.cur = None;
    }

    /// Run `f` against a view of the current page.
    pub(crate) fn with_current<R>(&mut self, f: impl FnOnce(&HeapPage) -> R) -> HeapResult<R> {
        match self.cur.as_mut() {
            Some(cur) => {
                let page = HeapPage::from_data(&mut cur.guard);
                Ok(f(&page))
            }
            None => Err(HeapError::NoCurrentRecord),
        }
    }

    fn increment_record_count(&mut self) {
        {
            let mut header = HeaderPage::from_data(&mut self.header);
            let count = header.record_count();
            header.set_record_count(count + 1);
        }
        self.header.mark_dirty();
    }

    fn decrement_record_count(&mut self) {
        {
            let mut header = HeaderPage::from_data(&mut self.header);
            let count = header.record_count();
            header.set_record_count(count.saturating_sub(1));
        }
        self.header.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    fn create_test_file(name: &str) -> Result<(TempDir, std::path::PathBuf)> {
        let dir = tempdir()?;
        let path = dir.path().join(name);
        HeapFile::create(&path)?;
        Ok((dir, path))
    }

    #[test]
    fn test_create_then_open_empty_file() -> Result<()> {
        let (_dir, path) = create_test_file("empty.tbl")?;

        let mut file = HeapFile::open(&path)?;
        assert_eq!(file.record_count(), 0);
        assert_eq!(file.page_count(), 1);
        assert_eq!(file.first_page(), file.last_page());
        assert_eq!(file.file_name(), "empty.tbl");

        Ok(())
    }

    #[test]
    fn test_create_existing_file_fails() -> Result<()> {
        let (_dir, path) = create_test_file("dup.tbl")?;

        assert!(matches!(
            HeapFile::create(&path),
            Err(HeapError::AlreadyExists(_))
        ));

        Ok(())
    }

    #[test]
    fn test_destroy_then_open_fails() -> Result<()> {
        let (_dir, path) = create_test_file("gone.tbl")?;

        HeapFile::destroy(&path)?;
        assert!(HeapFile::open(&path).is_err());

        Ok(())
    }

    #[test]
    fn test_open_nonexistent_fails() -> Result<()> {
        let dir = tempdir()?;
        assert!(HeapFile::open(&dir.path().join("missing.tbl")).is_err());

        Ok(())
    }

    #[test]
    fn test_insert_and_get_round_trip() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;
        let mut file = HeapFile::open(&path)?;

        let data = b"Hello, World!";
        let rid = file.insert_record(data)?;

        let record = file.get_record(rid)?;
        assert_eq!(record.data, data);
        assert_eq!(record.rid, rid);
        assert_eq!(file.record_count(), 1);

        Ok(())
    }

    #[test]
    fn test_multiple_inserts_same_page() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;
        let mut file = HeapFile::open(&path)?;

        let rid1 = file.insert_record(b"first")?;
        let rid2 = file.insert_record(b"second")?;
        let rid3 = file.insert_record(b"third")?;

        assert_eq!(rid1.page_id, rid2.page_id);
        assert_eq!(rid2.page_id, rid3.page_id);
        assert_ne!(rid1.slot_id, rid2.slot_id);

        assert_eq!(file.get_record(rid1)?.data, b"first");
        assert_eq!(file.get_record(rid2)?.data, b"second");
        assert_eq!(file.get_record(rid3)?.data, b"third");
        assert_eq!(file.record_count(), 3);

        Ok(())
    }

    #[test]
    fn test_get_record_switches_pages() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;
        let mut file = HeapFile::open(&path)?;

        // Fill past one page so records land on two different pages
        let payload = vec![0xAB; 1000];
        let mut rids = Vec::new();
        for _ in 0..8 {
            rids.push(file.insert_record(&payload)?);
        }
        let first = rids.first().copied().unwrap();
        let last = rids.last().copied().unwrap();
        assert_ne!(first.page_id, last.page_id);

        // Alternate lookups across the page boundary
        assert_eq!(file.get_record(first)?.data, payload);
        assert_eq!(file.get_record(last)?.data, payload);
        assert_eq!(file.get_record(first)?.data, payload);

        Ok(())
    }

    #[test]
    fn test_get_deleted_record_fails() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;
        let mut file = HeapFile::open(&path)?;

        let rid = file.insert_record(b"doomed")?;
        file.get_record(rid)?;
        file.delete_current()?;

        assert!(matches!(
            file.get_record(rid),
            Err(HeapError::Storage(StorageError::RecordNotFound { .. }))
        ));
        assert_eq!(file.record_count(), 0);

        Ok(())
    }

    #[test]
    fn test_record_too_large_rejected() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;
        let mut file = HeapFile::open(&path)?;

        let oversized = vec![0u8; MAX_RECORD_SIZE + 1];
        assert!(matches!(
            file.insert_record(&oversized),
            Err(HeapError::RecordTooLarge { .. })
        ));
        assert_eq!(file.record_count(), 0);

        // The maximum size itself is accepted
        let exact = vec![7u8; MAX_RECORD_SIZE];
        let rid = file.insert_record(&exact)?;
        assert_eq!(file.get_record(rid)?.data, exact);

        Ok(())
    }

    #[test]
    fn test_overflow_extends_chain() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;
        let mut file = HeapFile::open(&path)?;

        let payload = vec![0xCD; 1000];
        let mut rids = Vec::new();
        for _ in 0..16 {
            rids.push(file.insert_record(&payload)?);
        }

        let pages_used: std::collections::BTreeSet<_> =
            rids.iter().map(|r| r.page_id.0).collect();
        assert!(pages_used.len() > 1);
        assert_eq!(file.page_count() as usize, pages_used.len());

        // Last page of the header is the page of the last insert, and its
        // link terminates the chain
        let last_rid = *rids.last().unwrap();
        assert_eq!(file.last_page(), last_rid.page_id);
        file.pin_current(last_rid.page_id)?;
        assert_eq!(file.with_current(|p| p.next_page_id())?, None);

        // Everything is still addressable
        for rid in rids {
            assert_eq!(file.get_record(rid)?.data, payload);
        }

        Ok(())
    }

    #[test]
    fn test_insert_after_reopen_targets_last_page() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;

        let payload = vec![1u8; 1000];
        {
            let mut file = HeapFile::open(&path)?;
            for _ in 0..8 {
                file.insert_record(&payload)?;
            }
            file.close()?;
        }

        let mut file = HeapFile::open(&path)?;
        let before_pages = file.page_count();
        let rid = file.insert_record(b"small")?;
        assert_eq!(rid.page_id, file.last_page());
        assert_eq!(file.page_count(), before_pages);

        Ok(())
    }

    #[test]
    fn test_counts_persist_across_close() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;

        {
            let mut file = HeapFile::open(&path)?;
            for i in 0..10u8 {
                file.insert_record(&[i; 16])?;
            }
            file.close()?;
        }

        let mut file = HeapFile::open(&path)?;
        assert_eq!(file.record_count(), 10);

        Ok(())
    }

    #[test]
    fn test_drop_without_close_still_persists() -> Result<()> {
        let (_dir, path) = create_test_file("t.tbl")?;

        {
            let mut file = HeapFile::open(&path)?;
            file.insert_record(b"kept")?;
            // handle dropped without close(); the pool flushes on drop
        }

        let mut file = HeapFile::open(&path)?;
        assert_eq!(file.record_count(), 1);

        Ok(())
    }
}
