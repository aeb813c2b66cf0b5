//! Predicate-filtered sequential scans over a heap file.

use crate::access::error::{HeapError, HeapResult};
use crate::access::heap::HeapFile;
use crate::access::predicate::Predicate;
use crate::access::record::{Record, Rid};
use crate::storage::page::PageId;
use std::path::Path;

/// Saved scan position: which page was pinned (if any) and the cursor RID.
#[derive(Debug, Clone, Copy)]
struct ScanMark {
    page_id: Option<PageId>,
    rid: Option<Rid>,
}

/// Forward scan over a heap file, yielding the RID of each record that
/// satisfies the filter, in chain order and ascending slot order.
///
/// The scan owns its heap-file handle and drives the handle's single-page
/// cursor: exactly one data page is pinned while the scan is mid-file, none
/// after it reports end of file. End of file is terminal for the scan until
/// `start_scan` restarts it or `reset_scan` rewinds to a bookmark.
pub struct HeapFileScan {
    file: HeapFile,
    filter: Option<Predicate>,
    mark: Option<ScanMark>,
    done: bool,
}

impl HeapFileScan {
    /// Open a heap file by name and wrap it in a scan.
    pub fn open(path: &Path) -> HeapResult<Self> {
        Ok(Self::new(HeapFile::open(path)?))
    }

    /// Wrap an already-open handle.
    pub fn new(file: HeapFile) -> Self {
        Self {
            file,
            filter: None,
            mark: None,
            done: false,
        }
    }

    /// Install the filter for subsequent `scan_next` calls; `None` matches
    /// every record. Restarts a scan that had reached end of file.
    ///
    /// Filter validation happens when the `Predicate` is built, so no
    /// invalid filter can ever be installed here.
    pub fn start_scan(&mut self, filter: Option<Predicate>) {
        self.filter = filter;
        self.done = false;
    }

    /// Advance to the next record satisfying the filter and return its RID.
    ///
    /// The first call positions on the file's first record; later calls
    /// resume after the record returned last. Exhausting the chain releases
    /// the cursor pin and yields `EndOfFile`, which repeats until the scan
    /// is restarted or reset.
    pub fn scan_next(&mut self) -> HeapResult<Rid> {
        if self.done {
            return Err(HeapError::EndOfFile);
        }

        let mut page_id;
        // Slot the page-local iteration resumes after; None means "before
        // the first slot" of the current page.
        let mut pos: Option<u16>;

        match self.file.cur_rid {
            Some(rid) => {
                page_id = rid.page_id;
                pos = Some(rid.slot_id);
                self.file.pin_current(page_id)?;
            }
            None => {
                // First call: position on the first page's first record
                page_id = self.file.first_page();
                self.file.pin_current(page_id)?;
                match self.file.with_current(|page| page.first_slot())? {
                    Some(slot_id) => {
                        let rid = Rid::new(page_id, slot_id);
                        self.file.cur_rid = Some(rid);
                        if self.matches_current(rid)? {
                            return Ok(rid);
                        }
                        pos = Some(slot_id);
                    }
                    None => return self.finish(),
                }
            }
        }

        loop {
            // Page-local iteration from the current position
            loop {
                let next = match pos {
                    Some(slot_id) => self.file.with_current(|page| page.next_slot(slot_id))?,
                    None => self.file.with_current(|page| page.first_slot())?,
                };
                match next {
                    Some(slot_id) => {
                        let rid = Rid::new(page_id, slot_id);
                        self.file.cur_rid = Some(rid);
                        if self.matches_current(rid)? {
                            return Ok(rid);
                        }
                        pos = Some(slot_id);
                    }
                    None => break,
                }
            }

            // Page exhausted: follow the chain link
            match self.file.with_current(|page| page.next_page_id())? {
                Some(next_page) => {
                    self.file.pin_current(next_page)?;
                    page_id = next_page;
                    pos = None;
                }
                None => return self.finish(),
            }
        }
    }

    /// Record at the current scan position. The page stays pinned.
    pub fn record(&mut self) -> HeapResult<Record> {
        let rid = self.file.cur_rid.ok_or(HeapError::NoCurrentRecord)?;
        let data = self
            .file
            .with_current(|page| page.get_record(rid.slot_id).map(<[u8]>::to_vec))??;
        Ok(Record::new(rid, data))
    }

    /// Delete the record at the current scan position. The cursor does not
    /// advance; the freed RID must not be looked up afterwards.
    pub fn delete_record(&mut self) -> HeapResult<()> {
        self.file.delete_current()
    }

    /// Force the current page dirty.
    pub fn mark_dirty(&mut self) {
        if let Some(cur) = &self.file.cur {
            cur.guard.mark_dirty();
        }
    }

    /// Bookmark the current scan position.
    pub fn mark_scan(&mut self) {
        self.mark = Some(ScanMark {
            page_id: self.file.cur.as_ref().map(|c| c.page_id),
            rid: self.file.cur_rid,
        });
    }

    /// Rewind to the bookmarked position. Re-pins the bookmarked page only
    /// if it differs from the one currently pinned; with no bookmark set
    /// this is a no-op.
    pub fn reset_scan(&mut self) -> HeapResult<()> {
        let Some(mark) = self.mark else {
            return Ok(());
        };

        match mark.page_id {
            Some(page_id) => self.file.pin_current(page_id)?,
            None => self.file.unpin_current(),
        }
        self.file.cur_rid = mark.rid;
        self.done = false;
        Ok(())
    }

    /// Release the cursor pin. Idempotent; the in-page cursor RID survives.
    pub fn end_scan(&mut self) {
        self.file.unpin_current();
    }

    /// Give back the underlying handle, releasing the cursor pin.
    pub fn into_file(mut self) -> HeapFile {
        self.file.unpin_current();
        self.file
    }

    /// Access the underlying handle, e.g. for counts.
    pub fn file_mut(&mut self) -> &mut HeapFile {
        &mut self.file
    }

    /// Close the scan and its heap file.
    pub fn close(self) -> HeapResult<()> {
        self.file.close()
    }

    fn matches_current(&mut self, rid: Rid) -> HeapResult<bool> {
        let Some(filter) = &self.filter else {
            return Ok(true);
        };
        let matched = self
            .file
            .with_current(|page| page.get_record(rid.slot_id).map(|rec| filter.matches(rec)))??;
        Ok(matched)
    }

    /// Terminal end-of-file: release the pin and clear the cursor.
    fn finish(&mut self) -> HeapResult<Rid> {
        self.file.unpin_current();
        self.file.cur_rid = None;
        self.done = true;
        Err(HeapError::EndOfFile)
    }
}

impl Iterator for HeapFileScan {
    type Item = HeapResult<Rid>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan_next() {
            Ok(rid) => Some(Ok(rid)),
            Err(HeapError::EndOfFile) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
