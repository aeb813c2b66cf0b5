pub mod lru;
pub mod replacer;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{DiskManager, PageId, PAGE_SIZE};
use dashmap::DashMap;
use log::warn;
use parking_lot::{Mutex, RwLock};
use replacer::{FrameId, Replacer};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

struct Frame {
    data: Box<[u8; PAGE_SIZE]>,
    page_id: Option<PageId>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
            page_id: None,
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    fn reset(&mut self) {
        self.page_id = None;
        self.pin_count.store(0, Ordering::SeqCst);
        self.is_dirty.store(false, Ordering::SeqCst);
        self.data.fill(0);
    }
}

/// Page cache over one disk file.
///
/// Every page access pins a frame and hands back a guard; dropping the guard
/// is the only way to release the pin, so use-after-unpin and double-unpin
/// cannot be expressed. A frame's dirty bit is set through the write guard
/// and stays set until the page is flushed (eagerly via `flush_*`, or lazily
/// at eviction / pool drop).
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    page_table: DashMap<PageId, FrameId>,
    frames: RwLock<HashMap<FrameId, Frame>>,
    replacer: Mutex<Box<dyn Replacer>>,
    disk: Mutex<DiskManager>,
    next_frame_id: AtomicU32,
    max_frames: usize,
}

impl BufferPool {
    pub fn new(disk: DiskManager, replacer: Box<dyn Replacer>, max_frames: usize) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                page_table: DashMap::new(),
                frames: RwLock::new(HashMap::with_capacity(max_frames)),
                replacer: Mutex::new(replacer),
                disk: Mutex::new(disk),
                next_frame_id: AtomicU32::new(0),
                max_frames,
            }),
        }
    }

    /// Pin an existing page for reading.
    pub fn fetch_page(&self, page_id: PageId) -> StorageResult<PageReadGuard> {
        let frame_id = self.pin_frame(page_id)?;

        let frames = self.inner.frames.read();
        let frame = frames.get(&frame_id).ok_or(StorageError::PageNotFound(page_id))?;
        let data = frame.data.as_ref() as *const [u8; PAGE_SIZE];

        Ok(PageReadGuard {
            inner: self.inner.clone(),
            frame_id,
            data,
        })
    }

    /// Pin an existing page for mutation. The guard starts clean; callers
    /// mark it dirty when they actually modify the page.
    pub fn fetch_page_write(&self, page_id: PageId) -> StorageResult<PageWriteGuard> {
        let frame_id = self.pin_frame(page_id)?;

        let mut frames = self.inner.frames.write();
        let frame = frames
            .get_mut(&frame_id)
            .ok_or(StorageError::PageNotFound(page_id))?;
        let data = frame.data.as_mut() as *mut [u8; PAGE_SIZE];
        drop(frames);

        Ok(PageWriteGuard {
            inner: self.inner.clone(),
            frame_id,
            data,
        })
    }

    /// Allocate a fresh page and pin it. The frame is zero-filled and starts
    /// dirty: even an untouched new page must reach disk.
    pub fn new_page(&self) -> StorageResult<(PageId, PageWriteGuard)> {
        let frame_id = self.get_frame()?;

        let page_id = {
            let mut disk = self.inner.disk.lock();
            disk.allocate_page()?
        };

        let mut frames = self.inner.frames.write();
        let frame = frames
            .get_mut(&frame_id)
            .ok_or(StorageError::PageNotFound(page_id))?;
        frame.reset();
        frame.page_id = Some(page_id);
        frame.pin_count.store(1, Ordering::SeqCst);
        frame.is_dirty.store(true, Ordering::SeqCst);

        self.inner.page_table.insert(page_id, frame_id);
        self.inner.replacer.lock().pin(frame_id);

        let data = frame.data.as_mut() as *mut [u8; PAGE_SIZE];
        drop(frames);

        Ok((
            page_id,
            PageWriteGuard {
                inner: self.inner.clone(),
                frame_id,
                data,
            },
        ))
    }

    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        if let Some(frame_id) = self.inner.page_table.get(&page_id).map(|e| *e.value()) {
            let frames = self.inner.frames.read();
            if let Some(frame) = frames.get(&frame_id) {
                if frame.is_dirty.load(Ordering::SeqCst) {
                    let mut disk = self.inner.disk.lock();
                    disk.write_page(page_id, frame.data.as_ref())?;
                    frame.is_dirty.store(false, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }

    /// Force every dirty page of the file to backing storage.
    pub fn flush_all(&self) -> StorageResult<()> {
        self.inner.flush_all()
    }

    /// Find or load the page's frame and take a pin on it.
    fn pin_frame(&self, page_id: PageId) -> StorageResult<FrameId> {
        // Already resident?
        if let Some(frame_id) = self.inner.page_table.get(&page_id).map(|e| *e.value()) {
            let frames = self.inner.frames.read();
            if let Some(frame) = frames.get(&frame_id) {
                frame.pin_count.fetch_add(1, Ordering::SeqCst);
                self.inner.replacer.lock().pin(frame_id);
                return Ok(frame_id);
            }
        }

        // Load from disk into a free frame
        let frame_id = self.get_frame()?;
        {
            let mut disk = self.inner.disk.lock();
            let mut frames = self.inner.frames.write();
            let frame = frames
                .get_mut(&frame_id)
                .ok_or(StorageError::PageNotFound(page_id))?;

            if let Err(e) = disk.read_page(page_id, frame.data.as_mut()) {
                frame.reset();
                drop(frames);
                self.inner.replacer.lock().unpin(frame_id);
                return Err(e);
            }
            frame.page_id = Some(page_id);
            frame.pin_count.store(1, Ordering::SeqCst);
            frame.is_dirty.store(false, Ordering::SeqCst);
        }

        self.inner.page_table.insert(page_id, frame_id);
        self.inner.replacer.lock().pin(frame_id);
        Ok(frame_id)
    }

    fn get_frame(&self) -> StorageResult<FrameId> {
        // Grow the pool while under the frame budget
        {
            let frames = self.inner.frames.read();
            if frames.len() < self.inner.max_frames {
                drop(frames);
                let mut frames = self.inner.frames.write();
                if frames.len() < self.inner.max_frames {
                    let frame_id = self.inner.next_frame_id.fetch_add(1, Ordering::SeqCst);
                    frames.insert(frame_id, Frame::new());
                    return Ok(frame_id);
                }
            }
        }

        // At budget: evict an unpinned frame
        let evict_frame_id = {
            let mut replacer = self.inner.replacer.lock();
            replacer.evict().ok_or(StorageError::BufferPoolFull)?
        };

        let (old_page_id, is_dirty, data) = {
            let frames = self.inner.frames.read();
            match frames.get(&evict_frame_id) {
                Some(frame) => (
                    frame.page_id,
                    frame.is_dirty.load(Ordering::SeqCst),
                    frame.data.clone(),
                ),
                None => return Ok(evict_frame_id),
            }
        };

        // Write back the victim before reuse
        if let Some(page_id) = old_page_id {
            if is_dirty {
                let mut disk = self.inner.disk.lock();
                disk.write_page(page_id, data.as_ref())?;
            }
            self.inner.page_table.remove(&page_id);
        }

        {
            let mut frames = self.inner.frames.write();
            if let Some(frame) = frames.get_mut(&evict_frame_id) {
                frame.reset();
            }
        }

        Ok(evict_frame_id)
    }
}

impl BufferPoolInner {
    fn flush_all(&self) -> StorageResult<()> {
        let frames = self.frames.read();
        let mut disk = self.disk.lock();

        for frame in frames.values() {
            if let Some(page_id) = frame.page_id {
                if frame.is_dirty.load(Ordering::SeqCst) {
                    disk.write_page(page_id, frame.data.as_ref())?;
                    frame.is_dirty.store(false, Ordering::SeqCst);
                }
            }
        }

        Ok(())
    }

    fn unpin(&self, frame_id: FrameId) {
        let should_unpin = {
            let frames = self.frames.read();
            match frames.get(&frame_id) {
                Some(frame) => frame.pin_count.fetch_sub(1, Ordering::SeqCst) == 1,
                None => false,
            }
        };

        if should_unpin {
            self.replacer.lock().unpin(frame_id);
        }
    }

    fn mark_dirty(&self, frame_id: FrameId) {
        let frames = self.frames.read();
        if let Some(frame) = frames.get(&frame_id) {
            frame.is_dirty.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for BufferPoolInner {
    fn drop(&mut self) {
        // Runs after every guard is gone. Teardown is best-effort: report the
        // failure, keep the process going.
        if let Err(e) = self.flush_all() {
            warn!("buffer pool dropped with unflushed pages: {}", e);
        }
    }
}

/// Read pin on one cached page; dropping it releases the pin.
pub struct PageReadGuard {
    inner: Arc<BufferPoolInner>,
    frame_id: FrameId,
    data: *const [u8; PAGE_SIZE],
}

impl Deref for PageReadGuard {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.data }
    }
}

impl Drop for PageReadGuard {
    fn drop(&mut self) {
        self.inner.unpin(self.frame_id);
    }
}

/// Write pin on one cached page.
///
/// Fetched clean; `mark_dirty` records that the page was mutated and is
/// sticky until the page is flushed. Dropping the guard releases the pin with
/// whatever dirty state was declared.
pub struct PageWriteGuard {
    inner: Arc<BufferPoolInner>,
    frame_id: FrameId,
    data: *mut [u8; PAGE_SIZE],
}

impl PageWriteGuard {
    pub fn mark_dirty(&self) {
        self.inner.mark_dirty(self.frame_id);
    }
}

impl Deref for PageWriteGuard {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.data }
    }
}

impl DerefMut for PageWriteGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.data }
    }
}

impl Drop for PageWriteGuard {
    fn drop(&mut self) {
        self.inner.unpin(self.frame_id);
    }
}

// The raw page pointers stay valid for the guard's lifetime because the pin
// prevents eviction of the frame they point into.
unsafe impl Send for PageReadGuard {}
unsafe impl Sync for PageReadGuard {}
unsafe impl Send for PageWriteGuard {}
unsafe impl Sync for PageWriteGuard {}
