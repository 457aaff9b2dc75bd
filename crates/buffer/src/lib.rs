//! Buffer pool manager: the only place pages move between disk and memory.
//!
//! A [`BufferPoolManager`] owns a fixed number of frames backed by a single
//! [`storage::DiskManager`]. One internal mutex protects the page table,
//! free list, replacer, and every frame's pin count and dirty flag; each
//! frame's byte content lives behind its own reader-writer lock so callers
//! can hold a page's content latch without blocking unrelated frames.
//!
//! Content locks use `parking_lot`'s owned (`Arc`-based) guards rather than
//! `std::sync::RwLock`'s borrow-scoped ones: latch crabbing needs to carry a
//! page's write latch across several stack frames of recursion (parent held
//! while a child is examined, then released once the child proves safe),
//! which a guard borrowing from a local variable cannot do.
//!
//! # Example
//!
//! ```no_run
//! use buffer::BufferPoolManager;
//! use std::sync::Arc;
//! use storage::DiskManager;
//!
//! let disk = Arc::new(DiskManager::open("/tmp/index.db".as_ref()).unwrap());
//! let bpm = BufferPoolManager::new(disk, 64, 2);
//!
//! let (page_id, content) = bpm.new_page().unwrap();
//! content.write()[0] = 42;
//! bpm.unpin_page(page_id, true).unwrap();
//! bpm.flush_page(page_id).unwrap();
//! ```

mod replacer;

#[cfg(test)]
mod tests;

use common::{DbError, DbResult, PageId};
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use replacer::{FrameId, LruKReplacer};
use std::collections::VecDeque;
use std::sync::Arc;
use storage::{DiskManager, PAGE_SIZE};

/// Shared handle to a frame's raw bytes. The content lock is acquired
/// independently of the buffer pool's internal mutex, so readers of one
/// page never block callers fetching or evicting a different page.
pub type PageContent = Arc<RwLock<Vec<u8>>>;
pub type PageReadGuard = parking_lot::ArcRwLockReadGuard<parking_lot::RawRwLock, Vec<u8>>;
pub type PageWriteGuard = parking_lot::ArcRwLockWriteGuard<parking_lot::RawRwLock, Vec<u8>>;

struct Inner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    frame_page_id: Vec<Option<PageId>>,
    pin_count: Vec<usize>,
    dirty: Vec<bool>,
    replacer: LruKReplacer,
}

/// Fixed-capacity cache of pages backed by a single [`DiskManager`].
///
/// Safe to share across threads via `Arc<BufferPoolManager>`: every method
/// takes `&self`.
pub struct BufferPoolManager {
    disk: Arc<DiskManager>,
    frames: Vec<PageContent>,
    inner: Mutex<Inner>,
}

impl BufferPoolManager {
    /// `pool_size` is the number of frames held resident; `replacer_k` is
    /// the look-back window for the LRU-K eviction policy.
    pub fn new(disk: Arc<DiskManager>, pool_size: usize, replacer_k: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        let frames = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(vec![0u8; PAGE_SIZE])))
            .collect();
        let inner = Inner {
            page_table: HashMap::new(),
            free_list: (0..pool_size).collect(),
            frame_page_id: vec![None; pool_size],
            pin_count: vec![0; pool_size],
            dirty: vec![false; pool_size],
            replacer: LruKReplacer::new(replacer_k),
        };
        Self {
            disk,
            frames,
            inner: Mutex::new(inner),
        }
    }

    /// Evicts a frame to make room, flushing its contents to disk first if
    /// dirty. Returns `None` if every frame is pinned.
    fn claim_frame(&self, inner: &mut Inner) -> DbResult<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }
        let Some(frame_id) = inner.replacer.evict() else {
            return Ok(None);
        };
        if let Some(old_page_id) = inner.frame_page_id[frame_id].take() {
            inner.page_table.remove(&old_page_id);
            if inner.dirty[frame_id] {
                let data = self.frames[frame_id].read();
                self.disk.write_page(old_page_id, &data)?;
            }
            inner.dirty[frame_id] = false;
        }
        Ok(Some(frame_id))
    }

    fn pin(&self, inner: &mut Inner, frame_id: FrameId) {
        inner.pin_count[frame_id] += 1;
        inner.replacer.record_access(frame_id);
        inner.replacer.set_evictable(frame_id, false);
    }

    /// Fetches a page into the buffer pool, pinning it, and returns a
    /// handle to its content lock. Reads from disk on a cache miss.
    pub fn fetch_page(&self, page_id: PageId) -> DbResult<PageContent> {
        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            self.pin(&mut inner, frame_id);
            return Ok(self.frames[frame_id].clone());
        }

        let Some(frame_id) = self.claim_frame(&mut inner)? else {
            tracing::warn!(?page_id, "buffer pool exhausted, every frame pinned");
            return Err(DbError::OutOfMemory(
                "no evictable frame to fetch a new page into".into(),
            ));
        };

        let data = self.disk.read_page(page_id)?;
        *self.frames[frame_id].write() = data;

        inner.frame_page_id[frame_id] = Some(page_id);
        inner.page_table.insert(page_id, frame_id);
        self.pin(&mut inner, frame_id);
        Ok(self.frames[frame_id].clone())
    }

    /// Allocates a fresh zero-filled page, pins it, and returns its id and
    /// content handle.
    pub fn new_page(&self) -> DbResult<(PageId, PageContent)> {
        let mut inner = self.inner.lock();
        let Some(frame_id) = self.claim_frame(&mut inner)? else {
            return Err(DbError::OutOfMemory(
                "no evictable frame to allocate a new page into".into(),
            ));
        };

        let page_id = self.disk.allocate_page()?;
        *self.frames[frame_id].write() = vec![0u8; PAGE_SIZE];

        inner.frame_page_id[frame_id] = Some(page_id);
        inner.page_table.insert(page_id, frame_id);
        self.pin(&mut inner, frame_id);
        Ok((page_id, self.frames[frame_id].clone()))
    }

    /// Unpins a page, optionally marking it dirty. Once the pin count
    /// drops to zero the frame becomes eligible for eviction.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> DbResult<()> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Err(DbError::InvalidArgument(format!(
                "page {} is not resident",
                page_id.0
            )));
        };
        if inner.pin_count[frame_id] == 0 {
            return Err(DbError::InvalidArgument(format!(
                "page {} is not pinned",
                page_id.0
            )));
        }
        if is_dirty {
            inner.dirty[frame_id] = true;
        }
        inner.pin_count[frame_id] -= 1;
        if inner.pin_count[frame_id] == 0 {
            inner.replacer.set_evictable(frame_id, true);
        }
        Ok(())
    }

    /// Writes a page's content to disk if dirty, leaving it resident.
    pub fn flush_page(&self, page_id: PageId) -> DbResult<()> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(());
        };
        if inner.dirty[frame_id] {
            let data = self.frames[frame_id].read();
            self.disk.write_page(page_id, &data)?;
            inner.dirty[frame_id] = false;
        }
        Ok(())
    }

    /// Flushes every resident dirty page.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let page_ids: Vec<PageId> = {
            let inner = self.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Removes a page from the buffer pool without persisting it. Fails if
    /// the page is currently pinned.
    pub fn delete_page(&self, page_id: PageId) -> DbResult<()> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(());
        };
        if inner.pin_count[frame_id] > 0 {
            return Err(DbError::InvalidArgument(format!(
                "page {} is pinned and cannot be deleted",
                page_id.0
            )));
        }
        inner.page_table.remove(&page_id);
        inner.frame_page_id[frame_id] = None;
        inner.dirty[frame_id] = false;
        inner.replacer.remove(frame_id);
        inner.free_list.push_back(frame_id);
        Ok(())
    }

    /// Number of frames currently resident (for tests and diagnostics).
    pub fn resident_pages(&self) -> usize {
        self.inner.lock().page_table.len()
    }
}
