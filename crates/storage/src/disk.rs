//! Synchronous disk manager: the only component in this crate that is
//! allowed to call into the filesystem on behalf of the buffer pool.
//!
//! `DiskManager` hands out monotonically increasing page ids and performs
//! whole-page reads and writes against a single backing file. It has no
//! notion of what a page *contains* — that's the buffer pool's and the
//! B+Tree's business — and it does no caching of its own.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use common::{DbError, DbResult, PageId};

use crate::PAGE_SIZE;

/// Owns the single file backing a table or index's pages.
///
/// Safe to share across threads: all file access goes through the internal
/// `Mutex`, and page-id allocation uses an atomic counter so concurrent
/// callers never observe the same id twice.
#[derive(Debug)]
pub struct DiskManager {
    file: Mutex<File>,
    next_page_id: AtomicU64,
}

impl DiskManager {
    pub fn open(path: &Path) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        let next_page_id = len / PAGE_SIZE as u64;
        Ok(Self {
            file: Mutex::new(file),
            next_page_id: AtomicU64::new(next_page_id),
        })
    }

    /// Reserves the next page id. Does not touch the file; the id is only
    /// backed by disk once a write targets it.
    pub fn allocate_page(&self) -> DbResult<PageId> {
        let id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        Ok(PageId(id))
    }

    /// Reads a full page. Pages beyond the current end of file (including
    /// ones reserved by `allocate_page` but never written) read back as
    /// zero-filled, matching a freshly allocated page's initial contents.
    pub fn read_page(&self, page_id: PageId) -> DbResult<Vec<u8>> {
        let offset = page_id.0 * PAGE_SIZE as u64;
        let mut file = self
            .file
            .lock()
            .map_err(|_| DbError::Storage("disk manager file lock poisoned".into()))?;
        let file_len = file.metadata()?.len();

        let mut buf = vec![0u8; PAGE_SIZE];
        if offset >= file_len {
            return Ok(buf);
        }

        file.seek(SeekFrom::Start(offset))?;
        let available = (file_len - offset).min(PAGE_SIZE as u64) as usize;
        file.read_exact(&mut buf[..available])?;
        Ok(buf)
    }

    /// Writes a full page, extending the file (with an implicit zero-filled
    /// gap) if `page_id` lies past the current end of file. Synchronous:
    /// the write (and any gap it creates) is visible to the next read
    /// before this call returns.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> DbResult<()> {
        if data.len() != PAGE_SIZE {
            return Err(DbError::InvalidArgument(format!(
                "page payload must be exactly {PAGE_SIZE} bytes, got {}",
                data.len()
            )));
        }
        let offset = page_id.0 * PAGE_SIZE as u64;
        let mut file = self
            .file
            .lock()
            .map_err(|_| DbError::Storage("disk manager file lock poisoned".into()))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }
}
