use super::*;
use tempfile::tempdir;

fn open_bpm(dir: &std::path::Path, pool_size: usize) -> BufferPoolManager {
    let disk = Arc::new(DiskManager::open(&dir.join("pool.db")).unwrap());
    BufferPoolManager::new(disk, pool_size, 2)
}

#[test]
fn new_page_is_zero_filled_and_pinned() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 4);

    let (page_id, content) = bpm.new_page().unwrap();
    assert!(content.read().iter().all(|&b| b == 0));

    // still pinned: deleting must fail
    assert!(bpm.delete_page(page_id).is_err());
}

#[test]
fn fetch_after_unpin_and_flush_sees_persisted_writes() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 4);

    let (page_id, content) = bpm.new_page().unwrap();
    content.write()[0] = 42;
    bpm.unpin_page(page_id, true).unwrap();
    bpm.flush_page(page_id).unwrap();

    let refetched = bpm.fetch_page(page_id).unwrap();
    assert_eq!(refetched.read()[0], 42);
    bpm.unpin_page(page_id, false).unwrap();
}

#[test]
fn eviction_writes_dirty_pages_before_reuse() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 1);

    let (page_a, content_a) = bpm.new_page().unwrap();
    content_a.write()[0] = 7;
    bpm.unpin_page(page_a, true).unwrap();

    // only one frame: allocating another page evicts page_a, flushing it.
    let (page_b, _content_b) = bpm.new_page().unwrap();
    bpm.unpin_page(page_b, false).unwrap();

    let refetched = bpm.fetch_page(page_a).unwrap();
    assert_eq!(refetched.read()[0], 7);
    bpm.unpin_page(page_a, false).unwrap();
}

#[test]
fn pool_exhaustion_when_everything_pinned() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 2);

    let (_p0, _c0) = bpm.new_page().unwrap();
    let (_p1, _c1) = bpm.new_page().unwrap();

    let err = bpm.new_page().unwrap_err();
    assert!(matches!(err, DbError::OutOfMemory(_)));
}

#[test]
fn unpinning_an_unpinned_page_is_an_error() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 2);

    let (page_id, _content) = bpm.new_page().unwrap();
    bpm.unpin_page(page_id, false).unwrap();

    let err = bpm.unpin_page(page_id, false).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

#[test]
fn delete_page_frees_its_frame_for_reuse() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 1);

    let (page_id, _content) = bpm.new_page().unwrap();
    bpm.unpin_page(page_id, false).unwrap();
    bpm.delete_page(page_id).unwrap();

    assert_eq!(bpm.resident_pages(), 0);
    let (_other, _c) = bpm.new_page().unwrap();
}

#[test]
fn flush_all_pages_persists_every_dirty_frame() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 4);

    let (page_a, content_a) = bpm.new_page().unwrap();
    content_a.write()[0] = 1;
    bpm.unpin_page(page_a, true).unwrap();

    let (page_b, content_b) = bpm.new_page().unwrap();
    content_b.write()[0] = 2;
    bpm.unpin_page(page_b, true).unwrap();

    bpm.flush_all_pages().unwrap();

    // Reopen against the same file to prove writes actually hit disk.
    let disk = Arc::new(DiskManager::open(&dir.path().join("pool.db")).unwrap());
    let reread_a = disk.read_page(page_a).unwrap();
    let reread_b = disk.read_page(page_b).unwrap();
    assert_eq!(reread_a[0], 1);
    assert_eq!(reread_b[0], 2);
}

#[test]
fn repeated_fetch_shares_the_same_frame() {
    let dir = tempdir().unwrap();
    let bpm = open_bpm(dir.path(), 4);

    let (page_id, _content) = bpm.new_page().unwrap();
    bpm.unpin_page(page_id, false).unwrap();

    let a = bpm.fetch_page(page_id).unwrap();
    let b = bpm.fetch_page(page_id).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    bpm.unpin_page(page_id, false).unwrap();
    bpm.unpin_page(page_id, false).unwrap();
}
