//! Integration tests for mapping, slicing, reference counting, and copies.

use mapbuf::error::Error;
use mapbuf::memory::{page_size, HeapStorage, MapSource, Storage};
use mapbuf::view::BufferView;
use mapbuf::{MapFlags, ProtFlags};
use std::fs;
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mapbuf-test-{}-{}", name, std::process::id()))
}

/// Storage wrapper that records the moment it is released.
struct DropTracked {
    data: HeapStorage,
    dropped: Arc<AtomicBool>,
}

impl DropTracked {
    fn new(size: usize) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Self {
                data: HeapStorage::new(size),
                dropped: Arc::clone(&dropped),
            },
            dropped,
        )
    }
}

impl Storage for DropTracked {
    fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    fn as_mut_ptr(&self) -> Option<*mut u8> {
        self.data.as_mut_ptr()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

impl Drop for DropTracked {
    fn drop(&mut self) {
        let released_before = self.dropped.swap(true, Ordering::SeqCst);
        assert!(!released_before, "backing store released twice");
    }
}

// ============================================================================
// Mapping
// ============================================================================

#[test]
fn test_map_anonymous_is_zero_filled() {
    let view = BufferView::map_anonymous(4096).unwrap();
    assert_eq!(view.len(), 4096);
    assert!(view.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn test_map_zero_length_fails_with_einval() {
    let err = BufferView::map_anonymous(0).unwrap_err();
    assert_eq!(err.os_error(), Some(rustix::io::Errno::INVAL.raw_os_error()));
}

#[test]
fn test_map_file_backed() {
    let path = temp_path("file-backed");
    fs::write(&path, b"file contents here").unwrap();

    let file = fs::File::open(&path).unwrap();
    let view = BufferView::map(
        18,
        ProtFlags::READ,
        MapFlags::SHARED,
        MapSource::File(file.as_fd()),
        0,
    )
    .unwrap();

    assert_eq!(view.as_slice(), b"file contents here");

    drop(view);
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_map_misaligned_offset_fails_with_einval() {
    let path = temp_path("misaligned");
    fs::write(&path, vec![0u8; page_size() * 2]).unwrap();

    let file = fs::File::open(&path).unwrap();
    let err = BufferView::map(
        page_size(),
        ProtFlags::READ,
        MapFlags::SHARED,
        MapSource::File(file.as_fd()),
        1,
    )
    .unwrap_err();

    assert_eq!(err.os_error(), Some(rustix::io::Errno::INVAL.raw_os_error()));

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_map_page_aligned_offset() {
    let path = temp_path("page-offset");
    let mut contents = vec![b'a'; page_size()];
    contents.extend_from_slice(&vec![b'b'; page_size()]);
    fs::write(&path, &contents).unwrap();

    let file = fs::File::open(&path).unwrap();
    let view = BufferView::map(
        page_size(),
        ProtFlags::READ,
        MapFlags::SHARED,
        MapSource::File(file.as_fd()),
        page_size() as u64,
    )
    .unwrap();

    assert!(view.as_slice().iter().all(|&b| b == b'b'));

    drop(view);
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_shared_mapping_writes_reach_the_file() {
    let path = temp_path("write-through");
    fs::write(&path, vec![0u8; page_size()]).unwrap();

    let file = fs::File::options()
        .read(true)
        .write(true)
        .open(&path)
        .unwrap();
    let view = BufferView::map(
        page_size(),
        ProtFlags::READ | ProtFlags::WRITE,
        MapFlags::SHARED,
        MapSource::File(file.as_fd()),
        0,
    )
    .unwrap();

    view.ascii_write("persisted", 0).unwrap();
    view.sync().unwrap();

    let contents = fs::read(&path).unwrap();
    assert_eq!(&contents[..9], b"persisted");

    drop(view);
    fs::remove_file(&path).unwrap();
}

// ============================================================================
// Slicing
// ============================================================================

#[test]
fn test_slice_sees_parent_bytes() {
    let view = BufferView::map_anonymous(4096).unwrap();
    view.ascii_write("abcdefgh", 0).unwrap();

    for (start, end) in [(0, 8), (2, 6), (0, 0), (8, 8), (3, 3)] {
        let slice = view.slice(start, end).unwrap();
        assert_eq!(slice.len(), end - start);
        assert_eq!(slice.as_slice(), &view.as_slice()[start..end]);
    }
}

#[test]
fn test_slice_of_slice_flattens() {
    let view = BufferView::map_anonymous(4096).unwrap();
    view.ascii_write("abcdefgh", 0).unwrap();

    let outer = view.slice(2, 8).unwrap();
    let inner = outer.slice(1, 4).unwrap();
    assert_eq!(inner.as_slice(), b"def");
    assert_eq!(inner.offset(), 3);
}

#[test]
fn test_slice_start_past_end_is_a_range_error() {
    let view = BufferView::map_anonymous(4096).unwrap();
    match view.slice(10, 5) {
        Err(Error::Range {
            start: 10,
            end: 5,
            ..
        }) => {}
        other => panic!("expected Range, got {other:?}"),
    }
}

#[test]
fn test_mutation_is_visible_through_siblings() {
    let view = BufferView::map_anonymous(4096).unwrap();
    let sibling = view.slice(0, 16).unwrap();

    view.ascii_write("shared bytes", 0).unwrap();
    assert_eq!(sibling.ascii_slice(0, 12).unwrap(), "shared bytes");
}

// ============================================================================
// Reference counting and release
// ============================================================================

#[test]
fn test_store_released_when_last_view_drops() {
    let (storage, dropped) = DropTracked::new(64);
    let view = BufferView::from_storage(Arc::new(storage));

    let slice = view.slice(0, 32).unwrap();
    let clone = view.clone();
    assert_eq!(view.storage_ref_count(), 3);

    drop(view);
    assert!(!dropped.load(Ordering::SeqCst));

    drop(clone);
    assert!(!dropped.load(Ordering::SeqCst));
    assert_eq!(slice.storage_ref_count(), 1);

    drop(slice);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn test_slice_outlives_parent() {
    let parent = BufferView::map_anonymous(4096).unwrap();
    parent.ascii_write("outlived", 0).unwrap();

    let slice = parent.slice(0, 8).unwrap();
    drop(parent);

    // the mapping is still alive through the slice
    assert_eq!(slice.ascii_slice(0, 8).unwrap(), "outlived");
}

// ============================================================================
// Copy
// ============================================================================

#[test]
fn test_copy_between_stores() {
    let source = BufferView::map_anonymous(4096).unwrap();
    let target = BufferView::map_anonymous(4096).unwrap();
    source.ascii_write("payload", 0).unwrap();

    let copied = source.copy_to(&target, 100, 0, 7).unwrap();
    assert_eq!(copied, 7);
    assert_eq!(target.ascii_slice(100, 107).unwrap(), "payload");
}

#[test]
fn test_copy_zero_bytes_is_a_noop() {
    let source = BufferView::map_anonymous(4096).unwrap();
    let target = BufferView::map_anonymous(4096).unwrap();

    assert_eq!(source.copy_to(&target, 0, 5, 5).unwrap(), 0);
    // the no-op wins even where a start bound would otherwise be rejected
    assert_eq!(source.copy_to(&target, 9999, 5, 5).unwrap(), 0);
}

#[test]
fn test_copy_clamps_to_target_space() {
    let source = BufferView::map_anonymous(4096).unwrap();
    let target = BufferView::map_anonymous(4096).unwrap();
    source.ascii_write("abcdefgh", 0).unwrap();

    let window = target.slice(0, 4).unwrap();
    let copied = source.copy_to(&window, 2, 0, 8).unwrap();
    assert_eq!(copied, 2);
    assert_eq!(window.ascii_slice(0, 4).unwrap(), "\0\0ab");
}

#[test]
fn test_copy_overlapping_ranges_in_one_store() {
    let view = BufferView::map_anonymous(4096).unwrap();
    view.ascii_write("abcdef", 0).unwrap();

    // forward overlap: [0, 4) onto 2
    let copied = view.copy_to(&view, 2, 0, 4).unwrap();
    assert_eq!(copied, 4);
    assert_eq!(view.ascii_slice(0, 6).unwrap(), "ababcd");
}

#[test]
fn test_copy_overlap_through_sibling_slices() {
    let view = BufferView::map_anonymous(4096).unwrap();
    view.ascii_write("0123456789", 0).unwrap();

    let source = view.slice(0, 8).unwrap();
    let target = view.slice(3, 10).unwrap();
    assert!(source.shares_storage_with(&target));

    // behaves as if the source had been fully read before any write
    let copied = source.copy_to(&target, 0, 0, 6).unwrap();
    assert_eq!(copied, 6);
    assert_eq!(view.ascii_slice(0, 10).unwrap(), "0120123459");
}

#[test]
fn test_copy_bounds_errors() {
    let source = BufferView::map_anonymous(64).unwrap();
    let target = BufferView::map_anonymous(64).unwrap();

    assert!(matches!(
        source.copy_to(&target, 0, 5, 2),
        Err(Error::Range { .. })
    ));
    assert!(matches!(
        source.copy_to(&target, 64, 0, 4),
        Err(Error::Offset { offset: 64, .. })
    ));
    assert!(matches!(
        source.copy_to(&target, 0, 64, 65),
        Err(Error::Offset { offset: 64, .. })
    ));
    assert!(matches!(
        source.copy_to(&target, 0, 60, 65),
        Err(Error::Range { .. })
    ));
}

// ============================================================================
// Write protection
// ============================================================================

#[test]
fn test_read_only_mapping_rejects_writes() {
    let view = BufferView::map(
        4096,
        ProtFlags::READ,
        MapFlags::PRIVATE,
        MapSource::Anonymous,
        0,
    )
    .unwrap();

    assert!(view.as_mut_ptr().is_none());
    assert!(matches!(
        view.ascii_write("nope", 0),
        Err(Error::WriteProtected)
    ));

    let source = BufferView::map_anonymous(64).unwrap();
    assert!(matches!(
        source.copy_to(&view, 0, 0, 4),
        Err(Error::WriteProtected)
    ));

    // reads still work
    assert_eq!(view.ascii_slice(0, 4).unwrap(), "\0\0\0\0");
}
