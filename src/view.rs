//! Buffer views: offset+length windows over a shared backing store.

use crate::codec::{base64, text, unpack};
use crate::error::{Error, Result};
use crate::memory::{MapSource, MappedRegion, Storage};
use rustix::mm::{MapFlags, ProtFlags};
use std::sync::Arc;

/// A byte-range window into a shared backing store.
///
/// This is cheap to clone (just Arc increment + copy of offset/len). Every
/// clone and slice holds one reference to the backing store; the store is
/// released, and a mapped store unmapped, exactly when the last of them goes
/// away.
///
/// # Zero-Copy
///
/// Slicing never copies bytes and never re-maps memory. A slice of a slice
/// composes offsets, so arbitrarily nested windows stay flat references into
/// the one allocation.
///
/// # Aliasing
///
/// The bytes behind a view are a shared, mutable resource: any sibling view
/// over the same store may mutate overlapping ranges, and no isolation is
/// provided between them. Hosts serialize concurrent mutation externally.
///
/// # Example
///
/// ```rust
/// use mapbuf::view::BufferView;
///
/// let view = BufferView::map_anonymous(4096).unwrap();
/// view.ascii_write("hello", 0).unwrap();
///
/// let window = view.slice(0, 5).unwrap();
/// assert_eq!(window.ascii_slice(0, 5).unwrap(), "hello");
/// ```
#[derive(Clone)]
pub struct BufferView {
    /// The backing store.
    storage: Arc<dyn Storage>,
    /// Offset of this window within the store.
    offset: usize,
    /// Length of this window.
    len: usize,
}

impl BufferView {
    /// Create a root view over a fresh OS mapping.
    ///
    /// The view spans the whole mapping. Arguments go to the mapping syscall
    /// verbatim; see [`MappedRegion::map`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Map`] with the OS error code if the mapping fails.
    pub fn map(
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        source: MapSource<'_>,
        offset: u64,
    ) -> Result<Self> {
        let region = MappedRegion::map(len, prot, flags, source, offset)?;
        Ok(Self::from_storage(Arc::new(region)))
    }

    /// Create a root view over a private anonymous read/write mapping.
    pub fn map_anonymous(len: usize) -> Result<Self> {
        Self::map(
            len,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::PRIVATE,
            MapSource::Anonymous,
            0,
        )
    }

    /// Create a root view spanning an existing storage.
    pub fn from_storage(storage: Arc<dyn Storage>) -> Self {
        let len = storage.len();
        Self {
            storage,
            offset: 0,
            len,
        }
    }

    /// Create a view of `[start, end)` of this view.
    ///
    /// The new view shares this view's backing store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] unless `start <= end <= self.len()`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len {
            return Err(Error::Range {
                start,
                end,
                len: self.len,
            });
        }
        Ok(Self {
            storage: Arc::clone(&self.storage),
            offset: self.offset + start,
            len: end - start,
        })
    }

    /// Length of this view's window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if this view has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this window within the backing store.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Get a pointer to the start of this view's window.
    ///
    /// Valid exactly as long as any view over the same backing store is
    /// alive.
    pub fn as_ptr(&self) -> *const u8 {
        unsafe { self.storage.as_ptr().add(self.offset) }
    }

    /// Get a mutable pointer to the start of this view's window.
    ///
    /// Returns `None` if the backing store is write-protected.
    pub fn as_mut_ptr(&self) -> Option<*mut u8> {
        self.storage
            .as_mut_ptr()
            .map(|ptr| unsafe { ptr.add(self.offset) })
    }

    /// Get this view's window as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// Get this view's window as a mutable byte slice.
    ///
    /// Returns `None` if the backing store is write-protected.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        self.as_mut_ptr()
            .map(|ptr| unsafe { std::slice::from_raw_parts_mut(ptr, self.len) })
    }

    /// Number of live references to this view's backing store, this one
    /// included.
    pub fn storage_ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Check whether `other` windows into the same backing store.
    pub fn shares_storage_with(&self, other: &BufferView) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Flush modified bytes to the object backing the store, if any.
    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    /// Pre-fault the backing store so later accesses do not page-fault.
    pub fn prefault(&self) {
        self.storage.prefault();
    }

    /// Bytes of `[start, end)`, range-checked against this window.
    fn checked_range(&self, start: usize, end: usize) -> Result<&[u8]> {
        if start > end || end > self.len {
            return Err(Error::Range {
                start,
                end,
                len: self.len,
            });
        }
        Ok(&self.as_slice()[start..end])
    }

    /// Mutable window over `[offset, len)`.
    ///
    /// Callers must have checked `offset <= self.len` already. Aliasing
    /// between sibling views is the caller's concern (see the type docs).
    #[allow(clippy::mut_from_ref)]
    fn writable_window(&self, offset: usize) -> Result<&mut [u8]> {
        let ptr = self.storage.as_mut_ptr().ok_or(Error::WriteProtected)?;
        // SAFETY: offset <= self.len and offset + len <= storage.len() by
        // construction, so the window stays inside the allocation.
        Ok(unsafe {
            std::slice::from_raw_parts_mut(ptr.add(self.offset + offset), self.len - offset)
        })
    }

    // ------------------------------------------------------------------
    // Encoding-aware reads
    // ------------------------------------------------------------------

    /// Decode `[start, end)` byte-for-byte into text.
    pub fn binary_slice(&self, start: usize, end: usize) -> Result<String> {
        Ok(text::decode_latin1(self.checked_range(start, end)?))
    }

    /// Decode `[start, end)` byte-for-byte into text.
    pub fn ascii_slice(&self, start: usize, end: usize) -> Result<String> {
        Ok(text::decode_latin1(self.checked_range(start, end)?))
    }

    /// Decode `[start, end)` as UTF-8, replacing invalid sequences.
    pub fn utf8_slice(&self, start: usize, end: usize) -> Result<String> {
        Ok(text::decode_utf8_lossy(self.checked_range(start, end)?))
    }

    /// Encode `[start, end)` as base64 text.
    ///
    /// Output length is `ceil(n/3)*4` for `n = end - start`.
    pub fn base64_slice(&self, start: usize, end: usize) -> Result<String> {
        Ok(base64::encode(self.checked_range(start, end)?))
    }

    // ------------------------------------------------------------------
    // Encoding-aware writes
    // ------------------------------------------------------------------

    /// Write `text` as UTF-8 starting at `offset`.
    ///
    /// Writes as many whole characters as fit and returns the byte count; a
    /// multi-byte character is never split at the window end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Offset`] when `text` is non-empty and `offset` is
    /// past the window, [`Error::WriteProtected`] on a read-only store.
    pub fn utf8_write(&self, text: &str, offset: usize) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        if offset >= self.len {
            return Err(Error::Offset {
                offset,
                len: self.len,
            });
        }
        Ok(text::write_utf8(text, self.writable_window(offset)?))
    }

    /// Write `text` one byte per character starting at `offset`.
    ///
    /// Each character contributes its low byte. Returns the byte count,
    /// clamped to the space left in the window.
    ///
    /// # Errors
    ///
    /// Same bounds rules as [`BufferView::utf8_write`].
    pub fn ascii_write(&self, text: &str, offset: usize) -> Result<usize> {
        self.write_latin1(text, offset)
    }

    /// Write `text` one byte per character starting at `offset`, with no
    /// re-encoding.
    ///
    /// # Errors
    ///
    /// Same bounds rules as [`BufferView::utf8_write`].
    pub fn binary_write(&self, text: &str, offset: usize) -> Result<usize> {
        self.write_latin1(text, offset)
    }

    fn write_latin1(&self, text: &str, offset: usize) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        if offset >= self.len {
            return Err(Error::Offset {
                offset,
                len: self.len,
            });
        }
        Ok(text::write_latin1(text, self.writable_window(offset)?))
    }

    /// Decode base64 `text` into raw bytes starting at `offset`.
    ///
    /// The decoded size is computed up front and the whole write refused if
    /// it does not fit; nothing is ever silently truncated and no byte is
    /// written before validation passes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Offset`] when `offset` is past the window,
    /// [`Error::BufferTooSmall`] when the decoded payload exceeds the space
    /// after `offset`, [`Error::WriteProtected`] on a read-only store.
    pub fn base64_write(&self, text: &str, offset: usize) -> Result<usize> {
        if offset > self.len {
            return Err(Error::Offset {
                offset,
                len: self.len,
            });
        }
        let needed = base64::decoded_len(text.as_bytes());
        let available = self.len - offset;
        if needed > available {
            return Err(Error::BufferTooSmall { needed, available });
        }
        if needed == 0 {
            return Ok(0);
        }
        Ok(base64::decode_into(text.as_bytes(), self.writable_window(offset)?))
    }

    /// Decode fixed-width network-order fields starting at `index`.
    ///
    /// See [`unpack`](crate::codec::unpack::unpack) for the format characters.
    pub fn unpack(&self, format: &str, index: usize) -> Result<Vec<u32>> {
        unpack::unpack(self.as_slice(), format, index)
    }

    // ------------------------------------------------------------------
    // Copy
    // ------------------------------------------------------------------

    /// Copy `[source_start, source_end)` of this view into `target` at
    /// `target_start`.
    ///
    /// The byte count actually copied is `min(source_end - source_start,
    /// target.len() - target_start)`; a source range larger than the space
    /// left in the target is clamped, never an error. When both views share
    /// one backing store the transfer is overlap-safe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] when `source_end < source_start` or the
    /// source range leaves this view, [`Error::Offset`] when either start
    /// position is out of bounds, [`Error::WriteProtected`] on a read-only
    /// target. `source_start == source_end` is valid and copies zero bytes.
    pub fn copy_to(
        &self,
        target: &BufferView,
        target_start: usize,
        source_start: usize,
        source_end: usize,
    ) -> Result<usize> {
        if source_end < source_start {
            return Err(Error::Range {
                start: source_start,
                end: source_end,
                len: self.len,
            });
        }

        // Copy 0 bytes; we're done
        if source_end == source_start {
            return Ok(0);
        }

        if target_start >= target.len {
            return Err(Error::Offset {
                offset: target_start,
                len: target.len,
            });
        }
        if source_start >= self.len {
            return Err(Error::Offset {
                offset: source_start,
                len: self.len,
            });
        }
        if source_end > self.len {
            return Err(Error::Range {
                start: source_start,
                end: source_end,
                len: self.len,
            });
        }

        let to_copy = (source_end - source_start).min(target.len - target_start);
        let dst = target.storage.as_mut_ptr().ok_or(Error::WriteProtected)?;

        // SAFETY: both ranges were bounds-checked against their windows, and
        // a window stays inside its storage by construction.
        unsafe {
            let src = self.as_ptr().add(source_start);
            let dst = dst.add(target.offset + target_start);
            if self.shares_storage_with(target) {
                // ranges may overlap inside one store
                std::ptr::copy(src, dst, to_copy);
            } else {
                std::ptr::copy_nonoverlapping(src, dst, to_copy);
            }
        }

        Ok(to_copy)
    }
}

impl std::fmt::Debug for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("storage_refs", &self.storage_ref_count())
            .finish()
    }
}
