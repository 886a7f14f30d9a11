//! Backing-allocation trait.

use crate::error::Result;

/// Trait for allocations that can back buffer views.
///
/// A storage is a contiguous region of bytes. The canonical implementation is
/// [`MappedRegion`](super::MappedRegion), but any raw allocation qualifies;
/// views only ever see the pointer/length pair exposed here.
///
/// # Safety
///
/// Implementations must ensure that:
/// - Pointers remain valid for the lifetime of the storage
/// - Thread-safety requirements are met (Send + Sync)
pub trait Storage: Send + Sync {
    /// Get a raw pointer to the start of this storage.
    fn as_ptr(&self) -> *const u8;

    /// Get a mutable pointer to the start of this storage.
    ///
    /// Returns `None` if the storage is write-protected.
    fn as_mut_ptr(&self) -> Option<*mut u8>;

    /// Total size of the storage in bytes.
    fn len(&self) -> usize;

    /// Returns true if the storage has zero length.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush modified bytes to the object backing the storage, if any.
    ///
    /// A no-op for storages with nothing behind them (heap allocations,
    /// anonymous mappings).
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Pre-fault the storage so later accesses do not page-fault.
    ///
    /// A no-op for storages that are already resident.
    fn prefault(&self) {}

    /// Get the storage as a byte slice.
    ///
    /// # Safety
    ///
    /// The caller must ensure no mutable references exist to this memory.
    unsafe fn as_slice(&self) -> &[u8] {
        // SAFETY: Caller guarantees no mutable references exist.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len()) }
    }

    /// Get the storage as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The caller must ensure exclusive access to this memory. This returns a
    /// mutable reference from `&self` because the underlying bytes may be
    /// mutable even when the storage handle is shared; callers must ensure
    /// proper synchronization.
    #[allow(clippy::mut_from_ref)]
    unsafe fn as_mut_slice(&self) -> Option<&mut [u8]> {
        // SAFETY: Caller guarantees exclusive access.
        self.as_mut_ptr()
            .map(|ptr| unsafe { std::slice::from_raw_parts_mut(ptr, self.len()) })
    }
}
