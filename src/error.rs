//! Error types for mapbuf.

use rustix::io::Errno;
use thiserror::Error;

/// Result type alias using mapbuf's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mapbuf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The mmap syscall failed.
    #[error("mmap failed: {0}")]
    Map(#[source] Errno),

    /// The munmap syscall failed during teardown.
    ///
    /// This variant is never returned from an operation: unmapping happens in
    /// a destruction path with no caller, so the failure is reported through
    /// the `tracing` sink in this representation instead.
    #[error("munmap failed: {0}")]
    Unmap(#[source] Errno),

    /// A requested byte range violates a view's bounds.
    #[error("range [{start}, {end}) is invalid for a view of length {len}")]
    Range {
        /// Start of the requested range.
        start: usize,
        /// End of the requested range (exclusive).
        end: usize,
        /// Length of the view the range was checked against.
        len: usize,
    },

    /// A write offset lies outside a view's bounds.
    #[error("offset {offset} is out of bounds for a view of length {len}")]
    Offset {
        /// The requested offset.
        offset: usize,
        /// Length of the view the offset was checked against.
        len: usize,
    },

    /// A decoded payload would not fit in the remaining view space.
    ///
    /// Writes never silently truncate; the whole operation is refused before
    /// any byte is written.
    #[error("decoded payload of {needed} bytes does not fit in {available} remaining bytes")]
    BufferTooSmall {
        /// Bytes the payload decodes to.
        needed: usize,
        /// Bytes left in the view after the write offset.
        available: usize,
    },

    /// An unpack field would read past the end of the view.
    #[error("field at offset {offset} reads past the end of a view of length {len}")]
    OutOfBounds {
        /// Offset the field read would start at.
        offset: usize,
        /// Length of the view.
        len: usize,
    },

    /// An unpack format string contains an unknown character.
    #[error("unknown format character {0:?}")]
    InvalidFormat(char),

    /// The view's mapping was created without write permission.
    #[error("view is not writable")]
    WriteProtected,

    /// An ancillary syscall (msync and friends) failed.
    #[error("system error: {0}")]
    System(#[from] Errno),
}

impl Error {
    /// Raw OS error code carried by the syscall variants.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Error::Map(errno) | Error::Unmap(errno) | Error::System(errno) => {
                Some(errno.raw_os_error())
            }
            _ => None,
        }
    }
}
