//! # mapbuf
//!
//! Memory-mapped byte buffers with zero-copy views and encoding-aware I/O.
//!
//! mapbuf wraps one OS memory mapping in a reference-counted backing store
//! and hands out [`BufferView`]s: immutable offset+length windows whose bytes
//! can be read and written through several text/binary encodings. Slicing a
//! view is a reference-count bump, never a copy or a re-map, and the mapping
//! is released exactly when the last view over it goes away.
//!
//! ## Features
//!
//! - **Zero-copy slicing**: views share one backing store; slices of slices
//!   compose offsets
//! - **Encoding-aware I/O**: binary/ASCII/UTF-8/base64 reads and writes,
//!   network-order field unpacking
//! - **Overlap-safe copies**: byte transfer between views that tolerates
//!   overlapping ranges of one store
//! - **Host-friendly lifecycle**: dropping a view is the teardown hook; a
//!   garbage-collected host wrapper just owns a view
//!
//! ## Quick Start
//!
//! ```rust
//! use mapbuf::prelude::*;
//!
//! // Map a page of anonymous memory and write through it
//! let view = BufferView::map_anonymous(4096)?;
//! view.ascii_write("hello", 0)?;
//! assert_eq!(view.ascii_slice(0, 5)?, "hello");
//!
//! // Slices are zero-copy windows over the same pages
//! let window = view.slice(1, 4)?;
//! assert_eq!(window.as_slice(), b"ell");
//! # Ok::<(), mapbuf::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod codec;
pub mod error;
pub mod memory;
pub mod view;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::codec::Encoding;
    pub use crate::error::{Error, Result};
    pub use crate::memory::{page_size, HeapStorage, MapSource, MappedRegion, Storage};
    pub use crate::view::BufferView;
    pub use rustix::mm::{MapFlags, ProtFlags};
}

pub use error::{Error, Result};
pub use rustix::mm::{MapFlags, ProtFlags};
