//! Reference-counted opaque payload handle.
//!
//! The original C implementation wraps fetched bytes in a manually
//! refcounted `DataRef` so a single downloaded buffer can be shared between
//! the cache, in-flight sub-fetches, and the eventual result without
//! copying. `Arc<[u8]>` gives us the same sharing for free.

use std::sync::Arc;

/// A shared, immutable byte buffer produced by a fetch.
pub type DataRef = Arc<[u8]>;

/// Build a [`DataRef`] from owned bytes.
pub fn from_vec(bytes: Vec<u8>) -> DataRef {
    Arc::from(bytes)
}

/// Build a [`DataRef`] from a UTF-8 string, consuming it without copying.
pub fn from_string(s: String) -> DataRef {
    Arc::from(s.into_bytes())
}
