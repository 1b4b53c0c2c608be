//! Versioned binary snapshots of a [`World`](crate::World).
//!
//! [`archive`] holds the little-endian primitives and header handling; the
//! world codec itself lives in `snapshot` as `World::serialize` and
//! `World::deserialize`.

pub mod archive;
mod snapshot;

pub use archive::{ArchiveVersion, ARCHIVE_EXTENSION, FORMAT_VERSION, MAGIC};
