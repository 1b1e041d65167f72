//! Mail archive.
//!
//! A bounded, chronologically ordered collection of submitted mail that is
//! written through to a [`BlobStore`] on every append.

mod blob;
mod model;
mod store;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use model::{EmptyContent, MailRecord, format_short_date};
pub use store::{ARCHIVE_KEY, Appended, ArchiveStore};
