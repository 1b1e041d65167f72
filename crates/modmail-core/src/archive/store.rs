//! Bounded archive store.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::blob::BlobStore;
use super::model::{ArchiveDocument, MailRecord};
use crate::Result;

/// Blob key the archive document is stored under.
pub const ARCHIVE_KEY: &str = "ModMail";

/// Result of [`ArchiveStore::append`].
#[derive(Debug)]
#[must_use]
pub struct Appended {
    /// Oldest record, if it was evicted to make room.
    pub evicted: Option<MailRecord>,
    /// Outcome of writing the archive through to the blob store.
    ///
    /// On error the record is still appended in memory and is included in the
    /// next successful write.
    pub persisted: Result<()>,
}

/// Owns the archived mail, oldest first, and writes it through to a blob store.
pub struct ArchiveStore {
    records: VecDeque<MailRecord>,
    max_capacity: Option<usize>,
    blob: Box<dyn BlobStore>,
}

impl ArchiveStore {
    /// Loads the archive from `blob`, starting empty if it is absent or unreadable.
    ///
    /// `max_capacity` of `None` means unbounded. Never fails: a corrupt or
    /// unreadable archive is logged and replaced by an empty one in memory.
    /// Stored content is re-trimmed, and if the archive holds more than
    /// `max_capacity` records the oldest are dropped.
    #[must_use]
    pub fn load_or_init(blob: Box<dyn BlobStore>, max_capacity: Option<usize>) -> Self {
        let mut records = match blob.read(ARCHIVE_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<ArchiveDocument>(&bytes) {
                Ok(doc) => {
                    let total = doc.mails.len();
                    let records: VecDeque<_> = doc
                        .mails
                        .into_iter()
                        .filter_map(MailRecord::normalized)
                        .collect();
                    if records.len() < total {
                        warn!(
                            "Dropped {} archived mail(s) with empty content",
                            total - records.len()
                        );
                    }
                    debug!("Loaded {} archived mail(s)", records.len());
                    records
                }
                Err(e) => {
                    warn!("Archive is unreadable, starting empty: {}", e);
                    VecDeque::new()
                }
            },
            Ok(None) => {
                debug!("No archive found, starting empty");
                VecDeque::new()
            }
            Err(e) => {
                warn!("Failed to read archive, starting empty: {}", e);
                VecDeque::new()
            }
        };

        let excess = max_capacity.map_or(0, |max| records.len().saturating_sub(max));
        if excess > 0 {
            warn!(
                "Archive holds more than {} mail(s), dropping the {} oldest",
                records.len() - excess,
                excess
            );
            records.drain(..excess);
        }

        Self {
            records,
            max_capacity,
            blob,
        }
    }

    /// Appends a record, evicting the single oldest one first if the archive
    /// is full, then persists the whole archive.
    ///
    /// A persistence failure is reported in [`Appended::persisted`] and does
    /// not roll back the in-memory append.
    pub fn append(&mut self, record: MailRecord) -> Appended {
        let full = self
            .max_capacity
            .is_some_and(|max| self.records.len() >= max);
        let evicted = if full { self.records.pop_front() } else { None };
        if let Some(oldest) = &evicted {
            debug!(
                "Evicted mail from {} ({}) to stay within capacity",
                oldest.sender_name, oldest.sender_id
            );
        }

        self.records.push_back(record);
        let persisted = self.persist();
        Appended { evicted, persisted }
    }

    /// Returns a copy of every record, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MailRecord> {
        self.records.iter().cloned().collect()
    }

    /// Number of archived records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is archived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Configured capacity, `None` when unbounded.
    #[must_use]
    pub const fn max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Writes the current archive to the blob store.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn persist(&mut self) -> Result<()> {
        let doc = ArchiveDocument {
            mails: self.snapshot(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        self.blob.write(ARCHIVE_KEY, &bytes)
    }
}

impl std::fmt::Debug for ArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStore")
            .field("records", &self.records.len())
            .field("max_capacity", &self.max_capacity)
            .finish_non_exhaustive()
    }
}
