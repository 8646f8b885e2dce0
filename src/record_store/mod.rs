//! Record storage.
//!
//! Supports a generic interface for listing, writing and deleting [`Record`]s.
//!
//! [`directory::DirectoryStore`] is the authoritative implementation: one dnsmasq configuration
//! file per record inside the managed directory, with no index besides the files themselves.
//! [`cached::CachedRecordStore`] wraps another store and remembers the last listing until the
//! next mutation.

use crate::error::Error;
use crate::record::{Record, RecordKind};
use std::sync::Arc;

pub mod cached;
pub mod directory;

#[allow(clippy::module_name_repetitions)]
pub use cached::CachedRecordStore;
pub use directory::DirectoryStore;

/// `DynRecordStore` is a type alias for a [`RecordStore`] shared between the HTTP handlers (which
/// list records) and the [`MutationSerializer`][crate::apply::MutationSerializer] (the only
/// writer).
#[allow(clippy::module_name_repetitions)]
pub type DynRecordStore = Arc<dyn RecordStore + Send + Sync>;

/// An async trait describing storage of DNS records.
///
/// Implementations don't lock against concurrent writers. Callers route every mutation through
/// the [`MutationSerializer`][crate::apply::MutationSerializer].
#[async_trait::async_trait]
#[allow(clippy::module_name_repetitions)]
pub trait RecordStore {
    /// List every record currently stored. Entries that can't be read or decoded are skipped.
    async fn list_records(&self) -> Result<Vec<Record>, Error>;

    /// Validate and store a record, replacing any record with the same name and kind.
    async fn write_record(&self, record: &Record) -> Result<(), Error>;

    /// Remove the record with the given name and kind. Removing a record that doesn't exist
    /// succeeds.
    async fn delete_record(&self, name: &str, kind: RecordKind) -> Result<(), Error>;
}
