//! A caching wrapper around another [`RecordStore`][super::RecordStore].
//!
//! Listing the managed directory reads every file in it. The wrapper keeps the result of the
//! last listing and serves it until the next write or delete, which always clears it, whether
//! or not the mutation succeeded.
use crate::error::Error;
use crate::record::{Record, RecordKind};
use crate::record_store::{DynRecordStore, RecordStore};
use tokio::sync::RwLock;

#[allow(clippy::module_name_repetitions)]
pub struct CachedRecordStore {
    inner: DynRecordStore,
    records: RwLock<Option<Vec<Record>>>,
}

impl CachedRecordStore {
    pub fn new(inner: DynRecordStore) -> Self {
        Self {
            inner,
            records: RwLock::default(),
        }
    }

    /// Drop the cached listing so the next [`list_records`][RecordStore::list_records] reads
    /// through to the wrapped store.
    pub async fn invalidate(&self) {
        self.records.write().await.take();
    }
}

#[async_trait::async_trait]
impl RecordStore for CachedRecordStore {
    async fn list_records(&self) -> Result<Vec<Record>, Error> {
        if let Some(records) = self.records.read().await.as_ref() {
            tracing::debug!(count = records.len(), "serving cached records");
            return Ok(records.clone());
        }

        let mut cached = self.records.write().await;
        // Another reader may have filled the cache while we waited for the write lock.
        if let Some(records) = cached.as_ref() {
            return Ok(records.clone());
        }
        let records = self.inner.list_records().await?;
        *cached = Some(records.clone());
        Ok(records)
    }

    async fn write_record(&self, record: &Record) -> Result<(), Error> {
        let res = self.inner.write_record(record).await;
        self.invalidate().await;
        res
    }

    async fn delete_record(&self, name: &str, kind: RecordKind) -> Result<(), Error> {
        let res = self.inner.delete_record(name, kind).await;
        self.invalidate().await;
        res
    }
}
