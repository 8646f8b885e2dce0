//! Applying change-sets to the record store.
//!
//! A [`Changes`] value is one batch of creates, updates and deletes requested by external-dns.
//! [`ChangeApplier`] runs a batch against a [`RecordStore`][crate::record_store::RecordStore] in a
//! fixed order and reloads the resolver once at the end:
//!
//! 1. every `delete`,
//! 2. every `updateOld`/`updateNew` pair: the old file is removed first if the name or kind
//!    changed, then the new record is written,
//! 3. every `create`,
//! 4. one reload, unless the batch was empty.
//!
//! The first failing step aborts the batch. Files already changed by earlier steps stay changed.
//!
//! [`MutationSerializer`] is the only way the HTTP API runs a [`ChangeApplier`]: it guarantees
//! batches run one at a time, in arrival order.

use crate::error::{ApplyAction, Error};
use crate::record::{validate_name, Record};
use crate::record_store::DynRecordStore;
use crate::reload::DynReloader;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

pub mod serializer;

pub use serializer::{MutationSerializer, PendingApply};

/// A batch of record changes. `update_old` and `update_new` are parallel: the record at index
/// `i` of `update_old` is replaced by the record at index `i` of `update_new`.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub create: Vec<Record>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub update_old: Vec<Record>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub update_new: Vec<Record>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub delete: Vec<Record>,
}

impl Changes {
    /// Number of records touched by the batch, counting each update pair once.
    pub fn len(&self) -> usize {
        self.create.len() + self.update_new.len() + self.delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the whole batch before anything is written.
    ///
    /// Records to be written must be fully valid. Records to be deleted only need a valid name,
    /// since their targets are irrelevant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChanges`] if the update lists differ in length, or
    /// [`Error::Validation`] for the first invalid record.
    pub fn validate(&self) -> Result<(), Error> {
        if self.update_old.len() != self.update_new.len() {
            return Err(Error::InvalidChanges(format!(
                "{} updateOld records but {} updateNew records",
                self.update_old.len(),
                self.update_new.len()
            )));
        }
        for record in self.delete.iter().chain(&self.update_old) {
            validate_name(&record.dns_name)?;
        }
        for record in self.update_new.iter().chain(&self.create) {
            record.validate()?;
        }
        Ok(())
    }
}

/// Runs [`Changes`] against a record store and triggers the reload.
#[derive(Clone)]
pub struct ChangeApplier {
    store: DynRecordStore,
    reloader: DynReloader,
}

impl ChangeApplier {
    pub fn new(store: DynRecordStore, reloader: DynReloader) -> Self {
        Self { store, reloader }
    }

    /// Apply one batch.
    ///
    /// Callers must not run two batches concurrently against the same store; use a
    /// [`MutationSerializer`].
    ///
    /// # Errors
    ///
    /// Returns a validation error (before any I/O) for malformed batches, [`Error::Apply`] naming
    /// the record whose delete or write failed, or [`Error::ReloadFailed`].
    pub async fn apply(&self, changes: &Changes) -> Result<(), Error> {
        tracing::info!(
            create = changes.create.len(),
            update = changes.update_new.len(),
            delete = changes.delete.len(),
            "applying DNS changes"
        );
        changes.validate()?;

        if !changes.delete.is_empty() {
            tracing::debug!(count = changes.delete.len(), "deleting records");
        }
        for record in &changes.delete {
            self.delete(record).await?;
        }

        if !changes.update_new.is_empty() {
            tracing::debug!(count = changes.update_new.len(), "updating records");
        }
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            if old.dns_name != new.dns_name || old.record_type != new.record_type {
                self.delete(old).await?;
            }
            self.write(new).await?;
        }

        if !changes.create.is_empty() {
            tracing::debug!(count = changes.create.len(), "creating records");
        }
        for record in &changes.create {
            self.write(record).await?;
        }

        if changes.is_empty() {
            tracing::info!("no DNS changes to apply");
            return Ok(());
        }
        self.reloader.reload().await?;

        tracing::info!("applied DNS changes");
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), Error> {
        self.store
            .delete_record(&record.dns_name, record.record_type)
            .await
            .map_err(|err| step_failed(ApplyAction::Delete, record, err))
    }

    async fn write(&self, record: &Record) -> Result<(), Error> {
        self.store
            .write_record(record)
            .await
            .map_err(|err| step_failed(ApplyAction::Write, record, err))
    }
}

fn step_failed(action: ApplyAction, record: &Record, source: Error) -> Error {
    Error::Apply {
        action,
        kind: record.record_type,
        name: record.dns_name.clone(),
        source: Box::new(source),
    }
}
