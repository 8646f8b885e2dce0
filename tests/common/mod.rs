//! Shared test infrastructure for the record store, applier, serializer and API tests.
#![allow(dead_code)]

use async_trait::async_trait;
use dnsmasq_webhook::error::Error;
use dnsmasq_webhook::record_store::{DirectoryStore, DynRecordStore, RecordStore};
use dnsmasq_webhook::reload::Reloader;
use dnsmasq_webhook::{Record, RecordKind};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{mpsc, Semaphore};

pub const TTL: u32 = 300;

// --- Record helpers ---

pub fn a(name: &str, ips: &[&str]) -> Record {
    Record::new(name, RecordKind::A, ips.iter().map(ToString::to_string).collect(), TTL)
}

pub fn txt(name: &str, values: &[&str]) -> Record {
    Record::new(name, RecordKind::Txt, values.iter().map(ToString::to_string).collect(), TTL)
}

pub fn cname(name: &str, target: &str) -> Record {
    Record::new(name, RecordKind::Cname, vec![target.to_string()], TTL)
}

/// A fresh managed directory and a store over it.
pub fn directory_store() -> (TempDir, Arc<DirectoryStore>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = Arc::new(DirectoryStore::new(dir.path(), TTL, false));
    (dir, store)
}

/// Sorted names of the regular files in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn sorted(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(|x, y| {
        (&x.dns_name, x.record_type.to_string()).cmp(&(&y.dns_name, y.record_type.to_string()))
    });
    records
}

// --- RecordingReloader ---

/// Counts reloads and snapshots the managed directory at each one.
///
/// When built with [`RecordingReloader::gated`], every reload announces itself on the returned
/// channel and then blocks until the test calls [`RecordingReloader::release`].
pub struct RecordingReloader {
    dir: PathBuf,
    calls: AtomicUsize,
    snapshots: Mutex<Vec<Vec<String>>>,
    fail_with: Option<String>,
    gate: Option<(Semaphore, mpsc::UnboundedSender<usize>)>,
}

impl RecordingReloader {
    pub fn new(dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            calls: AtomicUsize::new(0),
            snapshots: Mutex::default(),
            fail_with: None,
            gate: None,
        })
    }

    pub fn failing(dir: &Path, detail: &str) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            calls: AtomicUsize::new(0),
            snapshots: Mutex::default(),
            fail_with: Some(detail.to_string()),
            gate: None,
        })
    }

    pub fn gated(dir: &Path) -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        let (entered_tx, entered_rx) = mpsc::unbounded_channel();
        let reloader = Arc::new(Self {
            dir: dir.to_path_buf(),
            calls: AtomicUsize::new(0),
            snapshots: Mutex::default(),
            fail_with: None,
            gate: Some((Semaphore::new(0), entered_tx)),
        });
        (reloader, entered_rx)
    }

    pub fn release(&self, reloads: usize) {
        if let Some((gate, _)) = &self.gate {
            gate.add_permits(reloads);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> Vec<Vec<String>> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reloader for RecordingReloader {
    async fn reload(&self) -> Result<(), Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().unwrap().push(file_names(&self.dir));
        if let Some((gate, entered)) = &self.gate {
            let _ = entered.send(call);
            gate.acquire().await.expect("gate open").forget();
        }
        match &self.fail_with {
            Some(detail) => Err(Error::ReloadFailed {
                command: "test reload".to_string(),
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }
}

// --- RecordingStore ---

/// Wraps a real store and logs each mutation as `"delete <name> <kind>"` or
/// `"write <name> <kind>"`. Mutations of `fail_on` fail with an IO error without reaching the
/// wrapped store.
pub struct RecordingStore {
    inner: DynRecordStore,
    log: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingStore {
    pub fn new(inner: DynRecordStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            log: Mutex::default(),
            fail_on: None,
        })
    }

    pub fn failing_on(inner: DynRecordStore, name: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            log: Mutex::default(),
            fail_on: Some(name.to_string()),
        })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn check(&self, name: &str) -> Result<(), Error> {
        match &self.fail_on {
            Some(fail_on) if fail_on == name => Err(Error::IO(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only file system",
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn list_records(&self) -> Result<Vec<Record>, Error> {
        self.inner.list_records().await
    }

    async fn write_record(&self, record: &Record) -> Result<(), Error> {
        self.log
            .lock()
            .unwrap()
            .push(format!("write {} {}", record.dns_name, record.record_type));
        self.check(&record.dns_name)?;
        self.inner.write_record(record).await
    }

    async fn delete_record(&self, name: &str, kind: RecordKind) -> Result<(), Error> {
        self.log.lock().unwrap().push(format!("delete {name} {kind}"));
        self.check(name)?;
        self.inner.delete_record(name, kind).await
    }
}
