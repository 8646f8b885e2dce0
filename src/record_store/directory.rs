//! A directory-backed implementation of the [`RecordStore`][super::RecordStore] trait.
//!
//! Every record is a dnsmasq configuration file in the managed directory. The file's name is
//! derived from the record's name and kind:
//!
//! | kind    | file                                      |
//! |---------|-------------------------------------------|
//! | `A`     | `<name>` (`<name>.a` if `<name>` ends in a reserved suffix) |
//! | `TXT`   | `<name>.txt`                              |
//! | `CNAME` | `<name>.cname`                            |
//!
//! Files whose name starts with a dot are ignored, as dnsmasq's `conf-dir` does. Writes use such
//! a hidden file as a staging area before renaming it into place.
use crate::error::Error;
use crate::record::{codec, validate_name, Record, RecordKind};
use crate::record_store::RecordStore;
use std::io::ErrorKind;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TXT_SUFFIX: &str = ".txt";
const CNAME_SUFFIX: &str = ".cname";
const A_SUFFIX: &str = ".a";
const RECORD_FILE_MODE: u32 = 0o644;

/// A dnsmasq configuration directory holding one file per record.
///
/// With `dry_run` set, writes and deletes are logged instead of performed. Listing always reads
/// the real directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
    ttl: u32,
    dry_run: bool,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: u32, dry_run: bool) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            dry_run,
        }
    }

    /// Open the store, creating the managed directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the directory can't be created.
    pub async fn open(dir: impl Into<PathBuf>, ttl: u32, dry_run: bool) -> Result<Self, Error> {
        let store = Self::new(dir, ttl, dry_run);
        store.ensure_directory().await?;
        Ok(store)
    }

    /// Create the managed directory and its parents. Succeeds if it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the directory can't be created.
    pub async fn ensure_directory(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// The path of the file backing the record with the given name and kind.
    ///
    /// Path separators in `name` are replaced and `..` sequences collapsed, so the result is
    /// always a direct child of the managed directory.
    pub fn record_path(&self, name: &str, kind: RecordKind) -> PathBuf {
        self.dir.join(file_name(name, kind))
    }

    async fn read_record(&self, path: &Path, kind: RecordKind) -> Result<Option<Record>, Error> {
        let contents = fs::read_to_string(path).await?;
        Ok(codec::decode(kind, &contents, self.ttl))
    }

    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), Error> {
        let staging = staging_path(path);
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(RECORD_FILE_MODE);

        let written = async {
            let mut file = options.open(&staging).await?;
            file.write_all(contents.as_bytes()).await?;
            // The umask applies on create; set the mode explicitly so it is always the same.
            #[cfg(unix)]
            file.set_permissions(std::fs::Permissions::from_mode(RECORD_FILE_MODE))
                .await?;
            file.sync_all().await?;
            fs::rename(&staging, path).await
        }
        .await;

        if let Err(err) = written {
            if let Err(cleanup_err) = fs::remove_file(&staging).await {
                if cleanup_err.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        path = %staging.display(),
                        "failed to remove staging file: {cleanup_err}"
                    );
                }
            }
            return Err(Error::IO(err));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for DirectoryStore {
    async fn list_records(&self) -> Result<Vec<Record>, Error> {
        tracing::debug!(dir = %self.dir.display(), "reading records");
        self.ensure_directory().await?;

        let mut entries = fs::read_dir(&self.dir).await?;
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                tracing::warn!(file = ?entry.file_name(), "skipping non UTF-8 file name");
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(file = file_name, "failed to stat file: {err}");
                    continue;
                }
            }

            let kind = kind_for_file(file_name);
            match self.read_record(&entry.path(), kind).await {
                Ok(Some(record)) => {
                    if let Err(err) = validate_name(&record.dns_name) {
                        tracing::warn!(file = file_name, "skipping unmanageable record: {err}");
                        continue;
                    }
                    records.push(record);
                }
                Ok(None) => {
                    tracing::debug!(file = file_name, "no usable records in file");
                }
                Err(err) => {
                    tracing::warn!(file = file_name, "failed to parse file: {err}");
                }
            }
        }

        tracing::info!(count = records.len(), "read records");
        Ok(records)
    }

    async fn write_record(&self, record: &Record) -> Result<(), Error> {
        tracing::debug!(
            name = %record.dns_name,
            kind = %record.record_type,
            targets = record.targets.len(),
            "writing record"
        );
        record.validate()?;

        let path = self.record_path(&record.dns_name, record.record_type);
        let contents = codec::encode(record);

        if self.dry_run {
            tracing::info!(
                dry_run = true,
                path = %path.display(),
                contents = contents.trim_end(),
                "would write file"
            );
            return Ok(());
        }

        self.ensure_directory().await?;
        self.write_atomic(&path, &contents).await?;
        tracing::debug!(path = %path.display(), "wrote record file");
        Ok(())
    }

    async fn delete_record(&self, name: &str, kind: RecordKind) -> Result<(), Error> {
        let path = self.record_path(name, kind);
        tracing::debug!(name, %kind, path = %path.display(), "deleting record");

        if self.dry_run {
            tracing::info!(dry_run = true, path = %path.display(), "would delete file");
            return Ok(());
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "deleted record file");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "record file not found (already deleted?)");
                Ok(())
            }
            Err(err) => Err(Error::IO(err)),
        }
    }
}

fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "-").replace("..", "--")
}

fn file_name(name: &str, kind: RecordKind) -> String {
    let mut file_name = sanitize(name);
    match kind {
        RecordKind::Txt => file_name.push_str(TXT_SUFFIX),
        RecordKind::Cname => file_name.push_str(CNAME_SUFFIX),
        RecordKind::A => {
            if [TXT_SUFFIX, CNAME_SUFFIX, A_SUFFIX]
                .iter()
                .any(|suffix| file_name.ends_with(suffix))
            {
                file_name.push_str(A_SUFFIX);
            }
        }
    }
    file_name
}

fn kind_for_file(file_name: &str) -> RecordKind {
    if file_name.ends_with(TXT_SUFFIX) {
        RecordKind::Txt
    } else if file_name.ends_with(CNAME_SUFFIX) {
        RecordKind::Cname
    } else {
        RecordKind::A
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
