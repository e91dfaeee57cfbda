//! File-backed log.

use crate::backend::LogBackend;
use crate::error::{StorageError, StorageResult};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const STAGING_SUFFIX: &str = ".compact";

/// A log stored in a single file.
///
/// The file is opened in append mode, so reads can seek freely without
/// moving the write position. [`LogBackend::replace`] writes a sibling
/// `<name>.compact` file, syncs it, and renames it over the log. A staging
/// file found at open time is the leftover of an interrupted replace and is
/// deleted.
///
/// The backend takes no lock of its own; the local store holds a
/// directory lock for as long as it is open.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileBackend {
    /// Opens the log at `path`, creating an empty one if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata read,
    /// or if a stale staging file cannot be removed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let staging = staging_path(path);
        if staging.exists() {
            fs::remove_file(&staging)?;
        }

        let file = open_append(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogBackend for FileBackend {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut bytes = vec![0u8; self.len as usize];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn append(&mut self, frame: &[u8]) -> StorageResult<u64> {
        let offset = self.len;
        if !frame.is_empty() {
            self.file.write_all(frame)?;
            self.len += frame.len() as u64;
        }
        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        if len > self.len {
            return Err(StorageError::TruncatePastEnd {
                requested: len,
                size: self.len,
            });
        }
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.len = len;
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        let staging = staging_path(&self.path);
        {
            let mut fresh = File::create(&staging)?;
            fresh.write_all(bytes)?;
            fresh.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;

        self.file = open_append(&self.path)?;
        self.len = bytes.len() as u64;
        Ok(())
    }
}

fn open_append(path: &Path) -> StorageResult<File> {
    Ok(OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
