//! Backup record file.
//!
//! A backup is a stream of JSON documents, one pre-migration volume snapshot per line, appended
//! in migration order. There is no header or index; files are read incrementally.

use crate::error::BackupError;
use crate::types::{volume_name, VolumeRecord};
use serde_json::de::IoRead;
use serde_json::StreamDeserializer;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

fn io_error(path: &Path, source: std::io::Error) -> BackupError {
    BackupError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Path an existing backup is moved to: `<unix-seconds>-<file>` in the same directory.
pub fn rotated_path(path: &Path, unix_seconds: i64) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}-{}", unix_seconds, file_name))
}

/// Move `path` to its first free rotated name. Rotations within the same second get a
/// `<unix-seconds>-<n>-<file>` name instead of replacing the earlier one.
fn rotate_aside(path: &Path, unix_seconds: i64) -> Result<PathBuf, BackupError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut target = rotated_path(path, unix_seconds);
    let mut attempt = 0u32;
    while target.exists() {
        attempt += 1;
        target = path.with_file_name(format!("{}-{}-{}", unix_seconds, attempt, file_name));
    }
    info!(old = %path.display(), new = %target.display(), "moving backup file");
    std::fs::rename(path, &target).map_err(|e| io_error(path, e))?;
    Ok(target)
}

/// Append-only writer for volume snapshots.
pub struct BackupWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl BackupWriter {
    /// Create a fresh backup file at `path`.
    ///
    /// An existing file is renamed aside first so a new run never appends to stale data.
    /// Returns the writer and the rotated path, if any.
    pub fn create(path: &Path) -> Result<(Self, Option<PathBuf>), BackupError> {
        let rotated = if path.exists() {
            Some(rotate_aside(path, chrono::Utc::now().timestamp())?)
        } else {
            None
        };

        info!(file = %path.display(), "creating backup file");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| io_error(path, e))?;

        Ok((
            Self {
                path: path.to_path_buf(),
                writer: BufWriter::new(file),
                written: 0,
            },
            rotated,
        ))
    }

    /// Append one snapshot and flush it to disk.
    pub fn append(&mut self, volume: &VolumeRecord) -> Result<(), BackupError> {
        serde_json::to_writer(&mut self.writer, volume).map_err(|source| BackupError::Encode {
            name: volume_name(volume).to_string(),
            source,
        })?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| io_error(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshots appended so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

/// Lazy reader over the snapshots of a backup file.
///
/// Yields snapshots in file order. A malformed entry is yielded as an error once, after
/// which the reader is exhausted; entries before it are still returned.
pub struct BackupReader {
    stream: StreamDeserializer<'static, IoRead<BufReader<File>>, VolumeRecord>,
    index: usize,
    failed: bool,
}

impl BackupReader {
    pub fn open(path: &Path) -> Result<Self, BackupError> {
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter();
        Ok(Self {
            stream,
            index: 0,
            failed: false,
        })
    }
}

impl Iterator for BackupReader {
    type Item = Result<VolumeRecord, BackupError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.stream.next()?;
        self.index += 1;
        match item {
            Ok(volume) => Some(Ok(volume)),
            Err(source) => {
                self.failed = true;
                Some(Err(BackupError::Decode {
                    index: self.index,
                    source,
                }))
            }
        }
    }
}

/// Read every snapshot of a backup file lazily.
pub fn read_all(path: &Path) -> Result<BackupReader, BackupError> {
    BackupReader::open(path)
}
