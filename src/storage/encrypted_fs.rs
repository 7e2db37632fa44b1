// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted JSON files.
//!
//! [`EncryptedFile`] serializes a value to JSON and streams it through a
//! [`StreamingAead`] into a file. Reads reverse the pipeline.
//!
//! ## Atomicity
//!
//! Writes go to a sibling `*.tmp` file which is fsynced and then renamed
//! over the target. A reader sees either the previous complete ciphertext or
//! the new one, never a partial write, even if the writing task is dropped.
//!
//! ## Failure Classes
//!
//! | Condition | Result |
//! |-----------|--------|
//! | File missing | `Ok(None)` |
//! | Authentication, framing or JSON failure | `StorageError::Corruption` |
//! | Any other I/O failure | `StorageError::Io` |

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::crypto::StreamingAead;

/// Error type for encrypted storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Ciphertext failed authentication or the plaintext did not parse.
    #[error("stored data is corrupted: {0}")]
    Corruption(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// One encrypted JSON document on disk.
#[derive(Clone)]
pub struct EncryptedFile {
    path: PathBuf,
    aead: Arc<dyn StreamingAead>,
    associated_data: Vec<u8>,
}

impl std::fmt::Debug for EncryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFile {
    /// File at `path` encrypted with empty associated data.
    pub fn new(path: impl AsRef<Path>, aead: Arc<dyn StreamingAead>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            aead,
            associated_data: Vec::new(),
        }
    }

    /// Bind the ciphertext to `associated_data`.
    pub fn with_associated_data(mut self, associated_data: impl Into<Vec<u8>>) -> Self {
        self.associated_data = associated_data.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decrypt and parse the file. `Ok(None)` when it does not exist.
    pub fn read<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let reader = self
            .aead
            .decrypting_reader(Box::new(BufReader::new(file)), &self.associated_data)
            .map_err(corruption_or_io)?;

        serde_json::from_reader(reader)
            .map(Some)
            .map_err(|e| {
                if e.is_io() {
                    corruption_or_io(e.into())
                } else {
                    StorageError::Corruption(e.to_string())
                }
            })
    }

    /// Serialize, encrypt and atomically replace the file.
    pub fn write<T: Serialize>(&self, value: &T) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let result = self.write_temp(&temp_path, value);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn write_temp<T: Serialize>(&self, temp_path: &Path, value: &T) -> StorageResult<()> {
        let file = File::create(temp_path)?;
        let handle = file.try_clone()?;

        let mut writer = self
            .aead
            .encrypting_writer(Box::new(BufWriter::new(file)), &self.associated_data)?;
        serde_json::to_writer(&mut writer, value)?;
        writer.finish()?;

        handle.sync_all()?;
        Ok(())
    }

    /// Remove the file. Missing files are not an error.
    pub fn delete(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self) -> bool {
        File::open(&self.path).is_ok()
    }
}

fn corruption_or_io(e: io::Error) -> StorageError {
    if e.kind() == io::ErrorKind::InvalidData {
        StorageError::Corruption(e.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::crypto::{SegmentedAesGcm, KEY_LEN};
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        id: String,
        value: i32,
    }

    fn file(dir: &TempDir) -> EncryptedFile {
        let aead = Arc::new(SegmentedAesGcm::new(&[3u8; KEY_LEN]).unwrap());
        EncryptedFile::new(dir.path().join("nested").join("doc.enc"), aead)
    }

    #[test]
    fn write_and_read_json() {
        let dir = TempDir::new().unwrap();
        let file = file(&dir);
        let data = TestData {
            id: "test-1".to_string(),
            value: 42,
        };

        file.write(&data).unwrap();
        assert_eq!(file.read::<TestData>().unwrap(), Some(data));
        assert!(!file.path().with_extension("tmp").exists());
    }

    #[test]
    fn contents_are_not_plaintext() {
        let dir = TempDir::new().unwrap();
        let file = file(&dir);
        file.write(&TestData {
            id: "visible-id".to_string(),
            value: 1,
        })
        .unwrap();

        let raw = fs::read(file.path()).unwrap();
        assert!(!raw.windows(10).any(|w| w == b"visible-id"));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(file(&dir).read::<TestData>().unwrap(), None);
    }

    #[test]
    fn tampered_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let file = file(&dir);
        file.write(&TestData {
            id: "x".to_string(),
            value: 0,
        })
        .unwrap();

        let mut raw = fs::read(file.path()).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xff;
        fs::write(file.path(), raw).unwrap();

        assert!(matches!(
            file.read::<TestData>(),
            Err(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn wrong_shape_is_corruption() {
        let dir = TempDir::new().unwrap();
        let file = file(&dir);
        file.write(&vec![1, 2, 3]).unwrap();
        assert!(matches!(
            file.read::<TestData>(),
            Err(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = file(&dir);
        file.write(&1u8).unwrap();
        assert!(file.exists());
        file.delete().unwrap();
        file.delete().unwrap();
        assert!(!file.exists());
    }
}
