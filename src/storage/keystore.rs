// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File-backed keystore for the session encryption key.
//!
//! The master key is generated once, stored base64-encoded next to the data
//! it protects (owner read/write only on Unix), and handed out only as an
//! opaque [`StreamingAead`]. Nothing outside this module sees the key bytes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use tracing::info;

use super::crypto::{CryptoError, SegmentedAesGcm, StreamingAead};

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("keystore I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("keystore file {0} is not valid base64")]
    Encoding(PathBuf),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Loads or provisions the master key stored at one path.
#[derive(Debug, Clone)]
pub struct FileKeystore {
    path: PathBuf,
}

impl FileKeystore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the primitive, creating a fresh key on first use.
    pub fn load_or_create(&self) -> Result<Arc<dyn StreamingAead>, KeystoreError> {
        let key = match fs::read_to_string(&self.path) {
            Ok(encoded) => Base64::decode_vec(encoded.trim())
                .map_err(|_| KeystoreError::Encoding(self.path.clone()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let key = SegmentedAesGcm::generate_key()?;
                self.persist(&Base64::encode_string(&key))?;
                info!(path = %self.path.display(), "Provisioned new session key");
                key.to_vec()
            }
            Err(source) => {
                return Err(KeystoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        Ok(Arc::new(SegmentedAesGcm::new(&key)?))
    }

    fn persist(&self, encoded: &str) -> Result<(), KeystoreError> {
        let io_err = |source| KeystoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(io_err)?;
        file.write_all(encoded.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn round_trip(aead: &dyn StreamingAead, data: &[u8]) -> Vec<u8> {
        let mut ciphertext = Vec::new();
        let mut writer = aead.encrypting_writer(Box::new(&mut ciphertext), b"").unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
        ciphertext
    }

    #[test]
    fn creates_key_once_and_reuses_it() {
        let dir = TempDir::new().unwrap();
        let keystore = FileKeystore::new(dir.path().join("keys").join("session.key"));

        let first = keystore.load_or_create().unwrap();
        let stored = fs::read_to_string(keystore.path()).unwrap();
        let ciphertext = round_trip(first.as_ref(), b"hello");

        let second = keystore.load_or_create().unwrap();
        assert_eq!(fs::read_to_string(keystore.path()).unwrap(), stored);

        let mut reader = second
            .decrypting_reader(Box::new(ciphertext.as_slice()), b"")
            .unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let keystore = FileKeystore::new(dir.path().join("session.key"));
        keystore.load_or_create().unwrap();
        let mode = fs::metadata(keystore.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn invalid_key_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.key");

        fs::write(&path, "!!! not base64 !!!").unwrap();
        assert!(matches!(
            FileKeystore::new(&path).load_or_create(),
            Err(KeystoreError::Encoding(_))
        ));

        fs::write(&path, Base64::encode_string(&[1u8; 8])).unwrap();
        assert!(matches!(
            FileKeystore::new(&path).load_or_create(),
            Err(KeystoreError::Crypto(CryptoError::InvalidKeyLength(8)))
        ));
    }
}
