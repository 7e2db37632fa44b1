// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout of the local data directory.
//!
//! ```text
//! {root}/
//!   session.enc     # Encrypted session record
//!   session.key     # Base64 master key for session.enc
//!   cache.redb      # Row cache
//! ```

use std::path::{Path, PathBuf};

/// Default data directory, relative to the working directory.
pub const DATA_ROOT: &str = "./data";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.enc")
    }

    pub fn keyset_file(&self) -> PathBuf {
        self.root.join("session.key")
    }

    pub fn cache_db(&self) -> PathBuf {
        self.root.join("cache.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_root() {
        let paths = StoragePaths::new("/tmp/app");
        assert_eq!(paths.session_file(), PathBuf::from("/tmp/app/session.enc"));
        assert_eq!(paths.keyset_file(), PathBuf::from("/tmp/app/session.key"));
        assert_eq!(paths.cache_db(), PathBuf::from("/tmp/app/cache.redb"));
    }
}
