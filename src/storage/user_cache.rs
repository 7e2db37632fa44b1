// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Row cache for user profiles, backed by redb.
//!
//! ## Table Layout
//!
//! - `users`: user id → serialized [`CachedUser`] (JSON bytes)
//!
//! Every successful write republishes the full row set, newest first, to
//! observers of [`UserCache::observe_all`].

use std::path::Path;

use futures_util::stream::{self, BoxStream, StreamExt};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// A cached user profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Epoch milliseconds of the last upsert.
    pub last_updated_at: i64,
}

/// Keyed cache of user profiles.
pub trait UserCache: Send + Sync {
    /// Insert or replace by id.
    fn upsert(&self, user: CachedUser) -> CacheResult<()>;

    fn get(&self, id: &str) -> CacheResult<Option<CachedUser>>;

    /// All rows, newest first.
    fn all(&self) -> CacheResult<Vec<CachedUser>>;

    /// Current rows, then the full row set after each change.
    fn observe_all(&self) -> BoxStream<'static, Vec<CachedUser>>;

    fn delete(&self, id: &str) -> CacheResult<()>;

    fn clear(&self) -> CacheResult<()>;
}

// =============================================================================
// RedbUserCache
// =============================================================================

pub struct RedbUserCache {
    db: Database,
    rows: watch::Sender<Vec<CachedUser>>,
}

impl RedbUserCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
        }
        write_txn.commit()?;

        let (rows, _) = watch::channel(Vec::new());
        let cache = Self { db, rows };
        cache.rows.send_replace(cache.all()?);
        Ok(cache)
    }

    fn publish(&self) {
        match self.all() {
            Ok(rows) => {
                self.rows.send_replace(rows);
            }
            Err(e) => warn!(error = %e, "Failed to refresh cached user rows"),
        }
    }
}

impl UserCache for RedbUserCache {
    fn upsert(&self, user: CachedUser) -> CacheResult<()> {
        let json = serde_json::to_vec(&user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            table.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        self.publish();
        Ok(())
    }

    fn get(&self, id: &str) -> CacheResult<Option<CachedUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> CacheResult<Vec<CachedUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut users = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            users.push(serde_json::from_slice::<CachedUser>(value.value())?);
        }
        users.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(users)
    }

    fn observe_all(&self) -> BoxStream<'static, Vec<CachedUser>> {
        stream::unfold((self.rows.subscribe(), true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let rows = rx.borrow_and_update().clone();
            Some((rows, (rx, false)))
        })
        .boxed()
    }

    fn delete(&self, id: &str) -> CacheResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            table.remove(id)?;
        }
        write_txn.commit()?;
        self.publish();
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            table.retain(|_, _| false)?;
        }
        write_txn.commit()?;
        self.publish();
        Ok(())
    }
}
