// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Credential Store
//!
//! Owns the [`SessionRecord`] and its encrypted file.
//!
//! ## Write Path
//!
//! Every mutation is a transform `&SessionRecord -> SessionRecord` sent to a
//! single writer task. The writer applies transforms strictly in arrival
//! order, persists the result through [`EncryptedFile`], and only then
//! publishes it. Concurrent updates therefore compose instead of
//! overwriting each other, and a failed write publishes nothing.
//!
//! The write runs inside the writer task, so a caller that stops waiting
//! does not interrupt it. Combined with the temp-file-and-rename write, the
//! file always holds one complete record.
//!
//! ## Read Path
//!
//! A `watch` channel carries the last persisted record. [`Projection`]s pick
//! one field out of it, so every field stream is derived from the same
//! source and no two fields can be observed out of sync.
//!
//! ## Corruption
//!
//! A file that fails authentication or parsing makes [`CredentialStore::open`]
//! return [`StoreError::Corruption`]. The store never substitutes an empty
//! record on its own; the caller decides whether to wipe the file.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

use super::encrypted_fs::{EncryptedFile, StorageError};
use super::session::{now_epoch_ms, NewSession, SessionRecord, DEFAULT_TOKEN_TTL};

/// Pending transforms before `update` callers start waiting for queue space.
const UPDATE_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The persisted record could not be authenticated or parsed.
    #[error("session store is corrupted: {0}")]
    Corruption(String),

    #[error("session store I/O failure: {0}")]
    Io(String),

    /// The writer task is gone.
    #[error("session store is closed")]
    Closed,

    /// The update transform panicked. The record is left as it was.
    #[error("session update panicked")]
    TransformPanicked,
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Corruption(msg) => StoreError::Corruption(msg),
            other => StoreError::Io(other.to_string()),
        }
    }
}

type Transform = Box<dyn FnOnce(&SessionRecord) -> SessionRecord + Send>;

struct Update {
    transform: Transform,
    reply: oneshot::Sender<Result<SessionRecord, StoreError>>,
}

/// Handle to the session store. Clones share one writer.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    updates: mpsc::Sender<Update>,
    state: watch::Receiver<SessionRecord>,
    ttl: Duration,
}

impl CredentialStore {
    /// Load the record from `file` and start the writer task.
    ///
    /// A missing file yields the default record.
    pub async fn open(file: EncryptedFile, ttl: Duration) -> Result<Self, StoreError> {
        let reader = file.clone();
        let loaded = tokio::task::spawn_blocking(move || reader.read::<SessionRecord>())
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let initial = match loaded {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                let e = StoreError::from(e);
                error!(path = %file.path().display(), error = %e, "Failed to load session");
                return Err(e);
            }
        };

        info!(
            path = %file.path().display(),
            logged_in = initial.is_logged_in,
            "Session store opened"
        );

        let (state_tx, state_rx) = watch::channel(initial);
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
        tokio::spawn(run_writer(file, updates_rx, state_tx));

        Ok(Self {
            updates: updates_tx,
            state: state_rx,
            ttl,
        })
    }

    /// [`open`](Self::open) with the default one-hour token lifetime.
    pub async fn open_default(file: EncryptedFile) -> Result<Self, StoreError> {
        Self::open(file, DEFAULT_TOKEN_TTL).await
    }

    /// Apply `transform` to the current record and persist the result.
    ///
    /// Returns the record as persisted. A panicking transform fails only its
    /// own update with [`StoreError::TransformPanicked`].
    pub async fn update<F>(&self, transform: F) -> Result<SessionRecord, StoreError>
    where
        F: FnOnce(&SessionRecord) -> SessionRecord + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.updates
            .send(Update {
                transform: Box::new(transform),
                reply,
            })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)?
    }

    /// Replace the record with a fresh logged-in session.
    pub async fn save_session(&self, session: NewSession) -> Result<(), StoreError> {
        let ttl = self.ttl;
        self.update(move |_| SessionRecord::signed_in(session, now_epoch_ms(), ttl))
            .await?;
        Ok(())
    }

    /// Swap tokens, keeping identity. A `None` refresh token keeps the old one.
    pub async fn update_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), StoreError> {
        let ttl = self.ttl;
        self.update(move |current| {
            current.with_tokens(access_token, refresh_token, now_epoch_ms(), ttl)
        })
        .await?;
        Ok(())
    }

    /// Reset to the default, logged-out record.
    pub async fn clear_session(&self) -> Result<(), StoreError> {
        self.update(|_| SessionRecord::default()).await?;
        Ok(())
    }

    /// The last persisted record.
    pub fn snapshot(&self) -> SessionRecord {
        self.state.borrow().clone()
    }

    pub fn records(&self) -> Projection<SessionRecord> {
        self.project(SessionRecord::clone)
    }

    pub fn is_logged_in(&self) -> Projection<bool> {
        self.project(|r| r.is_logged_in)
    }

    pub fn access_token(&self) -> Projection<String> {
        self.project(|r| r.access_token.clone())
    }

    pub fn refresh_token(&self) -> Projection<String> {
        self.project(|r| r.refresh_token.clone())
    }

    pub fn user_id(&self) -> Projection<String> {
        self.project(|r| r.user_id.clone())
    }

    pub fn user_name(&self) -> Projection<String> {
        self.project(|r| r.user_name.clone())
    }

    pub fn user_email(&self) -> Projection<String> {
        self.project(|r| r.user_email.clone())
    }

    fn project<T>(&self, project: fn(&SessionRecord) -> T) -> Projection<T> {
        Projection {
            rx: self.state.clone(),
            project,
        }
    }
}

async fn run_writer(
    file: EncryptedFile,
    mut updates: mpsc::Receiver<Update>,
    state: watch::Sender<SessionRecord>,
) {
    while let Some(Update { transform, reply }) = updates.recv().await {
        let current = state.borrow().clone();
        let next = match panic::catch_unwind(AssertUnwindSafe(|| transform(&current))) {
            Ok(next) => next,
            Err(_) => {
                error!("Session update transform panicked");
                let _ = reply.send(Err(StoreError::TransformPanicked));
                continue;
            }
        };

        let result = if next == current {
            Ok(next)
        } else {
            let writer = file.clone();
            let record = next.clone();
            match tokio::task::spawn_blocking(move || writer.write(&record)).await {
                Ok(Ok(())) => {
                    debug!(logged_in = next.is_logged_in, "Session persisted");
                    state.send_replace(next.clone());
                    Ok(next)
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Failed to persist session");
                    Err(StoreError::from(e))
                }
                Err(e) => Err(StoreError::Io(e.to_string())),
            }
        };

        // The caller may have stopped waiting; the write stands regardless.
        let _ = reply.send(result);
    }
    debug!("Session writer stopped");
}

/// One view derived from the session record.
#[derive(Debug, Clone)]
pub struct Projection<T> {
    rx: watch::Receiver<SessionRecord>,
    project: fn(&SessionRecord) -> T,
}

impl<T> Projection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn current(&self) -> T {
        (self.project)(&self.rx.borrow())
    }

    /// Wait until the projected value differs from the current one.
    pub async fn changed(&mut self) -> Result<T, StoreError> {
        let seen = (self.project)(&self.rx.borrow_and_update());
        loop {
            self.rx.changed().await.map_err(|_| StoreError::Closed)?;
            let value = (self.project)(&self.rx.borrow_and_update());
            if value != seen {
                return Ok(value);
            }
        }
    }

    /// The current value, then each distinct value as the record changes.
    ///
    /// Ends when the store's writer shuts down.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static {
        stream::unfold(
            (self.rx, self.project, None::<T>),
            |(mut rx, project, last)| async move {
                loop {
                    if last.is_some() && rx.changed().await.is_err() {
                        return None;
                    }
                    let value = project(&rx.borrow_and_update());
                    if last.as_ref() != Some(&value) {
                        return Some((value.clone(), (rx, project, Some(value))));
                    }
                }
            },
        )
    }
}
