// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Storage
//!
//! Everything the data layer keeps on disk.
//!
//! ## Security Model
//!
//! - The session record is encrypted with a streaming AEAD before it touches
//!   the filesystem; tampering is detected on read
//! - The master key lives in the keystore and is only handed out as an
//!   opaque [`StreamingAead`]
//! - The row cache holds non-secret profile data and is not encrypted
//!
//! ## Storage Layout
//!
//! See [`StoragePaths`].

pub mod credential_store;
pub mod crypto;
pub mod encrypted_fs;
pub mod keystore;
pub mod paths;
pub mod session;
pub mod user_cache;

pub use credential_store::{CredentialStore, Projection, StoreError};
pub use crypto::{CryptoError, FinishWrite, SegmentedAesGcm, StreamingAead};
pub use encrypted_fs::{EncryptedFile, StorageError, StorageResult};
pub use keystore::{FileKeystore, KeystoreError};
pub use paths::StoragePaths;
pub use session::{NewSession, SessionRecord, DEFAULT_TOKEN_TTL};
pub use user_cache::{CacheError, CachedUser, RedbUserCache, UserCache};
