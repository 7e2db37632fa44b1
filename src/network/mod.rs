// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network layer: HTTP transport, error classification, retry and
//! connectivity.
//!
//! | Module | Role |
//! |--------|------|
//! | `transport` | Unclassified transport failures |
//! | `client` | `reqwest` JSON client |
//! | `call` | Single guarded call, failure classification |
//! | `retry` | Linear-backoff retry over `call` |
//! | `connectivity` | Online/offline signal and its probe |
//! | `dto` | Shared response envelopes |

pub mod call;
pub mod client;
pub mod connectivity;
pub mod dto;
pub mod retry;
pub mod transport;

pub use call::{classify, execute};
pub use client::{ApiClient, ClientBuildError, TokenSource};
pub use connectivity::{ConnectivityMonitor, ReachabilityProbe};
pub use retry::{execute_retrying, execute_with_retry, RetryPolicy};
pub use transport::TransportError;
