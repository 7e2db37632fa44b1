// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Connectivity
//!
//! [`ConnectivityMonitor`] holds the current online/offline signal. It can be
//! read synchronously by repositories before issuing a call, and observed as
//! a stream of changes.
//!
//! The host decides how the signal is fed. [`ReachabilityProbe`] is the
//! built-in feeder: it pings the API base URL on an interval and flips the
//! monitor on each transition.
//!
//! ## Shutdown
//!
//! The probe uses `tokio_util::sync::CancellationToken` for graceful
//! shutdown, like every other background loop in this crate.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Default interval between reachability checks.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Current connectivity state plus change notifications.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the latest connectivity. Observers are only woken on change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
        }
    }

    /// Receiver positioned at the current value.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Stream yielding the current state, then every subsequent change.
    pub fn observe(&self) -> impl Stream<Item = bool> + Send + 'static {
        let rx = self.subscribe();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let value = *rx.borrow_and_update();
            Some((value, (rx, false)))
        })
    }
}

/// Periodically checks whether the API host answers and feeds a monitor.
pub struct ReachabilityProbe {
    monitor: ConnectivityMonitor,
    http: reqwest::Client,
    target: Url,
    interval: Duration,
}

impl ReachabilityProbe {
    pub fn new(
        monitor: ConnectivityMonitor,
        target: Url,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            monitor,
            http,
            target,
            interval,
        })
    }

    /// Run the probe loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(probe.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            target = %self.target,
            "Reachability probe starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Reachability probe shutting down");
                return;
            }

            self.check_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Reachability probe shutting down");
                    return;
                }
            }
        }
    }

    /// One check. Any HTTP answer, whatever its status, counts as online.
    pub async fn check_once(&self) -> bool {
        let online = match self.http.head(self.target.clone()).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Reachability check failed");
                false
            }
        };
        self.monitor.set_online(online);
        online
    }
}
