// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::env;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use resilient_data::config::ClientConfig;
use resilient_data::logging;
use resilient_data::network::{ApiClient, ConnectivityMonitor, ReachabilityProbe};
use resilient_data::pagination::Paginator;
use resilient_data::repository::{AuthRepository, CatalogRepository, RemoteAuthApi};
use resilient_data::storage::{
    CredentialStore, EncryptedFile, FileKeystore, RedbUserCache, StoragePaths,
};
use resilient_data::Outcome;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ClientConfig::from_env()?;
    if let Err(e) = logging::init(config.log_format) {
        eprintln!("tracing init failed: {e}");
    }

    let command = env::args().nth(1).unwrap_or_else(|| "status".to_string());
    info!(
        api_base_url = %config.api_base_url,
        data_dir = %config.data_dir.display(),
        command = %command,
        "resilient-data starting"
    );

    // Local storage
    let paths = StoragePaths::new(&config.data_dir);
    std::fs::create_dir_all(paths.root())?;
    let aead = FileKeystore::new(paths.keyset_file()).load_or_create()?;
    let store =
        CredentialStore::open(EncryptedFile::new(paths.session_file(), aead), config.token_ttl)
            .await?;
    let cache = Arc::new(RedbUserCache::open(&paths.cache_db())?);

    // Network
    let tokens = store.access_token();
    let client = ApiClient::from_config(&config)?.with_token_source(Arc::new(move || {
        Some(tokens.current()).filter(|t| !t.is_empty())
    }));
    let connectivity = ConnectivityMonitor::default();
    let probe = ReachabilityProbe::new(
        connectivity.clone(),
        client.base_url().clone(),
        config.probe_interval,
        config.connect_timeout,
    )?;
    // One check up front so the first decision sees real reachability.
    probe.check_once().await;
    let shutdown = CancellationToken::new();
    let probe_task = tokio::spawn(probe.run(shutdown.clone()));

    let catalog = CatalogRepository::new(client.clone(), config.retry);
    let repo = AuthRepository::new(
        Arc::new(RemoteAuthApi::new(client)),
        store.clone(),
        cache,
        connectivity.clone(),
    );

    match command.as_str() {
        "status" => match repo.get_current_user().await {
            Outcome::Success(Some(user)) => {
                let expired = store.snapshot().is_token_expired(
                    resilient_data::storage::session::now_epoch_ms(),
                );
                info!(
                    user_id = %user.id,
                    name = %user.name,
                    online = connectivity.is_online(),
                    token_expired = expired,
                    "Signed in"
                );
            }
            Outcome::Success(None) => info!("Not signed in"),
            Outcome::Error(e) => warn!(error = %e, "Could not determine current user"),
            Outcome::Loading => {}
        },
        "logout" => {
            repo.logout().await;
            info!("Signed out");
        }
        "users" => {
            let directory = Paginator::new(config.page_size);
            directory
                .load_next_page(|page, size| catalog.users(page, size))
                .await;
            let state = directory.state();
            match state.last_error() {
                Some(e) => warn!(error = %e, "Could not load the user directory"),
                None => info!(
                    loaded = state.items().len(),
                    reached_end = state.has_reached_end(),
                    "User directory loaded"
                ),
            }
        }
        other => {
            error!(
                command = %other,
                "Unknown command (expected `status`, `logout` or `users`)"
            );
            shutdown.cancel();
            return Err(format!("unknown command: {other}").into());
        }
    }

    shutdown.cancel();
    probe_task.await?;
    Ok(())
}
