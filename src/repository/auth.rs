// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Repository
//!
//! Combines the remote auth API, the credential store, the user row cache
//! and the connectivity signal. Each operation follows a fixed policy:
//!
//! | Operation | Policy |
//! |-----------|--------|
//! | `login` / `register` | Network only. Offline short-circuits to `NetworkUnavailable`. Success persists the session before returning. |
//! | `logout` | Remote call is best effort. The local session and row cache are always cleared and the result is always success. |
//! | `refresh_token` | Network only. Needs a stored refresh token. Success updates tokens and re-caches the profile. |
//! | `get_current_user` | Logged out → `None`. Online → remote, cached on success; `Unauthorized` → `None`; other errors and offline → cached row. |
//! | `observe_current_user` | Local only, follows the session record and the row cache. |
//! | `is_authenticated` | Local only, one read of the session record. |

use std::future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::network::dto::BaseResponse;
use crate::network::{execute, ApiClient, ConnectivityMonitor, TransportError};
use crate::outcome::Outcome;
use crate::storage::session::now_epoch_ms;
use crate::storage::{CachedUser, CredentialStore, NewSession, SessionRecord, StoreError, UserCache};

use super::models::{LoginRequest, LoginResponse, RefreshTokenRequest, RegisterRequest, User};

const LOGIN_ENDPOINT: &str = "auth/login";
const REGISTER_ENDPOINT: &str = "auth/register";
const LOGOUT_ENDPOINT: &str = "auth/logout";
const REFRESH_TOKEN_ENDPOINT: &str = "auth/refresh";
const ME_ENDPOINT: &str = "auth/me";

/// Message used when a refresh is requested without a stored refresh token.
pub const NO_REFRESH_TOKEN: &str = "No refresh token available";

// =============================================================================
// Remote API
// =============================================================================

/// Remote authentication endpoints, already classified into [`Outcome`]s.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Outcome<LoginResponse>;

    async fn register(&self, name: &str, email: &str, password: &str) -> Outcome<LoginResponse>;

    async fn logout(&self) -> Outcome<()>;

    async fn refresh(&self, refresh_token: &str) -> Outcome<LoginResponse>;

    async fn current_user(&self) -> Outcome<LoginResponse>;
}

/// [`AuthApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteAuthApi {
    client: ApiClient,
}

impl RemoteAuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthApi for RemoteAuthApi {
    async fn login(&self, email: &str, password: &str) -> Outcome<LoginResponse> {
        let body = LoginRequest { email, password };
        execute(move || async move {
            let response: BaseResponse<LoginResponse> =
                self.client.post(LOGIN_ENDPOINT, &body).await?;
            Ok::<_, TransportError>(response.data)
        })
        .await
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> Outcome<LoginResponse> {
        let body = RegisterRequest {
            name,
            email,
            password,
        };
        execute(move || async move {
            let response: BaseResponse<LoginResponse> =
                self.client.post(REGISTER_ENDPOINT, &body).await?;
            Ok::<_, TransportError>(response.data)
        })
        .await
    }

    async fn logout(&self) -> Outcome<()> {
        execute(|| self.client.post_empty(LOGOUT_ENDPOINT)).await
    }

    async fn refresh(&self, refresh_token: &str) -> Outcome<LoginResponse> {
        let body = RefreshTokenRequest { refresh_token };
        execute(move || async move {
            let response: BaseResponse<LoginResponse> =
                self.client.post(REFRESH_TOKEN_ENDPOINT, &body).await?;
            Ok::<_, TransportError>(response.data)
        })
        .await
    }

    async fn current_user(&self) -> Outcome<LoginResponse> {
        execute(move || async move {
            let response: BaseResponse<LoginResponse> = self.client.get(ME_ENDPOINT, &[]).await?;
            Ok::<_, TransportError>(response.data)
        })
        .await
    }
}

// =============================================================================
// Repository
// =============================================================================

pub struct AuthRepository {
    api: Arc<dyn AuthApi>,
    store: CredentialStore,
    cache: Arc<dyn UserCache>,
    connectivity: ConnectivityMonitor,
}

impl AuthRepository {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: CredentialStore,
        cache: Arc<dyn UserCache>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            api,
            store,
            cache,
            connectivity,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Outcome<User> {
        if !self.connectivity.is_online() {
            info!("Login skipped: offline");
            return Outcome::Error(AppError::network_unavailable());
        }
        match self.api.login(email, password).await {
            Outcome::Success(response) => self.establish_session(response).await,
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Loading => Outcome::Loading,
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Outcome<User> {
        if !self.connectivity.is_online() {
            info!("Registration skipped: offline");
            return Outcome::Error(AppError::network_unavailable());
        }
        match self.api.register(name, email, password).await {
            Outcome::Success(response) => self.establish_session(response).await,
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Loading => Outcome::Loading,
        }
    }

    /// Sign out. Always reports success: the local session decides "logged out".
    pub async fn logout(&self) -> Outcome<()> {
        if self.connectivity.is_online() {
            if let Outcome::Error(e) = self.api.logout().await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        } else {
            debug!("Remote logout skipped: offline");
        }

        if let Err(e) = self.store.clear_session().await {
            error!(error = %e, "Failed to clear local session");
        }
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "Failed to clear cached users");
        }

        info!("Logged out");
        Outcome::Success(())
    }

    /// Exchange the stored refresh token for new tokens. Yields the new access token.
    pub async fn refresh_token(&self) -> Outcome<String> {
        if !self.connectivity.is_online() {
            return Outcome::Error(AppError::network_unavailable());
        }

        let session = self.store.snapshot();
        if !session.has_refresh_token() {
            return Outcome::Error(AppError::Unauthorized {
                message: NO_REFRESH_TOKEN.to_string(),
            });
        }

        let response = match self.api.refresh(&session.refresh_token).await {
            Outcome::Success(response) => response,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Loading => return Outcome::Loading,
        };

        if let Err(e) = self
            .store
            .update_tokens(response.token.clone(), response.refresh_token.clone())
            .await
        {
            return Outcome::Error(store_failure(e));
        }
        self.cache_user(&response.to_user());
        debug!(user_id = %response.id, "Tokens refreshed");
        Outcome::Success(response.token)
    }

    pub async fn get_current_user(&self) -> Outcome<Option<User>> {
        let session = self.store.snapshot();
        if !session.is_logged_in {
            return Outcome::Success(None);
        }

        if self.connectivity.is_online() {
            match self.api.current_user().await {
                Outcome::Success(response) => {
                    let user = response.to_user();
                    self.cache_user(&user);
                    return Outcome::Success(Some(user));
                }
                Outcome::Error(AppError::Unauthorized { .. }) => {
                    info!("Session rejected by server");
                    return Outcome::Success(None);
                }
                Outcome::Error(e) => {
                    debug!(error = %e, "Falling back to cached user");
                }
                Outcome::Loading => {}
            }
        }

        match self.cache.get(&session.user_id) {
            Ok(row) => Outcome::Success(row.map(User::from)),
            Err(e) => Outcome::Error(AppError::unknown_with_cause("Failed to read cached user", e)),
        }
    }

    /// The logged-in user, re-emitted whenever the session or the cache changes.
    ///
    /// Without a cached row the identity stored in the session is used.
    pub fn observe_current_user(
        &self,
    ) -> impl Stream<Item = Outcome<Option<User>>> + Send + 'static {
        enum Change {
            Session(SessionRecord),
            Rows(Vec<CachedUser>),
        }

        let sessions = self.store.records().into_stream().map(Change::Session);
        let rows = self.cache.observe_all().map(Change::Rows);

        let mut session: Option<SessionRecord> = None;
        let mut cached: Vec<CachedUser> = Vec::new();
        let mut last: Option<Option<User>> = None;

        stream::select(sessions, rows)
            .filter_map(move |change| {
                match change {
                    Change::Session(record) => session = Some(record),
                    Change::Rows(rows) => cached = rows,
                }
                let emitted = session.as_ref().map(|s| resolve_user(s, &cached));
                let out = match emitted {
                    Some(user) if last.as_ref() != Some(&user) => {
                        last = Some(user.clone());
                        Some(Outcome::Success(user))
                    }
                    _ => None,
                };
                future::ready(out)
            })
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.snapshot().is_logged_in
    }

    async fn establish_session(&self, response: LoginResponse) -> Outcome<User> {
        let user = response.to_user();
        let session = NewSession {
            access_token: response.token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            user_email: user.email.clone(),
        };
        if let Err(e) = self.store.save_session(session).await {
            return Outcome::Error(store_failure(e));
        }
        self.cache_user(&user);
        info!(user_id = %user.id, "Session established");
        Outcome::Success(user)
    }

    fn cache_user(&self, user: &User) {
        if let Err(e) = self.cache.upsert(user.to_cached(now_epoch_ms())) {
            warn!(user_id = %user.id, error = %e, "Failed to cache user");
        }
    }
}

fn resolve_user(session: &SessionRecord, cached: &[CachedUser]) -> Option<User> {
    if !session.is_logged_in {
        return None;
    }
    let user = cached
        .iter()
        .find(|row| row.id == session.user_id)
        .cloned()
        .map(User::from)
        .unwrap_or_else(|| User {
            id: session.user_id.clone(),
            email: session.user_email.clone(),
            name: session.user_name.clone(),
            avatar_url: None,
        });
    Some(user)
}

fn store_failure(e: StoreError) -> AppError {
    warn!(error = %e, "Credential store update failed");
    AppError::unknown_with_cause("Failed to update the local session", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::crypto::{SegmentedAesGcm, KEY_LEN};
    use crate::storage::{EncryptedFile, RedbUserCache};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn login_response(token: &str, refresh: Option<&str>) -> LoginResponse {
        LoginResponse {
            id: "u-1".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            avatar_url: Some("https://img/ada.png".into()),
            token: token.into(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    struct FakeApi {
        calls: AtomicUsize,
        login: Mutex<Outcome<LoginResponse>>,
        logout: Mutex<Outcome<()>>,
        refresh: Mutex<Outcome<LoginResponse>>,
        current: Mutex<Outcome<LoginResponse>>,
        refreshed_with: Mutex<Option<String>>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                login: Mutex::new(Outcome::Success(login_response("access-1", Some("refresh-1")))),
                logout: Mutex::new(Outcome::Success(())),
                refresh: Mutex::new(Outcome::Success(login_response("access-2", None))),
                current: Mutex::new(Outcome::Success(login_response("ignored", None))),
                refreshed_with: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn login(&self, _email: &str, _password: &str) -> Outcome<LoginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.login.lock().unwrap().clone()
        }

        async fn register(
            &self,
            _name: &str,
            _email: &str,
            _password: &str,
        ) -> Outcome<LoginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.login.lock().unwrap().clone()
        }

        async fn logout(&self) -> Outcome<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.logout.lock().unwrap().clone()
        }

        async fn refresh(&self, refresh_token: &str) -> Outcome<LoginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.refreshed_with.lock().unwrap() = Some(refresh_token.to_string());
            self.refresh.lock().unwrap().clone()
        }

        async fn current_user(&self) -> Outcome<LoginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.current.lock().unwrap().clone()
        }
    }

    struct Harness {
        _dir: TempDir,
        api: Arc<FakeApi>,
        store: CredentialStore,
        cache: Arc<RedbUserCache>,
        connectivity: ConnectivityMonitor,
        repo: AuthRepository,
    }

    async fn harness(online: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let aead = Arc::new(SegmentedAesGcm::new(&[1u8; KEY_LEN]).unwrap());
        let file = EncryptedFile::new(dir.path().join("session.enc"), aead);
        let store = CredentialStore::open_default(file).await.unwrap();
        let cache = Arc::new(RedbUserCache::open(&dir.path().join("cache.redb")).unwrap());
        let api = Arc::new(FakeApi::new());
        let connectivity = ConnectivityMonitor::new(online);
        let repo = AuthRepository::new(
            api.clone(),
            store.clone(),
            cache.clone(),
            connectivity.clone(),
        );
        Harness {
            _dir: dir,
            api,
            store,
            cache,
            connectivity,
            repo,
        }
    }

    #[tokio::test]
    async fn login_offline_never_reaches_transport() {
        let h = harness(false).await;
        let out = h.repo.login("ada@example.com", "pw").await;

        assert!(matches!(out.error(), Some(AppError::NetworkUnavailable { .. })));
        assert_eq!(h.api.calls(), 0);
        assert!(!h.repo.is_authenticated());
    }

    #[tokio::test]
    async fn login_persists_session_and_caches_user() {
        let h = harness(true).await;
        let user = h.repo.login("ada@example.com", "pw").await.success().unwrap();

        assert_eq!(user.id, "u-1");
        assert!(h.repo.is_authenticated());
        let record = h.store.snapshot();
        assert_eq!(record.access_token, "access-1");
        assert_eq!(record.refresh_token, "refresh-1");
        assert_eq!(record.user_email, "ada@example.com");
        assert_eq!(h.cache.get("u-1").unwrap().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn register_uses_same_session_flow() {
        let h = harness(true).await;
        let user = h.repo.register("Ada", "ada@example.com", "pw").await.success().unwrap();
        assert_eq!(user.name, "Ada");
        assert!(h.repo.is_authenticated());
    }

    #[tokio::test]
    async fn login_failure_leaves_no_session() {
        let h = harness(true).await;
        *h.api.login.lock().unwrap() = Outcome::Error(AppError::unauthorized());

        let out = h.repo.login("ada@example.com", "bad").await;
        assert!(matches!(out.error(), Some(AppError::Unauthorized { .. })));
        assert!(!h.repo.is_authenticated());
        assert!(h.cache.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_locally_when_remote_fails() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;
        *h.api.logout.lock().unwrap() = Outcome::Error(AppError::ServerError {
            message: "boom".into(),
            code: 500,
        });

        assert!(h.repo.logout().await.is_success());
        assert!(!h.repo.is_authenticated());
        assert_eq!(h.store.snapshot(), SessionRecord::default());
        assert!(h.cache.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_offline_skips_remote() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;
        h.connectivity.set_online(false);
        let calls = h.api.calls();

        assert!(h.repo.logout().await.is_success());
        assert_eq!(h.api.calls(), calls);
        assert!(!h.repo.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_is_unauthorized() {
        let h = harness(true).await;
        *h.api.login.lock().unwrap() = Outcome::Success(login_response("access-1", None));
        h.repo.login("ada@example.com", "pw").await;
        let calls = h.api.calls();

        let out = h.repo.refresh_token().await;
        assert!(matches!(
            out.error(),
            Some(AppError::Unauthorized { message }) if message == NO_REFRESH_TOKEN
        ));
        assert_eq!(h.api.calls(), calls);
    }

    #[tokio::test]
    async fn refresh_sends_refresh_token_and_keeps_identity() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;

        let token = h.repo.refresh_token().await.success().unwrap();
        assert_eq!(token, "access-2");
        assert_eq!(h.api.refreshed_with.lock().unwrap().as_deref(), Some("refresh-1"));

        let record = h.store.snapshot();
        assert_eq!(record.access_token, "access-2");
        // Server sent no new refresh token.
        assert_eq!(record.refresh_token, "refresh-1");
        assert_eq!(record.user_id, "u-1");
    }

    #[tokio::test]
    async fn current_user_is_none_when_logged_out() {
        let h = harness(true).await;
        assert_eq!(h.repo.get_current_user().await.success(), Some(None));
        assert_eq!(h.api.calls(), 0);
    }

    #[tokio::test]
    async fn current_user_unauthorized_means_no_user() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;
        *h.api.current.lock().unwrap() = Outcome::Error(AppError::unauthorized());

        assert_eq!(h.repo.get_current_user().await.success(), Some(None));
    }

    #[tokio::test]
    async fn current_user_falls_back_to_cache_on_other_errors() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;
        *h.api.current.lock().unwrap() = Outcome::Error(AppError::timeout());

        let user = h.repo.get_current_user().await.success().unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn current_user_offline_reads_cache_only() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;
        h.connectivity.set_online(false);
        let calls = h.api.calls();

        let user = h.repo.get_current_user().await.success().unwrap().unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(h.api.calls(), calls);
    }

    #[tokio::test]
    async fn current_user_online_refreshes_cache() {
        let h = harness(true).await;
        h.repo.login("ada@example.com", "pw").await;
        let mut renamed = login_response("ignored", None);
        renamed.name = "Ada L.".into();
        *h.api.current.lock().unwrap() = Outcome::Success(renamed);

        let user = h.repo.get_current_user().await.success().unwrap().unwrap();
        assert_eq!(user.name, "Ada L.");
        assert_eq!(h.cache.get("u-1").unwrap().unwrap().name, "Ada L.");
    }

    #[tokio::test]
    async fn observe_current_user_follows_session() {
        let h = harness(true).await;
        let mut users = Box::pin(h.repo.observe_current_user());
        assert_eq!(users.next().await.unwrap().success(), Some(None));

        h.repo.login("ada@example.com", "pw").await;
        let user = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(Some(user)) = users.next().await.and_then(|o| o.success()) {
                    break user;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(user.id, "u-1");

        h.repo.logout().await;
        let cleared = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(None) = users.next().await.and_then(|o| o.success()) {
                    break;
                }
            }
        })
        .await;
        assert!(cleared.is_ok());
    }

    // -------------------------------------------------------------------------
    // RemoteAuthApi over HTTP
    // -------------------------------------------------------------------------

    mod remote {
        use super::*;
        use wiremock::matchers::{body_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn envelope(token: &str) -> serde_json::Value {
            serde_json::json!({
                "code": "200",
                "message": "ok",
                "data": {
                    "id": "u-1",
                    "email": "ada@example.com",
                    "name": "Ada",
                    "token": token,
                    "refresh_token": "refresh-9"
                }
            })
        }

        fn api(server: &MockServer) -> RemoteAuthApi {
            let timeout = Duration::from_secs(5);
            let client = ApiClient::new(&server.uri(), timeout, timeout)
                .unwrap()
                .with_token_source(Arc::new(|| Some("bearer-1".to_string())));
            RemoteAuthApi::new(client)
        }

        #[tokio::test]
        async fn login_unwraps_envelope() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/auth/login"))
                .and(body_json(serde_json::json!({"email": "ada@example.com", "password": "pw"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(envelope("access-1")))
                .mount(&server)
                .await;

            let response = api(&server).login("ada@example.com", "pw").await.success().unwrap();
            assert_eq!(response.token, "access-1");
            assert_eq!(response.refresh_token.as_deref(), Some("refresh-9"));
        }

        #[tokio::test]
        async fn refresh_posts_refresh_token() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/auth/refresh"))
                .and(body_json(serde_json::json!({"refresh_token": "refresh-1"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(envelope("access-2")))
                .expect(1)
                .mount(&server)
                .await;

            let response = api(&server).refresh("refresh-1").await.success().unwrap();
            assert_eq!(response.token, "access-2");
        }

        #[tokio::test]
        async fn me_sends_bearer_and_classifies_401() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/auth/me"))
                .and(header("authorization", "Bearer bearer-1"))
                .respond_with(
                    ResponseTemplate::new(401)
                        .set_body_json(serde_json::json!({"message": "expired"})),
                )
                .mount(&server)
                .await;

            let out = api(&server).current_user().await;
            assert!(matches!(
                out.error(),
                Some(AppError::Unauthorized { message }) if message == "expired"
            ));
        }

        #[tokio::test]
        async fn logout_accepts_empty_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/auth/logout"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            assert!(api(&server).logout().await.is_success());
        }
    }
}
