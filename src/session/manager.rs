//! Process-wide session lifecycle
//!
//! [`SessionManager`] is the only writer of the [`SessionStore`]. Every
//! operation that talks to the identity provider and then writes the session
//! runs under one async mutex, so writes never interleave. Token refreshes
//! additionally go through a single in-flight slot: the first caller that
//! finds the token stale starts the refresh, and everyone arriving while it
//! runs awaits that same outcome.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::auth::guard::{LoginTrigger, SessionReader};
use crate::auth::middleware::CredentialSource;
use crate::auth::roles::RoleSet;
use crate::config::{IdentityConfig, OnLoad, SessionSettings};
use crate::error::{Result, SessionError};
use crate::identity::types::UserProfile;
use crate::identity::IdentityClient;
use super::store::SessionStore;

/// Where a login forced by `on_load = "login-required"` returns to
const APP_ROOT: &str = "/";

/// Shortest pause between two timer-driven refreshes
const MIN_TIMER_INTERVAL: Duration = Duration::from_secs(5);

type RefreshOutcome = Shared<BoxFuture<'static, bool>>;

/// Thresholds beyond `i64::MAX` seconds are treated as "always refresh"
fn threshold_as_secs(threshold_seconds: u64) -> i64 {
    i64::try_from(threshold_seconds).unwrap_or(i64::MAX)
}

struct PendingRefresh {
    generation: u64,
    outcome: RefreshOutcome,
}

struct Inner {
    client: Arc<dyn IdentityClient>,
    identity: IdentityConfig,
    settings: SessionSettings,
    store: Arc<SessionStore>,
    bootstrapped: OnceCell<bool>,
    mutation: tokio::sync::Mutex<()>,
    refresh_slot: Mutex<Option<PendingRefresh>>,
    next_generation: AtomicU64,
}

impl Inner {
    /// Copy the client's current credential and roles into the store.
    /// Returns whether the session is authenticated afterwards.
    fn sync_from_client(&self) -> bool {
        match self.client.credential() {
            Some(credential) => {
                let roles = self
                    .client
                    .get_claims()
                    .map(|claims| claims.roles())
                    .unwrap_or_default();
                tracing::debug!("Session credential updated, roles: [{}]", roles);
                self.store.apply_credential(credential, roles);
                true
            }
            None => {
                tracing::warn!("Identity client reported a session but holds no token");
                self.store.reset();
                false
            }
        }
    }

    /// Seconds left on the stored token, `None` without a session
    fn remaining_seconds(&self) -> Option<i64> {
        self.store
            .read(|session| session.seconds_until_expiry(SystemTime::now()))
    }

    async fn run_refresh(&self, threshold_seconds: u64) -> bool {
        let _mutation = self.mutation.lock().await;

        match self.remaining_seconds() {
            // Logged out while this refresh waited for its turn
            None => return false,
            // A refresh that finished just before this one already did the work
            Some(remaining) if remaining > threshold_as_secs(threshold_seconds) => {
                tracing::debug!("Token already fresh, skipping refresh");
                return true;
            }
            Some(_) => {}
        }

        match self.client.refresh(threshold_seconds).await {
            Ok(refreshed) => {
                tracing::debug!("Token refresh finished (new token issued: {})", refreshed);
                self.sync_from_client()
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, ending session: {}", e);
                self.store.reset();
                false
            }
        }
    }

    fn clear_refresh_slot(&self, generation: u64) {
        let mut slot = self.refresh_slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|pending| pending.generation == generation) {
            *slot = None;
        }
    }
}

/// Owner of the process-wide session
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager with its own, initially empty, session store
    pub fn new(
        client: Arc<dyn IdentityClient>,
        identity: IdentityConfig,
        settings: SessionSettings,
    ) -> Self {
        Self::with_store(client, identity, settings, Arc::new(SessionStore::new()))
    }

    /// Create a manager that writes to an existing store
    pub fn with_store(
        client: Arc<dyn IdentityClient>,
        identity: IdentityConfig,
        settings: SessionSettings,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                identity,
                settings,
                store,
                bootstrapped: OnceCell::new(),
                mutation: tokio::sync::Mutex::new(()),
                refresh_slot: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Read handle to the session store
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.inner.store)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Initialize the identity client once per process.
    ///
    /// Later calls return the first result without contacting the provider.
    /// Only a configuration error fails; an unreachable provider leaves the
    /// session unauthenticated.
    pub async fn bootstrap(&self) -> Result<bool> {
        let authenticated = self
            .inner
            .bootstrapped
            .get_or_try_init(|| self.run_bootstrap())
            .await?;
        Ok(*authenticated)
    }

    async fn run_bootstrap(&self) -> Result<bool> {
        let authenticated = {
            let _mutation = self.inner.mutation.lock().await;
            if let Err(e) = self.inner.identity.validate() {
                tracing::error!("Identity configuration invalid: {}", e);
                self.inner.store.reset();
                return Err(e);
            }
            match self.inner.client.init(&self.inner.identity).await {
                Ok(true) => self.inner.sync_from_client(),
                Ok(false) => {
                    self.inner.store.reset();
                    false
                }
                Err(e) if e.is_config() => {
                    tracing::error!("Identity client configuration rejected: {}", e);
                    self.inner.store.reset();
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Identity client initialization failed: {}", e);
                    self.inner.store.reset();
                    false
                }
            }
        };

        tracing::info!("Session bootstrapped. Authenticated: {}", authenticated);

        if authenticated {
            self.spawn_profile_load();
        } else if self.inner.identity.on_load == OnLoad::LoginRequired {
            self.begin_login(APP_ROOT);
        }
        Ok(authenticated)
    }

    /// Fetch the profile in the background; outside a runtime it loads on
    /// first use instead
    fn spawn_profile_load(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime for eager profile load, deferring");
            return;
        };
        let manager = self.clone();
        handle.spawn(async move {
            if let Err(e) = manager.load_profile().await {
                tracing::warn!("Eager profile load failed: {}", e);
            }
        });
    }

    /// Hand control to the identity provider's login page.
    ///
    /// Terminal for the current navigation: in a browser the returned future
    /// normally never completes because the page navigates away. When the
    /// provider does complete the login in place, its credential replaces
    /// the session.
    pub async fn login(&self, return_target: &str) -> Result<()> {
        tracing::info!("Starting login, returning to {}", return_target);
        // No lock while the provider has control; logout must stay possible.
        self.inner.client.login(return_target).await?;

        let authenticated = {
            let _mutation = self.inner.mutation.lock().await;
            if self.inner.client.credential().is_none() {
                false
            } else {
                // Possibly another user: drop the old roles and profile.
                self.inner.store.reset();
                self.inner.sync_from_client()
            }
        };

        if authenticated {
            tracing::info!("Login completed");
            self.spawn_profile_load();
        }
        Ok(())
    }

    /// Make sure the token stays valid for more than `threshold_seconds`.
    ///
    /// Returns `false` when there is no session or the refresh failed, in
    /// which case the session has been terminated.
    pub async fn ensure_fresh(&self, threshold_seconds: u64) -> bool {
        match self.inner.remaining_seconds() {
            None => return false,
            Some(remaining) if remaining > threshold_as_secs(threshold_seconds) => return true,
            Some(_) => {}
        }

        self.pending_refresh(threshold_seconds).await
    }

    /// Join the in-flight refresh, or start one
    fn pending_refresh(&self, threshold_seconds: u64) -> RefreshOutcome {
        let mut slot = self
            .inner
            .refresh_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pending) = slot.as_ref() {
            tracing::debug!("Joining in-flight token refresh");
            return pending.outcome.clone();
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        // Spawned so the refresh completes even if every waiter goes away.
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let refreshed = inner.run_refresh(threshold_seconds).await;
            inner.clear_refresh_slot(generation);
            refreshed
        });

        let inner = Arc::clone(&self.inner);
        let outcome = async move {
            match task.await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    tracing::error!("Token refresh task aborted: {}", e);
                    inner.clear_refresh_slot(generation);
                    false
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(PendingRefresh {
            generation,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// End the session at the provider and locally.
    ///
    /// The local session is reset even when the provider call fails.
    pub async fn logout(&self) {
        let _mutation = self.inner.mutation.lock().await;
        let redirect = self.inner.settings.post_logout_redirect_uri.as_deref();
        if let Err(e) = self.inner.client.logout(redirect).await {
            tracing::warn!("Identity provider logout failed, clearing local session anyway: {}", e);
        }
        self.inner.store.reset();
        tracing::info!("Session ended");
    }

    /// The user's profile, fetched on first use and cached until logout
    pub async fn load_profile(&self) -> Result<UserProfile> {
        if let Some(profile) = self.inner.store.profile() {
            return Ok(profile);
        }

        let _mutation = self.inner.mutation.lock().await;
        if let Some(profile) = self.inner.store.profile() {
            return Ok(profile);
        }
        if !self.inner.store.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        let profile = self.inner.client.load_profile().await.map_err(|e| match e {
            SessionError::ProfileLoad(_) => e,
            other => SessionError::ProfileLoad(other.to_string()),
        })?;
        self.inner.store.set_profile(profile.clone());
        Ok(profile)
    }

    /// Cached profile, if one has been loaded
    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.store.profile()
    }

    /// Username from the cached profile, falling back to the token claims
    pub fn username(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        self.profile()
            .and_then(|profile| profile.username)
            .or_else(|| {
                self.inner
                    .client
                    .get_claims()
                    .and_then(|claims| claims.preferred_username)
            })
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    pub fn current_roles(&self) -> RoleSet {
        self.inner.store.roles()
    }

    pub fn current_token(&self) -> Option<String> {
        self.inner.store.token()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.inner.store.read(|session| session.roles().contains(role))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.inner.store.read(|session| session.roles().has_any(roles))
    }

    /// Keep the token fresh in the background.
    ///
    /// The task wakes shortly before the token would cross the refresh
    /// threshold and stops once the session is gone.
    pub fn spawn_refresh_timer(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let threshold = manager.inner.settings.refresh_threshold_seconds;
            let mut just_refreshed = false;
            loop {
                let Some(remaining) = manager.inner.remaining_seconds() else {
                    tracing::debug!("Refresh timer stopping: no session");
                    break;
                };

                let wait = remaining.saturating_sub(threshold_as_secs(threshold));
                if wait > 0 {
                    tokio::time::sleep(Duration::from_secs(wait as u64)).await;
                } else if just_refreshed {
                    tokio::time::sleep(MIN_TIMER_INTERVAL).await;
                }

                if !manager.ensure_fresh(threshold).await {
                    tracing::info!("Refresh timer stopping: session ended");
                    break;
                }
                just_refreshed = true;
            }
        })
    }
}

impl SessionReader for SessionManager {
    fn is_authenticated(&self) -> bool {
        SessionManager::is_authenticated(self)
    }

    fn current_roles(&self) -> RoleSet {
        SessionManager::current_roles(self)
    }
}

/// Inside a tokio runtime the login is spawned and the caller returns at
/// once. Without one it is driven to completion on the calling thread.
impl LoginTrigger for SessionManager {
    fn begin_login(&self, return_target: &str) {
        let manager = self.clone();
        let target = return_target.to_string();
        let login = async move {
            if let Err(e) = manager.login(&target).await {
                tracing::warn!("Login could not be started: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(login);
            }
            Err(_) => {
                tracing::debug!("No tokio runtime, running login on the calling thread");
                futures::executor::block_on(login);
            }
        }
    }
}

#[async_trait]
impl CredentialSource for SessionManager {
    async fn fresh_token(&self, threshold_seconds: u64) -> Option<String> {
        if self.ensure_fresh(threshold_seconds).await {
            self.current_token()
        } else {
            None
        }
    }
}
