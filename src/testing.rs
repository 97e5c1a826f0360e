//! Test doubles shared by the unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{IdentityConfig, OnLoad};
use crate::error::{Result, SessionError};
use crate::identity::claims::sign_claims;
use crate::identity::types::{IssuedToken, RoleClaim, TokenClaims, UserProfile};
use crate::identity::IdentityClient;

#[derive(Debug, Clone)]
pub(crate) enum InitScript {
    Authenticated { roles: Vec<&'static str>, ttl_seconds: u64 },
    Anonymous,
    ConfigError,
    Unreachable,
}

#[derive(Debug, Clone)]
pub(crate) enum RefreshScript {
    Succeed { ttl_seconds: u64 },
    Unreachable,
}

pub(crate) fn identity_config() -> IdentityConfig {
    IdentityConfig {
        auth_server_url: "https://idp.example.com/auth".to_string(),
        realm: "test".to_string(),
        client_id: "spa-client".to_string(),
        on_load: OnLoad::CheckSso,
    }
}

/// Mint a token whose realm roles and expiry are as given
pub(crate) fn mint(roles: &[&str], ttl_seconds: u64) -> IssuedToken {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
    let claims = TokenClaims {
        sub: Some("user-1".to_string()),
        exp: Some(now + ttl_seconds as i64),
        iat: Some(now),
        preferred_username: Some("ana".to_string()),
        realm_access: Some(RoleClaim {
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }),
        ..Default::default()
    };
    let token = sign_claims(&claims, b"test-secret").unwrap();
    IssuedToken::from_jwt(token).unwrap()
}

/// Counting, scriptable identity client
pub(crate) struct ScriptedIdentityClient {
    init: Mutex<InitScript>,
    refresh: Mutex<RefreshScript>,
    refresh_latency: Duration,
    profile: Option<UserProfile>,
    logout_fails: bool,
    roles: Mutex<Vec<&'static str>>,
    token: Mutex<Option<IssuedToken>>,
    pub login_targets: Mutex<Vec<String>>,
    pub logout_redirects: Mutex<Vec<Option<String>>>,
    pub init_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl ScriptedIdentityClient {
    pub fn new(init: InitScript) -> Self {
        let roles = match &init {
            InitScript::Authenticated { roles, .. } => roles.clone(),
            _ => Vec::new(),
        };
        Self {
            init: Mutex::new(init),
            refresh: Mutex::new(RefreshScript::Succeed { ttl_seconds: 3600 }),
            refresh_latency: Duration::from_millis(20),
            profile: Some(UserProfile {
                username: Some("ana".to_string()),
                ..Default::default()
            }),
            logout_fails: false,
            roles: Mutex::new(roles),
            token: Mutex::new(None),
            login_targets: Mutex::new(Vec::new()),
            logout_redirects: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
        }
    }

    pub fn authenticated(roles: Vec<&'static str>, ttl_seconds: u64) -> Self {
        Self::new(InitScript::Authenticated { roles, ttl_seconds })
    }

    pub fn with_refresh(self, script: RefreshScript) -> Self {
        *self.refresh.lock().unwrap() = script;
        self
    }

    pub fn with_refreshed_roles(self, roles: Vec<&'static str>) -> Self {
        *self.roles.lock().unwrap() = roles;
        self
    }

    pub fn without_profile(mut self) -> Self {
        self.profile = None;
        self
    }

    pub fn with_failing_logout(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    pub fn set_init(&self, script: InitScript) {
        *self.init.lock().unwrap() = script;
    }

    pub fn set_refresh(&self, script: RefreshScript) {
        *self.refresh.lock().unwrap() = script;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn install(&self, token: Option<IssuedToken>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

#[async_trait]
impl IdentityClient for ScriptedIdentityClient {
    async fn init(&self, _config: &IdentityConfig) -> Result<bool> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.init.lock().unwrap().clone();
        match script {
            InitScript::Authenticated { roles, ttl_seconds } => {
                self.install(Some(mint(&roles, ttl_seconds)));
                Ok(true)
            }
            InitScript::Anonymous => Ok(false),
            InitScript::ConfigError => Err(SessionError::Config("realm not found".to_string())),
            InitScript::Unreachable => Err(SessionError::ProviderUnavailable("connection refused".to_string())),
        }
    }

    async fn login(&self, redirect_target: &str) -> Result<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_targets.lock().unwrap().push(redirect_target.to_string());
        Ok(())
    }

    async fn logout(&self, redirect_uri: Option<&str>) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_redirects
            .lock()
            .unwrap()
            .push(redirect_uri.map(str::to_string));
        self.install(None);
        if self.logout_fails {
            return Err(SessionError::ProviderUnavailable("logout endpoint down".to_string()));
        }
        Ok(())
    }

    async fn refresh(&self, _min_validity_seconds: u64) -> Result<bool> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.refresh_latency).await;
        let script = self.refresh.lock().unwrap().clone();
        match script {
            RefreshScript::Succeed { ttl_seconds } => {
                let roles = self.roles.lock().unwrap().clone();
                self.install(Some(mint(&roles, ttl_seconds)));
                Ok(true)
            }
            RefreshScript::Unreachable => {
                Err(SessionError::ProviderUnavailable("connection refused".to_string()))
            }
        }
    }

    async fn load_profile(&self) -> Result<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile
            .clone()
            .ok_or_else(|| SessionError::ProfileLoad("account endpoint returned 500".to_string()))
    }

    fn credential(&self) -> Option<IssuedToken> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Poll `condition` until it holds, yielding to other tasks in between
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
