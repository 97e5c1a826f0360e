//! Configuration parsing module
//!
//! This module provides configuration loading from TOML files covering the
//! identity provider connection, session refresh policy, outbound request
//! exclusions, development-mode identity and the route role table.
//!
//! # Example
//!
//! ```rust,ignore
//! use pep_session::config::load_config;
//!
//! let config = load_config("session.toml")?;
//! let identity = config.identity_config()?;
//! let routes = config.route_table();
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::roles::RoleSet;
use crate::auth::routes::{RouteAuthRequirement, RouteTable};
use crate::{Result, SessionError};

/// Default refresh threshold in seconds
pub const DEFAULT_REFRESH_THRESHOLD_SECONDS: u64 = 70;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Identity provider section
    #[serde(default)]
    pub identity: Option<IdentityConfig>,

    /// Session refresh policy
    #[serde(default)]
    pub session: SessionSettings,

    /// Outbound request settings
    #[serde(default)]
    pub requests: RequestSettings,

    /// Development mode configuration section
    #[serde(default)]
    pub dev: Option<DevConfig>,

    /// Route role requirements, first match wins
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(path)
    }

    /// Get the identity provider configuration
    pub fn identity_config(&self) -> Result<IdentityConfig> {
        self.identity.clone().ok_or_else(|| {
            SessionError::Config("identity configuration not found in config file".to_string())
        })
    }

    /// Get development mode configuration
    pub fn dev_config(&self) -> Option<DevConfig> {
        self.dev.clone()
    }

    /// Prefixes that must never receive a bearer credential: the identity
    /// provider itself plus any configured exclusions
    pub fn excluded_prefixes(&self) -> Vec<String> {
        let mut prefixes = Vec::new();
        if let Some(identity) = &self.identity {
            prefixes.push(identity.auth_server_url.clone());
        }
        prefixes.extend(self.requests.bearer_excluded_urls.iter().cloned());
        prefixes
    }

    /// Build the route role table from the `[[routes]]` entries
    pub fn route_table(&self) -> RouteTable {
        let mut table = RouteTable::new();
        for route in &self.routes {
            table.add(
                &route.path,
                RouteAuthRequirement::new(route.roles.iter().cloned().collect::<RoleSet>()),
            );
        }
        table
    }
}

/// How the identity client should behave at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnLoad {
    /// Restore an existing session silently, stay anonymous otherwise
    #[default]
    CheckSso,
    /// Send the user to the login page if no session can be restored
    LoginRequired,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity server; also the endpoint prefix that never
    /// receives bearer credentials
    pub auth_server_url: String,

    /// Realm name
    pub realm: String,

    /// Client ID
    pub client_id: String,

    /// Startup behavior (default: check-sso)
    #[serde(default)]
    pub on_load: OnLoad,
}

impl IdentityConfig {
    /// Issuer URL for the configured realm
    pub fn issuer_url(&self) -> String {
        format!("{}/realms/{}", self.auth_server_url.trim_end_matches('/'), self.realm)
    }

    /// Reject configurations no identity client could work with
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("auth_server_url", &self.auth_server_url),
            ("realm", &self.realm),
            ("client_id", &self.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(SessionError::Config(format!("identity.{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Session refresh policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Refresh when the token expires within this many seconds
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_seconds: u64,

    /// Where the identity provider should send the browser after logout
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
}

fn default_refresh_threshold() -> u64 {
    DEFAULT_REFRESH_THRESHOLD_SECONDS
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECONDS,
            post_logout_redirect_uri: None,
        }
    }
}

/// Outbound request settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestSettings {
    /// URL prefixes that never get a bearer token attached
    #[serde(default)]
    pub bearer_excluded_urls: Vec<String>,
}

/// Development mode configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevConfig {
    /// Enable local development mode (bypasses the real identity provider)
    #[serde(default)]
    pub local_dev_mode: bool,

    /// Mock username for development
    #[serde(default)]
    pub local_dev_username: Option<String>,

    /// Mock email for development
    #[serde(default)]
    pub local_dev_email: Option<String>,

    /// Mock name for development
    #[serde(default)]
    pub local_dev_name: Option<String>,

    /// Mock roles for development
    #[serde(default)]
    pub local_dev_roles: Vec<String>,

    /// Lifetime of minted dev tokens (default: 300)
    #[serde(default)]
    pub token_lifetime_seconds: Option<u64>,
}

impl DevConfig {
    /// Create a new DevConfig with dev mode enabled
    pub fn enabled() -> Self {
        Self {
            local_dev_mode: true,
            local_dev_username: Some("dev".to_string()),
            local_dev_email: Some("dev@localhost".to_string()),
            local_dev_name: Some("Dev User".to_string()),
            local_dev_roles: vec!["user".to_string()],
            token_lifetime_seconds: None,
        }
    }

    /// Check if dev mode is enabled
    pub fn is_enabled(&self) -> bool {
        self.local_dev_mode
    }

    pub fn token_lifetime_seconds(&self) -> u64 {
        self.token_lifetime_seconds.unwrap_or(300)
    }
}

/// One `[[routes]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Path pattern, e.g. `users/edit/:id`
    pub path: String,

    /// Roles that must all be present (empty = authenticated only)
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Load configuration from a TOML file
///
/// # Example
///
/// ```rust,ignore
/// let config = pep_session::config::load_config("session.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| SessionError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| SessionError::Config(format!("Failed to parse TOML config: {}", e)))
}
