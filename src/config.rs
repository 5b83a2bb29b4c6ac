//! Secondary-realm configuration.

use serde::{Deserialize, Serialize};

/// Default per-call HTTP timeout for realm requests, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the secondary authorization realm.
///
/// Loaded once at startup; the client and exchange service built from it are
/// held for the process lifetime. Rotating the realm endpoint requires a
/// process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Realm server base URL (e.g. `https://keycloak.example.com`).
    pub server_url: String,

    /// Realm name.
    pub realm: String,

    /// Client ID registered in the realm for token exchange.
    pub client_id: String,

    /// Client secret (confidential clients only).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Verify the realm's TLS certificate. Defaults to on; disable only for
    /// non-production realms with self-signed certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Per-call HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cache exchanged tokens per primary user.
    #[serde(default = "default_cache_tokens")]
    pub cache_tokens: bool,
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_cache_tokens() -> bool {
    true
}

impl RealmConfig {
    /// Load realm configuration from environment variables.
    ///
    /// Required: `REALM_URL`, `REALM_NAME`, `REALM_CLIENT_ID`.
    /// Optional: `REALM_CLIENT_SECRET`, `REALM_VERIFY_TLS`,
    /// `REALM_TIMEOUT_SECS`, `REALM_CACHE_TOKENS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let server_url = require_env("REALM_URL")?;
        let realm = require_env("REALM_NAME")?;
        let client_id = require_env("REALM_CLIENT_ID")?;

        let config = Self {
            server_url,
            realm,
            client_id,
            client_secret: std::env::var("REALM_CLIENT_SECRET").ok().filter(|s| !s.is_empty()),
            verify_tls: env_bool("REALM_VERIFY_TLS", default_verify_tls()),
            timeout_secs: std::env::var("REALM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_timeout_secs),
            cache_tokens: env_bool("REALM_CACHE_TOKENS", default_cache_tokens()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_url.trim().is_empty() {
            anyhow::bail!("realm server_url must not be empty");
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            anyhow::bail!("realm server_url must be an http(s) URL: {}", self.server_url);
        }
        if self.realm.trim().is_empty() {
            anyhow::bail!("realm name must not be empty");
        }
        if self.client_id.trim().is_empty() {
            anyhow::bail!("realm client_id must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("realm timeout_secs must be positive");
        }
        Ok(())
    }

    /// Base URL of the realm: `{server_url}/realms/{realm}`.
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.server_url.trim_end_matches('/'), self.realm)
    }

    /// OpenID Connect token endpoint (exchange and refresh grants).
    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    /// OpenID Connect userinfo endpoint.
    pub fn userinfo_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/userinfo", self.realm_url())
    }

    /// OpenID Connect logout endpoint (refresh-token revocation).
    pub fn logout_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/logout", self.realm_url())
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required environment variable {}", name))
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}
