//! Protocol client for the secondary realm's token endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::token::{RealmToken, TokenResponse};
use crate::config::RealmConfig;
use crate::error::AuthError;

/// Token exchange grant type (RFC 8693).
pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// URN for OAuth 2.0 access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// The slice of the realm client the exchange orchestrator depends on.
///
/// `RealmClient` is the production implementation; tests substitute mocks.
#[async_trait]
pub trait TokenBroker: Send + Sync {
    /// Exchange a primary-domain token for a realm token.
    async fn exchange(
        &self,
        subject_token: &str,
        subject_token_type: &str,
    ) -> Result<RealmToken, AuthError>;

    /// Refresh a realm token using its refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<RealmToken, AuthError>;

    /// Ask the realm which claims it reports for an access token.
    async fn introspect(&self, access_token: &str) -> Result<HashMap<String, Value>, AuthError>;
}

/// Stateless client for a Keycloak-style realm.
///
/// Wraps the realm's OpenID Connect endpoints: token exchange and refresh
/// grants on the token endpoint, userinfo for introspection, and logout for
/// refresh-token revocation. One instance is built at startup and shared
/// across all requests; every call is bound by the configured timeout.
pub struct RealmClient {
    config: RealmConfig,
    http: reqwest::Client,
    token_endpoint: String,
    userinfo_endpoint: String,
    logout_endpoint: String,
}

impl RealmClient {
    /// Build a realm client from configuration.
    pub fn new(config: RealmConfig) -> Result<Self> {
        config.validate()?;

        if !config.verify_tls {
            warn!(
                server_url = %config.server_url,
                "TLS certificate verification disabled for realm client"
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .context("Failed to create realm HTTP client")?;

        let token_endpoint = config.token_endpoint();
        let userinfo_endpoint = config.userinfo_endpoint();
        let logout_endpoint = config.logout_endpoint();

        info!(
            realm = %config.realm,
            server_url = %config.server_url,
            "Realm client initialized"
        );

        Ok(Self {
            config,
            http,
            token_endpoint,
            userinfo_endpoint,
            logout_endpoint,
        })
    }

    /// Realm configuration this client was built from.
    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    /// Invalidate a refresh token via the realm's logout endpoint.
    ///
    /// Best-effort: callers may ignore the [`AuthError::RevokeFailed`] result.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        let mut form = vec![("client_id", self.config.client_id.as_str())];
        if let Some(ref secret) = self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form.push(("refresh_token", refresh_token));

        let response = self
            .http
            .post(&self.logout_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::RevokeFailed {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RevokeFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        info!("Realm refresh token revoked");
        Ok(())
    }

    /// POST a grant to the token endpoint and parse the token response.
    ///
    /// `fail` maps HTTP/transport failures into the caller's error variant so
    /// exchange and refresh report distinct failures.
    async fn post_token_grant(
        &self,
        form: &[(&str, &str)],
        fail: fn(Option<u16>, String) -> AuthError,
    ) -> Result<RealmToken, AuthError> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| fail(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(Some(status.as_u16()), body));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| fail(Some(status.as_u16()), format!("invalid token body: {}", e)))?;

        RealmToken::from_response(body)
    }
}

#[async_trait]
impl TokenBroker for RealmClient {
    async fn exchange(
        &self,
        subject_token: &str,
        subject_token_type: &str,
    ) -> Result<RealmToken, AuthError> {
        debug!(realm = %self.config.realm, "Exchanging primary token for realm token");

        let mut form = vec![
            ("grant_type", GRANT_TYPE_TOKEN_EXCHANGE),
            ("client_id", self.config.client_id.as_str()),
            ("subject_token", subject_token),
            ("subject_token_type", subject_token_type),
            ("requested_token_type", ACCESS_TOKEN_TYPE),
        ];
        if let Some(ref secret) = self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let token = self
            .post_token_grant(&form, |status, body| AuthError::ExchangeFailed { status, body })
            .await?;

        info!(
            subject = %token.sub,
            roles = token.roles.len(),
            expires_in = token.expires_in,
            "Token exchange successful"
        );
        Ok(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RealmToken, AuthError> {
        debug!(realm = %self.config.realm, "Refreshing realm token");

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(ref secret) = self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let token = self
            .post_token_grant(&form, |status, body| AuthError::RefreshFailed { status, body })
            .await?;

        info!(subject = %token.sub, expires_in = token.expires_in, "Token refresh successful");
        Ok(token)
    }

    /// Call the realm's userinfo endpoint with a bearer header.
    ///
    /// Returns the claims the realm reports for the token. Fails with
    /// [`AuthError::IntrospectFailed`] on non-2xx responses.
    async fn introspect(&self, access_token: &str) -> Result<HashMap<String, Value>, AuthError> {
        let response = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::IntrospectFailed {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::IntrospectFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::IntrospectFailed {
                status: Some(status.as_u16()),
                body: format!("invalid userinfo body: {}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RealmConfig {
        RealmConfig {
            server_url: "https://keycloak.example.com".to_string(),
            realm: "tools".to_string(),
            client_id: "tool-server".to_string(),
            client_secret: Some("s3cret".to_string()),
            verify_tls: true,
            timeout_secs: 30,
            cache_tokens: true,
        }
    }

    #[test]
    fn client_builds_and_derives_endpoints() {
        let client = RealmClient::new(test_config()).unwrap();
        assert_eq!(
            client.token_endpoint,
            "https://keycloak.example.com/realms/tools/protocol/openid-connect/token"
        );
        assert_eq!(
            client.logout_endpoint,
            "https://keycloak.example.com/realms/tools/protocol/openid-connect/logout"
        );
    }

    #[test]
    fn client_rejects_invalid_config() {
        let mut config = test_config();
        config.client_id = "".to_string();
        assert!(RealmClient::new(config).is_err());
    }

    #[test]
    fn grant_type_urns_are_stable() {
        assert_eq!(
            GRANT_TYPE_TOKEN_EXCHANGE,
            "urn:ietf:params:oauth:grant-type:token-exchange"
        );
        assert_eq!(ACCESS_TOKEN_TYPE, "urn:ietf:params:oauth:token-type:access_token");
    }
}
