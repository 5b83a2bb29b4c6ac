//! Exchanged realm token with parsed role claims.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::claims;
use crate::error::AuthError;

/// Tokens within this many seconds of expiry are considered stale and get
/// refreshed ahead of time.
pub const REFRESH_WINDOW_SECS: i64 = 300;

/// JSON body returned by the realm's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    300
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Role claims embedded in a realm access token.
#[derive(Debug, Default, Deserialize)]
struct RoleClaims {
    #[serde(default)]
    realm_access: RealmAccess,
    #[serde(default)]
    resource_access: HashMap<String, ResourceAccess>,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    preferred_username: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceAccess {
    #[serde(default)]
    roles: Vec<String>,
}

/// A token obtained from the secondary realm via exchange or refresh.
///
/// Carries the opaque token strings plus the role claims parsed out of the
/// access token. `expires_at` is always `issued_at + expires_in`.
#[derive(Debug, Clone)]
pub struct RealmToken {
    /// Opaque access token for the realm.
    pub access_token: String,
    /// Refresh token, when the realm granted one. A token without one can
    /// still be cached but cannot be refreshed; a cold exchange is required
    /// once it goes stale.
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// Token kind label, normally `Bearer`.
    pub token_type: String,
    /// Granted scope, if the realm reported one.
    pub scope: Option<String>,
    /// Subject identifier within the realm.
    pub sub: String,
    /// Preferred display name.
    pub preferred_username: String,
    /// Email, when present in the claims.
    pub email: Option<String>,
    /// Realm-wide roles, deduplicated.
    pub roles: Vec<String>,
    /// Roles granted per resource (client), from `resource_access`.
    pub resource_roles: HashMap<String, Vec<String>>,
    /// When this token was obtained.
    pub issued_at: DateTime<Utc>,
    /// When this token expires.
    pub expires_at: DateTime<Utc>,
}

impl RealmToken {
    /// Parse a token-endpoint response, decoding the access token's claims
    /// (without signature verification; the token came off the realm's own
    /// TLS response) to populate roles and resource roles. Missing role
    /// claims map to empty collections.
    pub fn from_response(response: TokenResponse) -> Result<Self, AuthError> {
        let claims_map = claims::decode_unverified(&response.access_token)?;
        let parsed: RoleClaims = serde_json::from_value(serde_json::Value::Object(claims_map))
            .map_err(|e| AuthError::ClaimDecode(format!("unexpected claim shape: {}", e)))?;

        let roles = dedup_preserving_order(parsed.realm_access.roles);
        let resource_roles = parsed
            .resource_access
            .into_iter()
            .map(|(name, access)| (name, dedup_preserving_order(access.roles)))
            .collect();

        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::seconds(response.expires_in as i64);

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            token_type: response.token_type,
            scope: response.scope,
            sub: parsed.sub,
            preferred_username: parsed.preferred_username,
            email: parsed.email,
            roles,
            resource_roles,
            issued_at,
            expires_at,
        })
    }

    /// Whether the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether the token is within the refresh window of its expiry.
    /// Always true when the token is already expired.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() >= self.expires_at - Duration::seconds(REFRESH_WINDOW_SECS)
    }

    /// Whether the token grants the given realm role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether the token grants the given role on the given resource.
    /// Absent resources simply yield false.
    pub fn has_resource_role(&self, resource: &str, role: &str) -> bool {
        self.resource_roles
            .get(resource)
            .is_some_and(|roles| roles.iter().any(|r| r == role))
    }
}

fn dedup_preserving_order(roles: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    roles.into_iter().filter(|r| seen.insert(r.clone())).collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Build a token with the given roles expiring `expires_in_secs` from now.
    pub fn token_with(
        roles: &[&str],
        refresh_token: Option<&str>,
        expires_in_secs: i64,
    ) -> RealmToken {
        let issued_at = Utc::now();
        RealmToken {
            access_token: "realm-access-token".to_string(),
            refresh_token: refresh_token.map(String::from),
            expires_in: expires_in_secs.max(0) as u64,
            token_type: "Bearer".to_string(),
            scope: None,
            sub: "realm-user-1".to_string(),
            preferred_username: "user".to_string(),
            email: Some("user@example.com".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            resource_roles: HashMap::new(),
            issued_at,
            expires_at: issued_at + Duration::seconds(expires_in_secs),
        }
    }
}
