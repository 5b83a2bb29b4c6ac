//! Exchange orchestrator: primary token in, authorization context out.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{InMemoryTokenCache, TokenCache};
use crate::claims;
use crate::error::AuthError;
use crate::realm::{RealmToken, TokenBroker, ACCESS_TOKEN_TYPE};

/// Source for the caller's primary-domain token when one is not passed
/// explicitly. The hosting server implements this over its request context.
pub trait PrimaryTokenSource: Send + Sync {
    /// The bearer token of the current request, if any.
    fn current_token(&self) -> Option<String>;
}

/// Unified view of the primary-domain identity and the exchanged realm token.
///
/// Built fresh on every [`TokenExchangeService::get_context`] call and owned
/// by the calling operation for the duration of one invocation; never
/// persisted or mutated after construction.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Raw primary-domain bearer token.
    pub primary_token: String,
    /// Primary-domain user id: the `oid` claim, falling back to `sub`.
    pub primary_user_id: String,
    /// Primary-domain email: the `email` claim, falling back to
    /// `preferred_username`.
    pub primary_email: Option<String>,
    /// Full primary-domain claim map.
    pub primary_claims: Map<String, Value>,
    /// The exchanged realm token.
    pub realm_token: RealmToken,
    /// User id within the realm (the realm token's subject).
    pub realm_user_id: String,
    /// Realm-wide roles, copied out of the realm token for convenience.
    pub roles: Vec<String>,
}

impl AuthContext {
    /// Primary user identifier.
    pub fn user_id(&self) -> &str {
        &self.primary_user_id
    }

    /// Best-available email: primary email, then realm email, then empty.
    pub fn email(&self) -> &str {
        self.primary_email
            .as_deref()
            .or(self.realm_token.email.as_deref())
            .unwrap_or("")
    }

    /// Realm roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Whether the context carries the given realm role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether the context carries the given role on the given resource.
    pub fn has_resource_role(&self, resource: &str, role: &str) -> bool {
        self.realm_token.has_resource_role(resource, role)
    }
}

/// Orchestrates token exchange and caching into one idempotent operation.
///
/// [`get_context`](Self::get_context) resolves the primary token, consults
/// the cache, refreshes or cold-exchanges as needed, and assembles an
/// [`AuthContext`]. One instance is built at startup and shared by all
/// request tasks; the cache is the only mutable state and tolerates
/// concurrent use (two racing calls for the same stale user may both hit the
/// realm; last write wins and both results are valid).
pub struct TokenExchangeService {
    broker: Arc<dyn TokenBroker>,
    cache: Option<Arc<dyn TokenCache>>,
    token_source: Option<Arc<dyn PrimaryTokenSource>>,
}

impl TokenExchangeService {
    /// Build a service with the default in-memory cache.
    pub fn new(broker: Arc<dyn TokenBroker>) -> Self {
        Self::with_cache(broker, Arc::new(InMemoryTokenCache::new()))
    }

    /// Build a service over a caller-provided cache implementation.
    pub fn with_cache(broker: Arc<dyn TokenBroker>, cache: Arc<dyn TokenCache>) -> Self {
        info!("Token exchange service initialized (caching enabled)");
        Self {
            broker,
            cache: Some(cache),
            token_source: None,
        }
    }

    /// Build a service that exchanges on every call, never caching.
    pub fn without_cache(broker: Arc<dyn TokenBroker>) -> Self {
        info!("Token exchange service initialized (caching disabled)");
        Self {
            broker,
            cache: None,
            token_source: None,
        }
    }

    /// Attach an ambient token source consulted when `get_context` is called
    /// without an explicit token.
    pub fn with_token_source(mut self, source: Arc<dyn PrimaryTokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    /// Resolve a valid authorization context for the current caller.
    ///
    /// Algorithm: resolve the primary token (explicit argument or ambient
    /// source), decode its claims without signature verification (the primary
    /// IdP verified it upstream), then reuse a fresh cached realm token,
    /// refresh a stale one, or cold-exchange. A refresh failure is downgraded
    /// to a cold exchange; an exchange failure is fatal to the call and the
    /// cache is left untouched.
    pub async fn get_context(&self, primary_token: Option<&str>) -> Result<AuthContext, AuthError> {
        let token_str = match primary_token {
            Some(t) => t.to_string(),
            None => self
                .token_source
                .as_ref()
                .and_then(|s| s.current_token())
                .ok_or(AuthError::NoPrimaryToken)?,
        };

        let primary_claims = claims::decode_unverified(&token_str)?;
        let primary_user_id = claims::claim_str(&primary_claims, "oid")
            .or_else(|| claims::claim_str(&primary_claims, "sub"))
            .unwrap_or_default();
        let primary_email = claims::claim_str(&primary_claims, "email")
            .or_else(|| claims::claim_str(&primary_claims, "preferred_username"));
        if primary_user_id.is_empty() {
            // all such callers share one cache key
            warn!("Primary token carries neither an oid nor a sub claim");
        }

        let realm_token = self.resolve_realm_token(&token_str, &primary_user_id).await?;

        let context = AuthContext {
            primary_token: token_str,
            primary_user_id,
            primary_email,
            primary_claims,
            realm_user_id: realm_token.sub.clone(),
            roles: realm_token.roles.clone(),
            realm_token,
        };

        info!(
            user = %context.email(),
            roles = context.roles.len(),
            "Authorization context created"
        );
        Ok(context)
    }

    /// Cache-hit, refresh, or cold-exchange, in that order.
    async fn resolve_realm_token(
        &self,
        primary_token: &str,
        user_id: &str,
    ) -> Result<RealmToken, AuthError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(user_id)) {
            if !cached.needs_refresh() {
                debug!(user = %user_id, "Using cached realm token");
                return Ok(cached);
            }
            if let Some(refresh_token) = cached.refresh_token.clone() {
                match self.broker.refresh(&refresh_token).await {
                    Ok(token) => {
                        if let Some(cache) = &self.cache {
                            cache.put(user_id, token.clone());
                        }
                        return Ok(token);
                    }
                    Err(e) => {
                        // Recoverable: fall through to a cold exchange.
                        warn!(user = %user_id, error = %e, "Token refresh failed, will exchange");
                    }
                }
            }
        }

        let token = self.broker.exchange(primary_token, ACCESS_TOKEN_TYPE).await?;
        if let Some(cache) = &self.cache {
            cache.put(user_id, token.clone());
        }
        Ok(token)
    }

    /// Ask the realm which claims it currently reports for an exchanged
    /// access token. Unlike the local claim decode, this round-trips to the
    /// realm and reflects revocation.
    pub async fn introspect(
        &self,
        access_token: &str,
    ) -> Result<HashMap<String, Value>, AuthError> {
        self.broker.introspect(access_token).await
    }

    /// Drop the cached token for one user.
    pub fn invalidate(&self, user_id: &str) {
        if let Some(cache) = &self.cache {
            cache.delete(user_id);
            info!(user = %user_id, "Cached realm token invalidated");
        }
    }

    /// Drop all cached tokens.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            info!("Realm token cache cleared");
        }
    }
}
