//! Startup wiring for the exchange and authorization services.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::authz::AuthzHelper;
use crate::cache::TokenCache;
use crate::config::RealmConfig;
use crate::exchange::{PrimaryTokenSource, TokenExchangeService};
use crate::realm::RealmClient;

/// Process-wide authorization services, built once at startup.
///
/// The hosting server constructs this from configuration and threads the
/// `Arc` handles through request handling; there are no hidden globals, and
/// reconfiguring the realm endpoint requires a restart.
pub struct AuthBridge {
    client: Arc<RealmClient>,
    service: Arc<TokenExchangeService>,
    helper: AuthzHelper,
}

impl AuthBridge {
    /// Build the realm client and exchange service from configuration.
    pub fn initialize(config: RealmConfig) -> Result<Self> {
        let cache_tokens = config.cache_tokens;
        let realm = config.realm.clone();
        let client =
            Arc::new(RealmClient::new(config).context("Failed to initialize realm client")?);

        let service = if cache_tokens {
            TokenExchangeService::new(client.clone())
        } else {
            TokenExchangeService::without_cache(client.clone())
        };
        let service = Arc::new(service);
        let helper = AuthzHelper::new(service.clone());

        info!(realm = %realm, caching = cache_tokens, "Authorization bridge initialized");

        Ok(Self {
            client,
            service,
            helper,
        })
    }

    /// Build with a caller-provided cache (e.g. a shared, encrypted store).
    pub fn initialize_with_cache(config: RealmConfig, cache: Arc<dyn TokenCache>) -> Result<Self> {
        let realm = config.realm.clone();
        let client =
            Arc::new(RealmClient::new(config).context("Failed to initialize realm client")?);
        let service = Arc::new(TokenExchangeService::with_cache(client.clone(), cache));
        let helper = AuthzHelper::new(service.clone());

        info!(realm = %realm, "Authorization bridge initialized with external cache");

        Ok(Self {
            client,
            service,
            helper,
        })
    }

    /// Attach an ambient primary-token source to the exchange service.
    ///
    /// Consumes and rebuilds the service handle; call during startup, before
    /// handles are shared.
    pub fn with_token_source(self, source: Arc<dyn PrimaryTokenSource>) -> Result<Self> {
        let Self {
            client,
            service,
            helper,
        } = self;
        drop(helper);

        let service = Arc::try_unwrap(service)
            .map_err(|_| anyhow::anyhow!("token source must be attached before handles are shared"))?
            .with_token_source(source);
        let service = Arc::new(service);
        let helper = AuthzHelper::new(service.clone());

        Ok(Self {
            client,
            service,
            helper,
        })
    }

    /// The realm protocol client (refresh-token revocation lives here).
    pub fn client(&self) -> &Arc<RealmClient> {
        &self.client
    }

    /// The exchange orchestrator.
    pub fn service(&self) -> &Arc<TokenExchangeService> {
        &self.service
    }

    /// Programmatic authorization checks.
    pub fn helper(&self) -> &AuthzHelper {
        &self.helper
    }
}
