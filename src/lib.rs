//! realmgate — token exchange and authorization bridge.
//!
//! Bridges two identity domains for a tool-invocation server: callers
//! authenticate against a primary identity provider (an OIDC-style IdP that
//! issues bearer tokens with decodable claims), while authorization roles
//! live in a secondary Keycloak-style realm reached via OAuth 2.0 token
//! exchange (RFC 8693).
//!
//! The crate provides:
//! - [`realm::RealmClient`]: protocol client for the realm's token endpoint
//!   (exchange, refresh, introspect, revoke).
//! - [`cache::TokenCache`]: expiry-aware per-user token cache with an
//!   in-memory default implementation.
//! - [`exchange::TokenExchangeService`]: the orchestrator turning a primary
//!   token into an [`exchange::AuthContext`] via cache-hit, refresh, or cold
//!   exchange.
//! - [`authz`]: role predicates, operation gates, and programmatic checks
//!   evaluated against the exchanged token's roles.
//!
//! The hosting server constructs an [`bridge::AuthBridge`] once at startup
//! and threads it through request handling; this crate owns no transport.

pub mod authz;
pub mod bridge;
pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod exchange;
pub mod realm;

pub use authz::{AuthorizationError, AuthzHelper, RoleGate, RolePredicate};
pub use bridge::AuthBridge;
pub use cache::{InMemoryTokenCache, TokenCache};
pub use config::RealmConfig;
pub use error::AuthError;
pub use exchange::{AuthContext, PrimaryTokenSource, TokenExchangeService};
pub use realm::{RealmClient, RealmToken, TokenBroker};
