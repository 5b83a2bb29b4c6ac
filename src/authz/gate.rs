//! Operation gates and programmatic authorization checks.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use super::predicate::{AuthorizationError, RolePredicate};
use crate::exchange::{AuthContext, TokenExchangeService};

/// A protected operation wrapped by a gate.
///
/// The dispatch layer registers one implementation per named tool; the gate
/// hands it the resolved [`AuthContext`] along with the call arguments.
#[async_trait]
pub trait GuardedOperation: Send + Sync {
    async fn invoke(&self, ctx: &AuthContext, args: Value) -> Result<Value>;
}

/// Gate enforcing a role predicate in front of a protected operation.
///
/// On invocation the gate resolves an authorization context through the
/// exchange service, evaluates its predicate, and only then calls the
/// wrapped operation. A denial or any lower-level failure comes back as a
/// structured [`AuthorizationError`]; nothing else escapes the gate.
pub struct RoleGate {
    service: Arc<TokenExchangeService>,
    predicate: RolePredicate,
    inner: Arc<dyn GuardedOperation>,
}

impl RoleGate {
    pub fn new(
        service: Arc<TokenExchangeService>,
        predicate: RolePredicate,
        inner: Arc<dyn GuardedOperation>,
    ) -> Self {
        Self {
            service,
            predicate,
            inner,
        }
    }

    /// Run the gated operation.
    ///
    /// Returns the target's result unchanged on success. On denial, returns
    /// the structured error without invoking the target. Failures while
    /// obtaining the context or running the target are wrapped into
    /// [`AuthorizationError`] rather than propagated raw.
    pub async fn invoke(
        &self,
        primary_token: Option<&str>,
        args: Value,
    ) -> Result<Value, AuthorizationError> {
        let ctx = match self.service.get_context(primary_token).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(error = %e, "Failed to resolve authorization context");
                return Err(AuthorizationError::from_failure(e));
            }
        };

        if let Err(denied) = self.predicate.evaluate(&ctx) {
            warn!(
                user = %ctx.email(),
                reason = %denied.message,
                "Authorization failed"
            );
            return Err(denied);
        }

        self.inner.invoke(&ctx, args).await.map_err(|e| {
            error!(error = %e, "Gated operation failed");
            AuthorizationError::from_failure(e)
        })
    }

    /// Run the gated operation, collapsing denials into a serializable
    /// result the dispatch layer can return directly.
    pub async fn invoke_as_response(&self, primary_token: Option<&str>, args: Value) -> Value {
        match self.invoke(primary_token, args).await {
            Ok(result) => result,
            Err(denied) => denied.to_response(),
        }
    }
}

/// Programmatic authorization checks for callers that branch on roles
/// instead of being gated.
///
/// Every check swallows resolution errors into a denial (`false` or empty),
/// logging the cause, so branching code never handles exchange failures.
#[derive(Clone)]
pub struct AuthzHelper {
    service: Arc<TokenExchangeService>,
}

impl AuthzHelper {
    pub fn new(service: Arc<TokenExchangeService>) -> Self {
        Self { service }
    }

    /// Whether the caller holds a specific realm role.
    pub async fn check_role(&self, primary_token: Option<&str>, role: &str) -> bool {
        self.check(primary_token, &RolePredicate::role(role)).await
    }

    /// Whether the caller holds at least one of the roles.
    pub async fn check_any_role(&self, primary_token: Option<&str>, roles: &[&str]) -> bool {
        self.check(primary_token, &RolePredicate::any_of(roles.iter().copied()))
            .await
    }

    /// Whether the caller holds every one of the roles.
    pub async fn check_all_roles(&self, primary_token: Option<&str>, roles: &[&str]) -> bool {
        self.check(primary_token, &RolePredicate::all_of(roles.iter().copied()))
            .await
    }

    /// Whether the caller holds a role on a specific resource.
    pub async fn check_resource_role(
        &self,
        primary_token: Option<&str>,
        resource: &str,
        role: &str,
    ) -> bool {
        self.check(primary_token, &RolePredicate::resource_role(resource, role))
            .await
    }

    /// Evaluate an arbitrary predicate (including custom checks).
    pub async fn check(&self, primary_token: Option<&str>, predicate: &RolePredicate) -> bool {
        match self.service.get_context(primary_token).await {
            Ok(ctx) => predicate.evaluate(&ctx).is_ok(),
            Err(e) => {
                error!(error = %e, "Role check failed");
                false
            }
        }
    }

    /// The caller's realm roles, or empty when the context cannot be
    /// resolved.
    pub async fn user_roles(&self, primary_token: Option<&str>) -> Vec<String> {
        match self.service.get_context(primary_token).await {
            Ok(ctx) => ctx.roles,
            Err(e) => {
                error!(error = %e, "Failed to get user roles");
                Vec::new()
            }
        }
    }

    /// Identity summary across both domains, or an empty object on failure.
    pub async fn user_info(&self, primary_token: Option<&str>) -> Value {
        match self.service.get_context(primary_token).await {
            Ok(ctx) => json!({
                "user_id": ctx.user_id(),
                "email": ctx.email(),
                "primary_id": ctx.primary_user_id,
                "realm_id": ctx.realm_user_id,
                "roles": ctx.roles,
            }),
            Err(e) => {
                error!(error = %e, "Failed to get user info");
                json!({})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::testutil::unsigned_jwt;
    use crate::exchange::testutil::{fresh_token, MockBroker};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOp {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GuardedOperation for CountingOp {
        async fn invoke(&self, ctx: &AuthContext, args: Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({
                "success": true,
                "accessed_by": ctx.email(),
                "args": args,
            }))
        }
    }

    struct FailingOp;

    #[async_trait]
    impl GuardedOperation for FailingOp {
        async fn invoke(&self, _ctx: &AuthContext, _args: Value) -> Result<Value> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn primary_token() -> String {
        unsigned_jwt(&json!({"oid": "primary-user-1", "email": "user@example.com"}))
    }

    fn service_with_roles(roles: &[&str]) -> Arc<TokenExchangeService> {
        let broker = Arc::new(MockBroker::exchanging(fresh_token(roles)));
        Arc::new(TokenExchangeService::new(broker))
    }

    #[tokio::test]
    async fn gate_invokes_target_when_role_present() {
        let op = Arc::new(CountingOp {
            calls: AtomicUsize::new(0),
        });
        let gate = RoleGate::new(
            service_with_roles(&["data_reader"]),
            RolePredicate::role("data_reader"),
            op.clone(),
        );

        let result = gate
            .invoke(Some(&primary_token()), json!({"query": "q"}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["accessed_by"], "user@example.com");
        assert_eq!(op.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gate_denies_without_invoking_target() {
        let op = Arc::new(CountingOp {
            calls: AtomicUsize::new(0),
        });
        let gate = RoleGate::new(
            service_with_roles(&["data_reader"]),
            RolePredicate::role("admin"),
            op.clone(),
        );

        let err = gate
            .invoke(Some(&primary_token()), json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.required_roles, vec!["admin"]);
        assert_eq!(op.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exchange_outage_is_wrapped_not_raw() {
        let broker = Arc::new(MockBroker::failing_exchange(Some(503), "realm down"));
        let service = Arc::new(TokenExchangeService::new(broker));
        let op = Arc::new(CountingOp {
            calls: AtomicUsize::new(0),
        });
        let gate = RoleGate::new(service, RolePredicate::role("admin"), op.clone());

        let err = gate
            .invoke(Some(&primary_token()), json!({}))
            .await
            .unwrap_err();

        assert!(err.message.contains("Authorization check failed"));
        // the upstream status survives in the message, so callers can tell
        // an outage from a denial
        assert!(err.message.contains("503"));
        assert_eq!(op.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn target_failure_is_wrapped() {
        let gate = RoleGate::new(
            service_with_roles(&["data_reader"]),
            RolePredicate::role("data_reader"),
            Arc::new(FailingOp),
        );

        let err = gate
            .invoke(Some(&primary_token()), json!({}))
            .await
            .unwrap_err();
        assert!(err.message.contains("backend unavailable"));
    }

    #[tokio::test]
    async fn invoke_as_response_serializes_denials() {
        let gate = RoleGate::new(
            service_with_roles(&[]),
            RolePredicate::role("admin"),
            Arc::new(CountingOp {
                calls: AtomicUsize::new(0),
            }),
        );

        let response = gate.invoke_as_response(Some(&primary_token()), json!({})).await;
        assert_eq!(response["success"], false);
        assert_eq!(response["error"], "authorization_failed");
        assert_eq!(response["required_roles"][0], "admin");
    }

    #[tokio::test]
    async fn helper_checks_report_booleans() {
        let helper = AuthzHelper::new(service_with_roles(&["data_reader", "analyst"]));
        let token = primary_token();

        assert!(helper.check_role(Some(&token), "data_reader").await);
        assert!(!helper.check_role(Some(&token), "admin").await);
        assert!(helper.check_any_role(Some(&token), &["admin", "analyst"]).await);
        assert!(!helper.check_all_roles(Some(&token), &["data_reader", "admin"]).await);
    }

    #[tokio::test]
    async fn helper_swallows_resolution_failures() {
        let broker = Arc::new(MockBroker::failing_exchange(None, "timeout"));
        let helper = AuthzHelper::new(Arc::new(TokenExchangeService::new(broker)));
        let token = primary_token();

        assert!(!helper.check_role(Some(&token), "admin").await);
        assert!(helper.user_roles(Some(&token)).await.is_empty());
        assert_eq!(helper.user_info(Some(&token)).await, json!({}));
    }

    #[tokio::test]
    async fn helper_user_info_spans_both_domains() {
        let helper = AuthzHelper::new(service_with_roles(&["data_reader"]));
        let info = helper.user_info(Some(&primary_token())).await;

        assert_eq!(info["primary_id"], "primary-user-1");
        assert_eq!(info["realm_id"], "realm-user-1");
        assert_eq!(info["roles"][0], "data_reader");
    }
}
