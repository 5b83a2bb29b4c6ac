//! Role predicates evaluated against an authorization context.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::exchange::AuthContext;

/// Structured authorization failure.
///
/// This is the final, user-visible shape of a denial: the hosting dispatch
/// layer serializes it (via [`to_response`](Self::to_response)) directly as
/// the operation result instead of letting an error cross the operation
/// boundary.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct AuthorizationError {
    /// Human-readable reason for the denial.
    pub message: String,
    /// Roles that were required but missing, when role-shaped.
    pub required_roles: Vec<String>,
}

impl AuthorizationError {
    pub fn new(message: impl Into<String>, required_roles: Vec<String>) -> Self {
        Self {
            message: message.into(),
            required_roles,
        }
    }

    /// Wrap an unexpected lower-level failure (context resolution, claim
    /// decoding, the realm being unreachable) into an authorization error so
    /// it never escapes a gate raw.
    pub fn from_failure(err: impl fmt::Display) -> Self {
        Self::new(format!("Authorization check failed: {}", err), Vec::new())
    }

    /// The denial as a serializable operation result.
    pub fn to_response(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": "authorization_failed",
            "message": self.message,
            "required_roles": self.required_roles,
        })
    }
}

type CustomCheck = Arc<dyn Fn(&AuthContext) -> bool + Send + Sync>;

/// Declarative gate descriptor for a protected operation.
///
/// Pure over an [`AuthContext`]: evaluation never suspends and never touches
/// shared state.
#[derive(Clone)]
pub enum RolePredicate {
    /// Requires one specific realm role.
    Role(String),
    /// Requires at least one of the listed roles. An empty list never passes.
    AnyOf(Vec<String>),
    /// Requires every listed role. An empty list always passes.
    AllOf(Vec<String>),
    /// Requires a role granted on a specific resource (client).
    ResourceRole { resource: String, role: String },
    /// Arbitrary check over the context, with a caller-supplied denial
    /// message.
    Custom { message: String, check: CustomCheck },
}

impl RolePredicate {
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role(role.into())
    }

    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(roles.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllOf(roles.into_iter().map(Into::into).collect())
    }

    pub fn resource_role(resource: impl Into<String>, role: impl Into<String>) -> Self {
        Self::ResourceRole {
            resource: resource.into(),
            role: role.into(),
        }
    }

    pub fn custom<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&AuthContext) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            message: message.into(),
            check: Arc::new(check),
        }
    }

    /// Evaluate the predicate against a context.
    pub fn evaluate(&self, ctx: &AuthContext) -> Result<(), AuthorizationError> {
        match self {
            RolePredicate::Role(role) => {
                if ctx.has_role(role) {
                    debug!(role = %role, "Authorization passed");
                    Ok(())
                } else {
                    Err(AuthorizationError::new(
                        format!("Insufficient permissions. Required role: {}", role),
                        vec![role.clone()],
                    ))
                }
            }
            RolePredicate::AnyOf(roles) => {
                if roles.iter().any(|r| ctx.has_role(r)) {
                    debug!(roles = ?roles, "Authorization passed (any-of)");
                    Ok(())
                } else {
                    Err(AuthorizationError::new(
                        format!(
                            "Insufficient permissions. Required any of: {}",
                            roles.join(", ")
                        ),
                        roles.clone(),
                    ))
                }
            }
            RolePredicate::AllOf(roles) => {
                let missing: Vec<String> = roles
                    .iter()
                    .filter(|r| !ctx.has_role(r))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    debug!(roles = ?roles, "Authorization passed (all-of)");
                    Ok(())
                } else {
                    Err(AuthorizationError::new(
                        format!(
                            "Insufficient permissions. Missing roles: {}",
                            missing.join(", ")
                        ),
                        missing,
                    ))
                }
            }
            RolePredicate::ResourceRole { resource, role } => {
                if ctx.has_resource_role(resource, role) {
                    debug!(resource = %resource, role = %role, "Authorization passed (resource)");
                    Ok(())
                } else {
                    Err(AuthorizationError::new(
                        format!("Insufficient permissions. Required: {}:{}", resource, role),
                        vec![format!("{}:{}", resource, role)],
                    ))
                }
            }
            RolePredicate::Custom { message, check } => {
                if check(ctx) {
                    debug!("Custom authorization check passed");
                    Ok(())
                } else {
                    Err(AuthorizationError::new(message.clone(), Vec::new()))
                }
            }
        }
    }
}

impl fmt::Debug for RolePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolePredicate::Role(role) => f.debug_tuple("Role").field(role).finish(),
            RolePredicate::AnyOf(roles) => f.debug_tuple("AnyOf").field(roles).finish(),
            RolePredicate::AllOf(roles) => f.debug_tuple("AllOf").field(roles).finish(),
            RolePredicate::ResourceRole { resource, role } => f
                .debug_struct("ResourceRole")
                .field("resource", resource)
                .field("role", role)
                .finish(),
            RolePredicate::Custom { message, .. } => f
                .debug_struct("Custom")
                .field("message", message)
                .finish_non_exhaustive(),
        }
    }
}
