//! Role-based authorization for protected operations.
//!
//! Predicates describe what a caller must hold (a realm role, any/all of a
//! set, a resource-scoped role, or an arbitrary check); gates wrap a
//! protected operation and enforce a predicate before invoking it; the
//! helper offers the same checks as plain booleans for callers that branch
//! on authorization state themselves.

pub mod gate;
pub mod predicate;

pub use gate::{AuthzHelper, GuardedOperation, RoleGate};
pub use predicate::{AuthorizationError, RolePredicate};
