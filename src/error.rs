//! Error taxonomy for the exchange and authorization core.

use thiserror::Error;

/// Failures from the realm client and the exchange orchestrator.
///
/// The HTTP-layer variants carry the upstream status code and response body
/// when the realm answered at all; a pure network or timeout failure leaves
/// `status` as `None` and puts the transport error text in `body`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token exchange grant was rejected or unreachable.
    #[error("token exchange failed ({}): {body}", fmt_status(.status))]
    ExchangeFailed { status: Option<u16>, body: String },

    /// Refresh grant was rejected or unreachable.
    #[error("token refresh failed ({}): {body}", fmt_status(.status))]
    RefreshFailed { status: Option<u16>, body: String },

    /// Userinfo call was rejected or unreachable.
    #[error("token introspection failed ({}): {body}", fmt_status(.status))]
    IntrospectFailed { status: Option<u16>, body: String },

    /// Logout/revocation call was rejected or unreachable.
    #[error("token revocation failed ({}): {body}", fmt_status(.status))]
    RevokeFailed { status: Option<u16>, body: String },

    /// No primary-domain token was supplied and the ambient source had none.
    #[error("no primary token available")]
    NoPrimaryToken,

    /// A token's claims segment could not be decoded.
    #[error("failed to decode token claims: {0}")]
    ClaimDecode(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "network error".to_string(),
    }
}

impl AuthError {
    /// Upstream HTTP status, if the realm responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::ExchangeFailed { status, .. }
            | AuthError::RefreshFailed { status, .. }
            | AuthError::IntrospectFailed { status, .. }
            | AuthError::RevokeFailed { status, .. } => *status,
            AuthError::NoPrimaryToken | AuthError::ClaimDecode(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_failed_display_carries_status_and_body() {
        let err = AuthError::ExchangeFailed {
            status: Some(401),
            body: "invalid_client".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP 401"));
        assert!(msg.contains("invalid_client"));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn network_failure_has_no_status() {
        let err = AuthError::RefreshFailed {
            status: None,
            body: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("network error"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn no_primary_token_display() {
        assert_eq!(
            AuthError::NoPrimaryToken.to_string(),
            "no primary token available"
        );
    }
}
