//! Error taxonomy for the VK ID authentication flow
//!
//! Only the fatal failure modes appear here. Non-fatal stages (user-info
//! fetch, ID-token claim decoding, legacy-account migration) degrade in
//! place: they log the cause and return empty data instead of an error, so
//! authentication can continue on whatever identity sources remain.

use thiserror::Error;

/// Fatal authentication errors
///
/// Any of these aborts the attempt. The host should show the end user a
/// generic "authentication failed" message; the variant detail is for
/// server-side logs only and never contains tokens or verifiers.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Provider is disabled or missing client credentials
    #[error("provider configuration error: {0}")]
    Configuration(String),

    /// Token endpoint unreachable, rejected the exchange, or returned an
    /// unparseable response
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// No user identifier derivable from user-info or ID-token claims
    #[error("no user identifier present in user info or ID token claims")]
    MissingIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_exchange_display() {
        let err = AuthError::TokenExchange("provider returned status 401".to_string());
        let rendered = err.to_string();
        assert!(rendered.contains("token exchange failed"));
        assert!(rendered.contains("401"));
    }

    #[test]
    fn test_configuration_error_display() {
        let err = AuthError::Configuration("client_id not configured".to_string());
        assert_eq!(
            err.to_string(),
            "provider configuration error: client_id not configured"
        );
    }
}
