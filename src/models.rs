//! Core data types shared across the authentication flow

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider name under which new links are persisted
///
/// Part of the persisted-schema contract together with
/// [`LEGACY_PROVIDER_NAME`]; both key `LinkedAccount` rows in the host
/// database and must never change once deployed.
pub const PROVIDER_NAME: &str = "vkid";

/// Provider name of the superseded VK plugin whose links are migrated
pub const LEGACY_PROVIDER_NAME: &str = "vkontakte";

/// Canonical identity derived from one authentication event
///
/// Immutable once constructed; combines the token exchange output, the
/// unverified ID-token claims and the user-info response. Not persisted,
/// only consumed by the account resolver.
#[derive(Debug, Clone)]
pub struct CanonicalIdentity {
    pub provider_uid: String,
    pub email: Option<String>,
    /// True iff the ID token carries `email_verified: true` or the granted
    /// scope contains `email`. Scope possession as a verification signal is
    /// an inherited heuristic, not a cryptographic guarantee.
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    /// Unverified ID-token claims, verbatim
    pub raw_claims: Map<String, Value>,
    /// User-info response body, verbatim
    pub raw_user_info: Value,
    /// Scope string granted by the provider, empty when absent
    pub scope: String,
}

impl CanonicalIdentity {
    /// Display name: first and last name joined with a single space,
    /// absent parts omitted
    #[must_use]
    pub fn name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Host-persisted association between a local user and a provider identity
///
/// `(provider_name, provider_uid)` identifies at most one local user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub provider_name: String,
    pub provider_uid: String,
    pub user_id: u64,
    /// Provider data the host stored alongside the link (name, email, ...)
    pub info: Map<String, Value>,
}

/// Outcome of one authentication attempt, handed to the host's
/// session/account subsystem
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub email: Option<String>,
    pub email_valid: bool,
    /// Fresh-account username suggestion, sanitized and deduplicated
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
    /// Provider attributes for the host to store on the link
    /// (`vkid_user_id`, `vkid_first_name`, ...)
    pub extra_data: Map<String, Value>,
    /// Resolved local user, set when a direct or migrated link was found;
    /// `None` sends the host down its standard account-creation path
    pub user_id: Option<u64>,
}
