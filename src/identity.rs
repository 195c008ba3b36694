//! Identity mapping
//!
//! Pure combination of the token exchange output, the unverified ID-token
//! claims and the user-info response into a [`CanonicalIdentity`]. Every
//! field except the uid is optional; each one resolves through an explicit
//! ordered extractor list with short-circuit on the first present value.

use crate::error::AuthError;
use crate::models::CanonicalIdentity;
use crate::oauth::TokenResponse;
use serde_json::{Map, Value};

/// Combine token response, ID-token claims and user info into one identity
///
/// # Errors
///
/// Returns `AuthError::MissingIdentity` when no uid is derivable from
/// either the user-info `user.user_id` field or the ID-token `sub` claim.
/// Every other absent field stays absent.
pub fn map_identity(
    tokens: &TokenResponse,
    claims: &Map<String, Value>,
    user_info: &Value,
) -> Result<CanonicalIdentity, AuthError> {
    let provider_uid = first_present(&[
        &|| user_field(user_info, "user_id"),
        &|| claim_field(claims, "sub"),
    ])
    .ok_or(AuthError::MissingIdentity)?;

    let email = first_present(&[
        &|| user_field(user_info, "email"),
        &|| claim_field(claims, "email"),
    ]);

    let first_name = first_present(&[
        &|| user_field(user_info, "first_name"),
        &|| claim_field(claims, "given_name"),
    ]);

    let last_name = first_present(&[
        &|| user_field(user_info, "last_name"),
        &|| claim_field(claims, "family_name"),
    ]);

    let avatar_url = first_present(&[
        &|| user_field(user_info, "avatar"),
        &|| user_field(user_info, "photo_200"),
    ]);

    let phone = user_field(user_info, "phone");

    let scope = tokens.scope.clone().unwrap_or_default();
    let email_verified = is_email_verified(claims, &scope);

    log::info!(
        "identity mapped: uid={} email_present={} email_verified={email_verified}",
        uid_preview(&provider_uid),
        email.is_some()
    );

    Ok(CanonicalIdentity {
        provider_uid,
        email,
        email_verified,
        first_name,
        last_name,
        phone,
        avatar_url,
        raw_claims: claims.clone(),
        raw_user_info: user_info.clone(),
        scope,
    })
}

/// Email-verification heuristic inherited from the source plugin
///
/// True iff the ID token says `email_verified: true`, or the granted scope
/// string contains `email` - scope possession is treated as an implicit
/// verification signal when the provider returns no explicit claim.
fn is_email_verified(claims: &Map<String, Value>, scope: &str) -> bool {
    claims.get("email_verified") == Some(&Value::Bool(true)) || scope.contains("email")
}

/// Evaluate extractors in priority order, short-circuiting on the first hit
fn first_present(extractors: &[&dyn Fn() -> Option<String>]) -> Option<String> {
    extractors.iter().find_map(|extract| extract())
}

/// Read a field of the nested `user` object in the user-info response
fn user_field(user_info: &Value, key: &str) -> Option<String> {
    user_info
        .get("user")
        .and_then(|user| user.get(key))
        .and_then(value_to_string)
}

fn claim_field(claims: &Map<String, Value>, key: &str) -> Option<String> {
    claims.get(key).and_then(value_to_string)
}

/// VK ID is inconsistent about numeric vs string identifiers; accept both
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Truncated uid for log lines; never log the full identifier chain
pub(crate) fn uid_preview(uid: &str) -> &str {
    uid.get(..8).unwrap_or(uid)
}
