//! End-to-end tests over the identity mapping and account resolution path,
//! using the in-memory host collaborators from the testing module.
//!
//! Run with: cargo test --features testing

use serde_json::json;
use vkid_auth::identity::map_identity;
use vkid_auth::oauth::{decode_unverified_claims, TokenResponse};
use vkid_auth::testing::{
    identity_with, unsigned_id_token, FailingLinkedAccounts, InMemoryLinkedAccounts, InMemoryUsers,
};
use vkid_auth::{Authenticator, LEGACY_PROVIDER_NAME, PROVIDER_NAME};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn token_response(id_token: Option<String>, scope: &str) -> TokenResponse {
    TokenResponse {
        access_token: "access-token".to_string(),
        id_token,
        token_type: Some("Bearer".to_string()),
        expires_in: Some(3600),
        scope: Some(scope.to_string()),
    }
}

#[test]
fn legacy_account_is_migrated_in_place() {
    init_logging();
    let store = InMemoryLinkedAccounts::new();
    store.insert(LEGACY_PROVIDER_NAME, "12345", 42);
    let auth = Authenticator::new(store, InMemoryUsers::with_usernames(&[]));

    let identity = identity_with("12345", Some("Ivan"), None);
    let result = auth.resolve(&identity);

    // (a) the legacy account's owner is the resolved user
    assert_eq!(result.user_id, Some(42));
}

#[test]
fn migration_rewrites_provider_name_preserving_uid_and_owner() {
    let store = InMemoryLinkedAccounts::new();
    store.insert(LEGACY_PROVIDER_NAME, "12345", 42);
    let auth = Authenticator::new(store, InMemoryUsers::with_usernames(&[]));

    let identity = identity_with("12345", Some("Ivan"), None);
    let first = auth.resolve(&identity);
    assert_eq!(first.user_id, Some(42));

    // (b) provider_name rewritten, (c) provider_uid and user_id unchanged
    let accounts = auth.store().all();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].provider_name, PROVIDER_NAME);
    assert_eq!(accounts[0].provider_uid, "12345");
    assert_eq!(accounts[0].user_id, 42);

    // Second login: no legacy record remains, the direct-match path resolves
    let second = auth.resolve(&identity);
    assert_eq!(second.user_id, Some(42));
    let accounts = auth.store().all();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].provider_name, PROVIDER_NAME);
}

#[test]
fn storage_failure_degrades_to_fresh_account() {
    let auth = Authenticator::new(FailingLinkedAccounts, InMemoryUsers::with_usernames(&[]));

    let identity = identity_with("12345", None, None);
    let result = auth.resolve(&identity);

    // Migration failure never aborts authentication
    assert_eq!(result.user_id, None);
    assert_eq!(result.username, "vkid_12345");
}

#[test]
fn full_pipeline_from_tokens_to_result() {
    let id_token = unsigned_id_token(&json!({
        "sub": "12345",
        "email": "ivan@example.com",
        "email_verified": true
    }));
    let tokens = token_response(Some(id_token), "vkid.personal_info email phone");

    let claims = decode_unverified_claims(tokens.id_token.as_deref().unwrap());
    let user_info = json!({
        "user": {
            "user_id": "12345",
            "email": "ivan@example.com",
            "first_name": "Ivan",
            "last_name": "Petrov",
            "phone": "+79991234567",
            "avatar": "https://sun1.userapi.com/test.jpg"
        }
    });

    let identity = map_identity(&tokens, &claims, &user_info).unwrap();
    let auth = Authenticator::new(
        InMemoryLinkedAccounts::new(),
        InMemoryUsers::with_usernames(&[]),
    );
    let result = auth.resolve(&identity);

    assert_eq!(result.email.as_deref(), Some("ivan@example.com"));
    assert!(result.email_valid);
    assert_eq!(result.name, "Ivan Petrov");
    assert!(result.username.starts_with("ivan"));
    assert_eq!(
        result.avatar_url.as_deref(),
        Some("https://sun1.userapi.com/test.jpg")
    );
    assert_eq!(result.extra_data["vkid_user_id"], "12345");
    assert_eq!(
        result.extra_data["vkid_scope"],
        "vkid.personal_info email phone"
    );
    assert_eq!(result.user_id, None);
}

#[test]
fn pipeline_survives_malformed_id_token_when_user_info_present() {
    let tokens = token_response(Some("not-a-jwt".to_string()), "vkid.personal_info");

    let claims = decode_unverified_claims(tokens.id_token.as_deref().unwrap());
    assert!(claims.is_empty());

    let user_info = json!({"user": {"user_id": 777, "first_name": "Anna"}});
    let identity = map_identity(&tokens, &claims, &user_info).unwrap();

    assert_eq!(identity.provider_uid, "777");
    // No claim, no email scope: the heuristic says unverified
    assert!(!identity.email_verified);
}

#[test]
fn collision_on_migrated_user_does_not_shadow_resolution() {
    let store = InMemoryLinkedAccounts::new();
    store.insert(LEGACY_PROVIDER_NAME, "555", 9);
    let auth = Authenticator::new(store, InMemoryUsers::with_usernames(&["ivan"]));

    let identity = identity_with("555", Some("Ivan"), None);
    let result = auth.resolve(&identity);

    // Username generation still runs for the result, resolution is separate
    assert_eq!(result.user_id, Some(9));
    assert_eq!(result.username, "ivan_1");
}
