//! Account resolution
//!
//! Turns a [`CanonicalIdentity`] into an [`AuthenticationResult`]: find the
//! existing link, migrate a legacy `vkontakte` link in place, or prepare the
//! fields for the host's fresh-account path. The host persistence layer
//! stays behind the [`LinkedAccountStore`] and [`UserDirectory`] traits.

use crate::identity::uid_preview;
use crate::models::{
    AuthenticationResult, CanonicalIdentity, LinkedAccount, LEGACY_PROVIDER_NAME, PROVIDER_NAME,
};
use serde_json::{Map, Value};

/// Host platform maximum username length
const MAX_USERNAME_LEN: usize = 20;

/// Safety valve for the collision loop; the last candidate is returned even
/// if still taken once the cap is hit, the host's unique constraint is the
/// final backstop
const USERNAME_ATTEMPT_CAP: u32 = 1000;

/// Host-persisted linked-account storage
pub trait LinkedAccountStore {
    /// Look up the link for `(provider_name, provider_uid)`
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying storage fails; the resolver
    /// treats that as "no link" and logs it.
    fn find(&self, provider_name: &str, provider_uid: &str)
        -> anyhow::Result<Option<LinkedAccount>>;

    /// Look up the link a given local user holds under `provider_name`
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying storage fails.
    fn find_by_user(&self, provider_name: &str, user_id: u64)
        -> anyhow::Result<Option<LinkedAccount>>;

    /// Rewrite the provider name of an existing link in place, preserving
    /// `user_id` and `provider_uid`
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying storage fails; migration then
    /// degrades to the fresh-account path.
    fn set_provider_name(
        &self,
        provider_name: &str,
        provider_uid: &str,
        new_provider_name: &str,
    ) -> anyhow::Result<()>;
}

/// Host user directory, only consulted for username uniqueness
///
/// One probe per candidate; the resolver does not lock across concurrent
/// signups, the host-level unique constraint catches the remaining race.
pub trait UserDirectory {
    fn username_exists(&self, username: &str) -> bool;
}

/// Maps canonical identities onto local user records
pub struct Authenticator<S, D> {
    store: S,
    directory: D,
}

impl<S: LinkedAccountStore, D: UserDirectory> Authenticator<S, D> {
    pub fn new(store: S, directory: D) -> Self {
        Self { store, directory }
    }

    /// The underlying linked-account store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve an identity to an authentication result
    ///
    /// Never fails: lookup and migration errors degrade to the
    /// fresh-account path with `user_id` unset.
    pub fn resolve(&self, identity: &CanonicalIdentity) -> AuthenticationResult {
        let user_id = self.resolve_user(&identity.provider_uid);
        let username = self.generate_username(identity);

        AuthenticationResult {
            email: identity.email.clone(),
            email_valid: identity.email_verified,
            username,
            name: identity.name(),
            avatar_url: identity.avatar_url.clone(),
            extra_data: Self::extra_data(identity),
            user_id,
        }
    }

    /// Display line for the host's preferences page: the linked account's
    /// stored name, falling back to its email, empty when no link exists
    #[must_use]
    pub fn description_for_user(&self, user_id: u64) -> String {
        let info = match self.store.find_by_user(PROVIDER_NAME, user_id) {
            Ok(Some(account)) => account.info,
            Ok(None) => return String::new(),
            Err(e) => {
                log::error!("linked account lookup failed for user_id={user_id}: {e:#}");
                return String::new();
            }
        };
        ["name", "email"]
            .iter()
            .find_map(|key| info.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }

    fn resolve_user(&self, uid: &str) -> Option<u64> {
        match self.store.find(PROVIDER_NAME, uid) {
            Ok(Some(account)) => {
                log::debug!(
                    "existing {PROVIDER_NAME} link found: uid={}",
                    uid_preview(uid)
                );
                return Some(account.user_id);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!(
                    "linked account lookup failed for uid={}: {e:#}",
                    uid_preview(uid)
                );
                return None;
            }
        }
        self.migrate_legacy_account(uid)
    }

    /// One-time in-place migration from the legacy provider namespace
    ///
    /// After the first successful run for a uid, the direct lookup
    /// short-circuits on every later login. Failure is never fatal; the
    /// attempt falls through to the fresh-account path.
    fn migrate_legacy_account(&self, uid: &str) -> Option<u64> {
        let legacy = match self.store.find(LEGACY_PROVIDER_NAME, uid) {
            Ok(found) => found?,
            Err(e) => {
                log::error!(
                    "legacy account lookup failed for uid={}: {e:#}",
                    uid_preview(uid)
                );
                return None;
            }
        };

        match self
            .store
            .set_provider_name(LEGACY_PROVIDER_NAME, uid, PROVIDER_NAME)
        {
            Ok(()) => {
                log::info!(
                    "migrated {LEGACY_PROVIDER_NAME} link to {PROVIDER_NAME}: uid={} user_id={}",
                    uid_preview(uid),
                    legacy.user_id
                );
                Some(legacy.user_id)
            }
            Err(e) => {
                log::error!(
                    "legacy link migration failed for uid={}, using fresh-account path: {e:#}",
                    uid_preview(uid)
                );
                None
            }
        }
    }

    /// Fresh-account username: first name, email local part, or
    /// `vkid_<uid>`, sanitized to `[a-zA-Z0-9_]`, truncated to the platform
    /// maximum and deduplicated against the user directory
    fn generate_username(&self, identity: &CanonicalIdentity) -> String {
        let candidate = identity
            .first_name
            .as_ref()
            .map(|name| name.to_lowercase())
            .or_else(|| {
                identity
                    .email
                    .as_ref()
                    .and_then(|email| email.split('@').next().map(str::to_string))
            })
            .unwrap_or_else(|| format!("{PROVIDER_NAME}_{}", identity.provider_uid));

        let sanitized: String = candidate
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .take(MAX_USERNAME_LEN)
            .collect();

        self.ensure_unique(&sanitized)
    }

    fn ensure_unique(&self, base: &str) -> String {
        if !self.directory.username_exists(base) {
            return base.to_string();
        }

        let mut candidate = base.to_string();
        for n in 1..=USERNAME_ATTEMPT_CAP {
            candidate = format!("{base}_{n}");
            if !self.directory.username_exists(&candidate) {
                return candidate;
            }
        }
        log::warn!("username collision cap reached for base={base}");
        candidate
    }

    fn extra_data(identity: &CanonicalIdentity) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(
            "vkid_user_id".to_string(),
            Value::String(identity.provider_uid.clone()),
        );
        for (key, value) in [
            ("vkid_first_name", &identity.first_name),
            ("vkid_last_name", &identity.last_name),
            ("vkid_phone", &identity.phone),
        ] {
            if let Some(value) = value {
                data.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        data.insert(
            "vkid_scope".to_string(),
            Value::String(identity.scope.clone()),
        );
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity_with, InMemoryLinkedAccounts, InMemoryUsers};

    fn authenticator(
        accounts: &[(&str, &str, u64)],
        usernames: &[&str],
    ) -> Authenticator<InMemoryLinkedAccounts, InMemoryUsers> {
        let store = InMemoryLinkedAccounts::new();
        for (provider, uid, user_id) in accounts {
            store.insert(provider, uid, *user_id);
        }
        Authenticator::new(store, InMemoryUsers::with_usernames(usernames))
    }

    #[test]
    fn test_username_from_first_name() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with("12345", Some("Ivan"), Some("ivan@example.com"));
        let result = auth.resolve(&identity);
        assert!(result.username.starts_with("ivan"));
        assert!(result.username.len() <= 20);
    }

    #[test]
    fn test_username_sanitizes_invalid_characters() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with("12345", Some("Иван-Петр@123"), None);
        let result = auth.resolve(&identity);
        assert!(result
            .username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        assert!(result.username.ends_with("123"));
    }

    #[test]
    fn test_username_collision_appends_counter() {
        let auth = authenticator(&[], &["ivan"]);
        let identity = identity_with("12345", Some("Ivan"), None);
        let result = auth.resolve(&identity);
        assert_eq!(result.username, "ivan_1");
    }

    #[test]
    fn test_username_collision_skips_taken_counters() {
        let auth = authenticator(&[], &["ivan", "ivan_1", "ivan_2"]);
        let identity = identity_with("12345", Some("Ivan"), None);
        let result = auth.resolve(&identity);
        assert_eq!(result.username, "ivan_3");
    }

    #[test]
    fn test_username_falls_back_to_email_local_part() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with("12345", None, Some("petrov@example.com"));
        let result = auth.resolve(&identity);
        assert_eq!(result.username, "petrov");
    }

    #[test]
    fn test_username_falls_back_to_provider_prefixed_uid() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with("12345", None, None);
        let result = auth.resolve(&identity);
        assert_eq!(result.username, "vkid_12345");
    }

    #[test]
    fn test_username_truncated_to_platform_maximum() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with(
            "12345",
            Some("extraordinarily_long_first_name"),
            None,
        );
        let result = auth.resolve(&identity);
        assert_eq!(result.username.len(), 20);
    }

    #[test]
    fn test_collision_cap_returns_last_candidate() {
        struct EverythingTaken;
        impl UserDirectory for EverythingTaken {
            fn username_exists(&self, _username: &str) -> bool {
                true
            }
        }

        let auth = Authenticator::new(InMemoryLinkedAccounts::new(), EverythingTaken);
        let identity = identity_with("12345", Some("ivan"), None);
        let result = auth.resolve(&identity);
        // Cap reached: the last generated candidate comes back even though
        // it is still taken
        assert_eq!(result.username, "ivan_1000");
    }

    #[test]
    fn test_existing_link_resolves_owner() {
        let auth = authenticator(&[(PROVIDER_NAME, "12345", 42)], &[]);
        let identity = identity_with("12345", Some("Ivan"), None);
        let result = auth.resolve(&identity);
        assert_eq!(result.user_id, Some(42));
    }

    #[test]
    fn test_unknown_uid_prepares_fresh_account() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with("404", Some("Ivan"), None);
        let result = auth.resolve(&identity);
        assert_eq!(result.user_id, None);
    }

    #[test]
    fn test_extra_data_carries_provider_attributes() {
        let auth = authenticator(&[], &[]);
        let mut identity = identity_with("12345", Some("Ivan"), None);
        identity.last_name = Some("Petrov".to_string());
        identity.phone = Some("+79991234567".to_string());
        identity.scope = "vkid.personal_info email phone".to_string();

        let result = auth.resolve(&identity);
        assert_eq!(result.extra_data["vkid_user_id"], "12345");
        assert_eq!(result.extra_data["vkid_first_name"], "Ivan");
        assert_eq!(result.extra_data["vkid_last_name"], "Petrov");
        assert_eq!(result.extra_data["vkid_phone"], "+79991234567");
        assert_eq!(result.extra_data["vkid_scope"], "vkid.personal_info email phone");
    }

    #[test]
    fn test_extra_data_omits_absent_attributes() {
        let auth = authenticator(&[], &[]);
        let identity = identity_with("12345", None, None);
        let result = auth.resolve(&identity);
        assert!(!result.extra_data.contains_key("vkid_first_name"));
        assert!(!result.extra_data.contains_key("vkid_phone"));
    }

    #[test]
    fn test_description_for_user_prefers_name_then_email() {
        let store = InMemoryLinkedAccounts::new();
        store.insert_with_info(
            PROVIDER_NAME,
            "1",
            7,
            &[("name", "Ivan Petrov"), ("email", "ivan@example.com")],
        );
        store.insert_with_info(PROVIDER_NAME, "2", 8, &[("email", "anna@example.com")]);
        let auth = Authenticator::new(store, InMemoryUsers::with_usernames(&[]));

        assert_eq!(auth.description_for_user(7), "Ivan Petrov");
        assert_eq!(auth.description_for_user(8), "anna@example.com");
        assert_eq!(auth.description_for_user(9), "");
    }
}
