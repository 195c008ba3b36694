//! Testing utilities: in-memory host collaborators and identity fixtures
//!
//! Available to unit tests and, behind the `testing` feature, to the
//! integration tests in `tests/`.

use crate::account::{LinkedAccountStore, UserDirectory};
use crate::models::{CanonicalIdentity, LinkedAccount};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory [`LinkedAccountStore`] backed by a mutex-guarded vector
#[derive(Debug, Default)]
pub struct InMemoryLinkedAccounts {
    accounts: Mutex<Vec<LinkedAccount>>,
}

impl InMemoryLinkedAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, provider_name: &str, provider_uid: &str, user_id: u64) {
        self.insert_with_info(provider_name, provider_uid, user_id, &[]);
    }

    pub fn insert_with_info(
        &self,
        provider_name: &str,
        provider_uid: &str,
        user_id: u64,
        info: &[(&str, &str)],
    ) {
        let info = info
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect();
        self.accounts
            .lock()
            .expect("account store lock poisoned")
            .push(LinkedAccount {
                provider_name: provider_name.to_string(),
                provider_uid: provider_uid.to_string(),
                user_id,
                info,
            });
    }

    /// Snapshot of the stored accounts, for assertions
    #[must_use]
    pub fn all(&self) -> Vec<LinkedAccount> {
        self.accounts
            .lock()
            .expect("account store lock poisoned")
            .clone()
    }
}

impl LinkedAccountStore for InMemoryLinkedAccounts {
    fn find(
        &self,
        provider_name: &str,
        provider_uid: &str,
    ) -> anyhow::Result<Option<LinkedAccount>> {
        Ok(self
            .accounts
            .lock()
            .expect("account store lock poisoned")
            .iter()
            .find(|a| a.provider_name == provider_name && a.provider_uid == provider_uid)
            .cloned())
    }

    fn find_by_user(
        &self,
        provider_name: &str,
        user_id: u64,
    ) -> anyhow::Result<Option<LinkedAccount>> {
        Ok(self
            .accounts
            .lock()
            .expect("account store lock poisoned")
            .iter()
            .find(|a| a.provider_name == provider_name && a.user_id == user_id)
            .cloned())
    }

    fn set_provider_name(
        &self,
        provider_name: &str,
        provider_uid: &str,
        new_provider_name: &str,
    ) -> anyhow::Result<()> {
        let mut accounts = self.accounts.lock().expect("account store lock poisoned");
        let account = accounts
            .iter_mut()
            .find(|a| a.provider_name == provider_name && a.provider_uid == provider_uid)
            .ok_or_else(|| anyhow::anyhow!("no such linked account"))?;
        account.provider_name = new_provider_name.to_string();
        Ok(())
    }
}

/// A [`LinkedAccountStore`] whose every operation fails, for degradation tests
#[derive(Debug, Default)]
pub struct FailingLinkedAccounts;

impl LinkedAccountStore for FailingLinkedAccounts {
    fn find(&self, _: &str, _: &str) -> anyhow::Result<Option<LinkedAccount>> {
        anyhow::bail!("storage unavailable")
    }

    fn find_by_user(&self, _: &str, _: u64) -> anyhow::Result<Option<LinkedAccount>> {
        anyhow::bail!("storage unavailable")
    }

    fn set_provider_name(&self, _: &str, _: &str, _: &str) -> anyhow::Result<()> {
        anyhow::bail!("storage unavailable")
    }
}

/// In-memory [`UserDirectory`] over a set of taken usernames
#[derive(Debug, Default)]
pub struct InMemoryUsers {
    usernames: Mutex<HashSet<String>>,
}

impl InMemoryUsers {
    #[must_use]
    pub fn with_usernames(usernames: &[&str]) -> Self {
        Self {
            usernames: Mutex::new(usernames.iter().map(|u| (*u).to_string()).collect()),
        }
    }

    pub fn add(&self, username: &str) {
        self.usernames
            .lock()
            .expect("user directory lock poisoned")
            .insert(username.to_string());
    }
}

impl UserDirectory for InMemoryUsers {
    fn username_exists(&self, username: &str) -> bool {
        self.usernames
            .lock()
            .expect("user directory lock poisoned")
            .contains(username)
    }
}

/// Canonical identity fixture with the common optional fields
#[must_use]
pub fn identity_with(
    uid: &str,
    first_name: Option<&str>,
    email: Option<&str>,
) -> CanonicalIdentity {
    CanonicalIdentity {
        provider_uid: uid.to_string(),
        email: email.map(str::to_string),
        email_verified: email.is_some(),
        first_name: first_name.map(str::to_string),
        last_name: None,
        phone: None,
        avatar_url: None,
        raw_claims: Map::new(),
        raw_user_info: Value::Null,
        scope: String::new(),
    }
}

/// Unsigned compact JWT with the given JSON payload, signature ignored
#[must_use]
pub fn unsigned_id_token(payload: &Value) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{payload}.ignored")
}
