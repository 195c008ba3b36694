//! User-info endpoint client
//!
//! VK ID exposes `POST /oauth2/user_info` taking the access token and client
//! ID as a form body and returning a nested `user` object. The fetch is
//! memoized per authentication attempt and never fails past this boundary:
//! any error degrades to an empty object so downstream mapping can fall back
//! to ID-token claims.

use serde_json::Value;

/// Memoizing user-info client, one instance per authentication attempt
#[derive(Debug, Default)]
pub struct UserInfoFetcher {
    cached: Option<Value>,
}

impl UserInfoFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the provider's user-info document, computed at most once
    ///
    /// The first call performs the request and caches the outcome, success
    /// or failure; later calls return the cached value. On any error
    /// (network, non-2xx, parse) the cached value is an empty JSON object
    /// and the cause is logged.
    pub async fn fetch(
        &mut self,
        http: &reqwest::Client,
        endpoint: &str,
        access_token: &str,
        client_id: &str,
    ) -> &Value {
        if self.cached.is_none() {
            let fetched = Self::request(http, endpoint, access_token, client_id)
                .await
                .unwrap_or_else(|reason| {
                    log::error!("user info fetch failed: {reason}");
                    Value::Object(serde_json::Map::new())
                });
            self.cached = Some(fetched);
        }
        self.cached.as_ref().unwrap_or(&Value::Null)
    }

    async fn request(
        http: &reqwest::Client,
        endpoint: &str,
        access_token: &str,
        client_id: &str,
    ) -> Result<Value, String> {
        let params = [("access_token", access_token), ("client_id", client_id)];
        let response = http
            .post(endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("provider returned status {status}"));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| format!("invalid JSON body: {e}"))?;

        log::info!(
            "user info fetched: user_id_present={} email_present={}",
            parsed.pointer("/user/user_id").is_some(),
            parsed.pointer("/user/email").is_some()
        );
        Ok(parsed)
    }
}
