//! VK ID flow client
//!
//! Builds the authorization redirect and completes the callback: token
//! exchange, unverified claim extraction, user-info fetch and identity
//! mapping. One `VkidClient` serves many attempts; the per-attempt state
//! lives in [`AuthAttempt`].

use crate::error::AuthError;
use crate::identity::{map_identity, uid_preview};
use crate::models::CanonicalIdentity;
use crate::oauth::claims::decode_unverified_claims;
use crate::oauth::pkce::{generate_state, PkceCodes};
use crate::oauth::user_info::UserInfoFetcher;
use crate::oauth::{AuthAttempt, OAuthCallback, PendingAuthorization};
use crate::settings::VkidSettings;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

/// Bounded timeout for the token exchange and user-info calls
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Token endpoint response
///
/// The ID token and granted scope are optional; `access_token` is not.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// The two operations a host needs from the VK ID flow
///
/// A trait seam so hosts and tests can substitute the provider-facing
/// implementation.
#[async_trait]
pub trait VkidAuthenticationService {
    /// Build the authorization redirect URL and install the pending
    /// authorization into the attempt context
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the provider is disabled,
    /// missing credentials, or the configured endpoint base is not a valid
    /// URL.
    fn begin_authorization(&self, attempt: &mut AuthAttempt) -> Result<String, AuthError>;

    /// Handle the provider callback: exchange the code and map the identity
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExchange` when the callback is unusable or
    /// the exchange fails, and `AuthError::MissingIdentity` when no uid is
    /// derivable from the provider's responses.
    async fn complete_authorization(
        &self,
        attempt: &mut AuthAttempt,
        callback: &OAuthCallback,
    ) -> Result<CanonicalIdentity, AuthError>;
}

/// Provider-facing client for the VK ID OAuth 2.1 + PKCE flow
pub struct VkidClient {
    settings: VkidSettings,
    http: reqwest::Client,
}

impl VkidClient {
    /// Create a client from validated settings
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the provider is disabled or
    /// credentials are missing, or when the HTTP client cannot be built.
    pub fn new(settings: VkidSettings) -> Result<Self, AuthError> {
        settings.validated_credentials()?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self { settings, http })
    }

    async fn exchange_code(
        &self,
        code: &str,
        device_id: &str,
        verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let (client_id, client_secret) = self.settings.validated_credentials()?;
        let redirect_uri = self.settings.redirect_uri();

        // The client secret travels only in the Authorization header; the
        // provider rejects it as a body or query parameter.
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier),
            ("device_id", device_id),
            ("client_id", client_id.as_str()),
        ];

        log::info!(
            "token exchange: device_id_present={} verifier_present=true",
            !device_id.is_empty()
        );

        let response = self
            .http
            .post(format!("{}/oauth2/auth", self.settings.provider_base))
            .basic_auth(&client_id, Some(&client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            log::error!("token exchange rejected: status={status} body={body}");
            return Err(AuthError::TokenExchange(format!(
                "provider returned status {status}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {e}")))
    }
}

#[async_trait]
impl VkidAuthenticationService for VkidClient {
    fn begin_authorization(&self, attempt: &mut AuthAttempt) -> Result<String, AuthError> {
        let (client_id, _) = self.settings.validated_credentials()?;

        let codes = PkceCodes::generate();
        let state = generate_state();
        let scope = self.settings.scope();

        let mut url = url::Url::parse(&format!("{}/authorize", self.settings.provider_base))
            .map_err(|e| AuthError::Configuration(format!("invalid provider base: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri())
            .append_pair("code_challenge", &codes.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state)
            .append_pair("scope", scope)
            .append_pair("prompt", "login");

        attempt.begin(PendingAuthorization {
            verifier: codes.verifier,
            state,
            created_at: Utc::now(),
        });

        log::info!("authorization started: challenge_method=S256 scope={scope}");
        Ok(url.to_string())
    }

    async fn complete_authorization(
        &self,
        attempt: &mut AuthAttempt,
        callback: &OAuthCallback,
    ) -> Result<CanonicalIdentity, AuthError> {
        if let Some(error) = &callback.error {
            return Err(AuthError::TokenExchange(format!(
                "provider returned error: {error}"
            )));
        }
        let code = callback.code.as_deref().ok_or_else(|| {
            AuthError::TokenExchange("callback missing authorization code".to_string())
        })?;
        // VK ID requires the device identifier it issued on the redirect;
        // pass it through verbatim and let the provider reject its absence
        let device_id = callback.device_id.as_deref().unwrap_or_default();

        // One-shot read: a replayed callback finds no verifier and fails here
        let verifier = attempt.take_verifier().ok_or_else(|| {
            AuthError::TokenExchange("no pending code verifier for this session".to_string())
        })?;

        let tokens = self.exchange_code(code, device_id, &verifier).await?;

        let claims = tokens
            .id_token
            .as_deref()
            .map(decode_unverified_claims)
            .unwrap_or_default();

        // Causally dependent on the exchange, so fetched sequentially
        let (client_id, _) = self.settings.validated_credentials()?;
        let mut fetcher = UserInfoFetcher::new();
        let user_info = fetcher
            .fetch(
                &self.http,
                &format!("{}/oauth2/user_info", self.settings.provider_base),
                &tokens.access_token,
                &client_id,
            )
            .await
            .clone();

        let identity = map_identity(&tokens, &claims, &user_info)?;
        log::info!(
            "authentication completed: uid={} scope={}",
            uid_preview(&identity.provider_uid),
            identity.scope
        );
        Ok(identity)
    }
}
