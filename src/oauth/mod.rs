//! OAuth 2.1 authorization code flow with mandatory PKCE
//!
//! This module owns the protocol state machine: PKCE generation, the
//! authorization request, the per-session pending-authorization context, the
//! token exchange and the user-info fetch. Identity mapping and account
//! resolution live in the `identity` and `account` modules.

pub mod claims;
pub mod client;
pub mod pkce;
pub mod user_info;

pub use claims::decode_unverified_claims;
pub use client::{TokenResponse, VkidAuthenticationService, VkidClient};
pub use pkce::{generate_state, PkceCodes};
pub use user_info::UserInfoFetcher;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Callback parameters the provider sends back via browser redirect
#[derive(Deserialize, Debug, Default, Clone)]
pub struct OAuthCallback {
    pub code: Option<String>,
    /// VK ID issues a device identifier on the callback and requires it
    /// back in the token exchange
    pub device_id: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Verifier and state issued for one authorization request
///
/// Exists only between the authorization redirect and the token exchange,
/// and is consumed on first use.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub verifier: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

/// Per-session authentication context
///
/// Travels from the authorization request to the callback handler. Holds at
/// most one `PendingAuthorization`; starting a new authorization replaces
/// any previous one, and the verifier is read-once.
#[derive(Debug, Default)]
pub struct AuthAttempt {
    pending: Option<PendingAuthorization>,
}

impl AuthAttempt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a pending authorization, replacing any previous one
    pub fn begin(&mut self, pending: PendingAuthorization) {
        if self.pending.is_some() {
            log::debug!("replacing unconsumed pending authorization");
        }
        self.pending = Some(pending);
    }

    /// Take the stored verifier, one-shot
    ///
    /// The first call returns the verifier and clears it; any later call
    /// returns `None`. Replay of a callback therefore cannot re-read it.
    pub fn take_verifier(&mut self) -> Option<String> {
        self.pending.take().map(|p| p.verifier)
    }

    /// State issued with the still-pending authorization, if any
    #[must_use]
    pub fn pending_state(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.state.as_str())
    }
}
