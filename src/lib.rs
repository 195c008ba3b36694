#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! VK ID (OAuth 2.1 + PKCE) authentication connector
//!
//! Implements the server side of VK ID authentication for a forum-style
//! host platform: the authorization code flow with mandatory PKCE, token
//! exchange, unverified ID-token claim extraction, user-info fetch,
//! identity mapping and account resolution with one-time migration of
//! linked accounts from the legacy `vkontakte` provider namespace.
//!
//! The host supplies persistence and session establishment through the
//! [`account::LinkedAccountStore`] and [`account::UserDirectory`] traits
//! and consumes the produced [`models::AuthenticationResult`].

/// Version of the vkid-auth crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod account;
pub mod error;
pub mod identity;
pub mod models;
pub mod oauth;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use account::{Authenticator, LinkedAccountStore, UserDirectory};
pub use error::AuthError;
pub use models::{
    AuthenticationResult, CanonicalIdentity, LinkedAccount, LEGACY_PROVIDER_NAME, PROVIDER_NAME,
};
pub use oauth::{AuthAttempt, OAuthCallback, VkidAuthenticationService, VkidClient};
pub use settings::VkidSettings;
