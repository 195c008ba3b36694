// PKCE (RFC 7636) code verifier/challenge generation for the S256 method

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE code verifier and challenge pair for one authorization attempt
#[derive(Debug, Clone)]
pub struct PkceCodes {
    /// Code verifier, 43-128 URL-safe base64 characters
    pub verifier: String,
    /// `base64url_nopad(SHA256(verifier))`
    pub challenge: String,
}

impl PkceCodes {
    /// Generate a fresh verifier/challenge pair
    ///
    /// 64 random bytes encode to an 86-character verifier, well inside the
    /// 43-128 window VK ID enforces. Randomness comes from the OS CSPRNG;
    /// if that is unavailable `rand` panics, which aborts the whole
    /// authorization attempt.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 64];
        rand::rng().fill_bytes(&mut bytes);

        let verifier = general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = general_purpose::URL_SAFE_NO_PAD.encode(digest);

        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate the `state` parameter: 32 lowercase hex characters
///
/// Fresh per authorization request and independent of any session-level CSRF
/// state the host sets. The provider requires the parameter; this crate does
/// not validate it on the callback (the PKCE verifier already binds code to
/// session), a documented limitation.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut out, b| {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
        out
    })
}
