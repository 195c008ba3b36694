//! Unverified ID-token claim extraction
//!
//! VK ID returns an `id_token` alongside the access token. Its payload is
//! decoded here without signature verification: the token arrives on the
//! server-to-server channel already authenticated by the token exchange
//! call, which is the only reason the claims are trusted. Never feed this
//! function a token sourced from client-controlled input.

use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Value};

/// Decode the payload segment of a compact JWT without verifying it
///
/// Malformed input (wrong segment count, invalid base64, invalid UTF-8,
/// payload that is not a JSON object) yields an empty claim set; the cause
/// is logged, never propagated. Downstream mapping treats missing claims as
/// absent fields.
#[must_use]
pub fn decode_unverified_claims(id_token: &str) -> Map<String, Value> {
    match decode_payload(id_token) {
        Ok(claims) => {
            log::debug!(
                "ID token decoded: sub_present={} email_verified={:?}",
                claims.contains_key("sub"),
                claims.get("email_verified")
            );
            claims
        }
        Err(reason) => {
            log::warn!("failed to decode ID token payload: {reason}");
            Map::new()
        }
    }
}

fn decode_payload(id_token: &str) -> Result<Map<String, Value>, String> {
    let parts: Vec<&str> = id_token.split('.').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 segments, got {}", parts.len()));
    }

    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .or_else(|_| general_purpose::STANDARD.decode(parts[1]))
        .map_err(|_| "base64 decode failed".to_string())?;

    let payload_str =
        String::from_utf8(payload_bytes).map_err(|_| "UTF-8 decode failed".to_string())?;

    match serde_json::from_str::<Value>(&payload_str) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err("payload is not a JSON object".to_string()),
        Err(_) => Err("JSON parse failed".to_string()),
    }
}
