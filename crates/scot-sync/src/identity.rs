//! Credential Claims
//!
//! Best-effort local read of the sign-in credential's payload, used only to
//! show the user's name before the backend confirms who they are.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::models::UserIdentity;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Decode the middle segment of a `header.payload.signature` token.
///
/// Nothing is verified; `None` for anything malformed or without an email.
pub fn decode_credential_claims(token: &str) -> Option<UserIdentity> {
    let payload = token.trim().split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    let email = claims.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())?;
    Some(UserIdentity {
        email,
        name: claims.name.unwrap_or_default(),
        picture: claims.picture.unwrap_or_default(),
    })
}
