use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const BEARER_PREFIX: &str = "Bearer ";

const TOKEN_PAYLOAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl TokenClaims {
    /// A token stops being usable during the second named by `exp`.
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        self.exp <= now_unix
    }

    pub fn remaining_secs(&self, now_unix: i64) -> i64 {
        (self.exp - now_unix).max(0)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not made of three dot-separated segments")]
    Malformed,
    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not a valid claims object: {0}")]
    Claims(#[from] serde_json::Error),
}

pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim_start()
}

pub fn bearer_header(token: &str) -> String {
    format!("{BEARER_PREFIX}{}", strip_bearer(token))
}

/// Extracts the token from an `Authorization: Bearer TOKEN` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

/// Reads the claims of a JWT-shaped token without verifying its signature.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut segments = strip_bearer(token).split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let bytes = TOKEN_PAYLOAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn is_token_expired_at(token: &str, now_unix: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.is_expired_at(now_unix),
        Err(err) => {
            warn!(error = %err, "treating undecodable token as expired");
            true
        }
    }
}

pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, now_unix())
}
