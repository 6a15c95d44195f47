//! Session tokens and the cookie that carries them.
//!
//! A session is a signed HS256 JWT whose claims are the caller's identity
//! payload plus `iat`/`exp`. Nothing is kept server side: a token is valid while
//! its signature checks out against the current secret and `exp` is in the future.
//!
//! `verify_request` turns a request's headers into a `Verdict`; the HTTP layer
//! decides what to do with it (see `server::middleware::require_session`).

use axum::http::{HeaderMap, HeaderValue};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};
use crate::storage::JsonDocument;

pub const TOKEN_COOKIE: &str = "token";
pub const TOKEN_TTL_SECS: i64 = 60 * 60;

/// Signing and verification keys derived from `ACCESS_TOKEN_SECRET`.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self { encoding: EncodingKey::from_secret(secret.as_bytes()), decoding: DecodingKey::from_secret(secret.as_bytes()) }
    }
}

/// Decoded session claims, attached to the request once the token verifies.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub claims: JsonDocument,
}

impl Identity {
    pub fn email(&self) -> Option<&str> { self.claims.get("email").and_then(|v| v.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    Expired,
    InvalidToken,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingToken => "missing_token",
            DenyReason::Expired => "expired_token",
            DenyReason::InvalidToken => "invalid_token",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow(Identity),
    Deny(DenyReason),
}

/// Sign `identity` into a token valid for `TOKEN_TTL_SECS` from `now` (unix seconds).
/// `iat`/`exp` supplied by the caller are overwritten.
pub fn issue_token(keys: &TokenKeys, identity: JsonValue, now: i64) -> AppResult<String> {
    let JsonValue::Object(mut claims) = identity else {
        return Err(AppError::user("invalid_identity", "identity payload must be a JSON object"));
    };
    claims.insert("iat".to_string(), JsonValue::from(now));
    claims.insert("exp".to_string(), JsonValue::from(now + TOKEN_TTL_SECS));
    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|e| AppError::internal("token_signing", e.to_string().as_str()))
}

/// Check signature and expiry of a raw token. Expiry has no leeway.
pub fn verify_token(keys: &TokenKeys, token: &str) -> Verdict {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    // identity payloads are caller-shaped; an `aud` key there is just data
    validation.validate_aud = false;
    match decode::<JsonDocument>(token, &keys.decoding, &validation) {
        Ok(data) => Verdict::Allow(Identity { claims: data.claims }),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => Verdict::Deny(DenyReason::Expired),
            _ => Verdict::Deny(DenyReason::InvalidToken),
        },
    }
}

/// Verify the session carried by a request. A missing cookie is denied without decoding anything.
pub fn verify_request(headers: &HeaderMap, keys: &TokenKeys) -> Verdict {
    match parse_cookie(headers, TOKEN_COOKIE) {
        Some(token) if !token.is_empty() => verify_token(keys, &token),
        _ => Verdict::Deny(DenyReason::MissingToken),
    }
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(axum::http::header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k.trim() == name { return Some(v.trim().to_string()); }
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite { Strict, Lax, None }

impl SameSite {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self { SameSite::Strict => "Strict", SameSite::Lax => "Lax", SameSite::None => "None" }
    }
}

/// Attributes of the session cookie. `secure` stays off for plain-http local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self { Self { secure: false, same_site: SameSite::Lax } }
}

fn cookie_header(value: &str, max_age: i64, policy: &CookiePolicy) -> AppResult<HeaderValue> {
    let mut s = format!("{}={}; HttpOnly; Path=/; Max-Age={}; SameSite={}", TOKEN_COOKIE, value, max_age, policy.same_site.as_str());
    if policy.secure { s.push_str("; Secure"); }
    HeaderValue::from_str(&s).map_err(|e| AppError::internal("cookie_header", e.to_string().as_str()))
}

pub fn session_cookie(token: &str, policy: &CookiePolicy) -> AppResult<HeaderValue> {
    cookie_header(token, TOKEN_TTL_SECS, policy)
}

pub fn clear_session_cookie(policy: &CookiePolicy) -> AppResult<HeaderValue> {
    cookie_header("", 0, policy)
}
