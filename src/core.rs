//! Shared runtime-agnostic logic for async and blocking clients.
//!
//! This module contains data structures and pure functions that are used by both
//! the async client (`client.rs`) and the blocking client (`blocking.rs`).
//!
//! ## Contents
//!
//! - **Token state**: [`TokenState`] and the refresh decision
//! - **Token endpoint**: [`TokenGrant`] form bodies and [`TokenResponse`] parsing
//! - **Credential resolution**: [`resolve_api_key`], [`non_empty`], [`redact`]
//! - **Transport settings**: [`request_timeout`]

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_REQUEST_TIMEOUT,
    errors::{Error, Result, ValidationError},
};

/// Snapshot of the OAuth credentials held by a client.
///
/// Persist these after [`crate::Client::refreshed`] turns true and pass them back
/// through [`crate::Config`] when building the next client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a password-grant authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Tokens were issued and stored on the client.
    Authenticated(Tokens),
    /// The account has two-factor authentication enabled; call again with the OTP.
    RequiresOtp,
}

impl AuthOutcome {
    pub fn requires_otp(&self) -> bool {
        matches!(self, AuthOutcome::RequiresOtp)
    }

    pub fn tokens(&self) -> Option<&Tokens> {
        match self {
            AuthOutcome::Authenticated(tokens) => Some(tokens),
            AuthOutcome::RequiresOtp => None,
        }
    }
}

/// Where a client sits in the credential lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No API key and no tokens.
    Unauthenticated,
    /// A static API key is configured; tokens are never used for requests.
    KeyAuthenticated,
    /// Tokens were supplied but have not been exercised yet.
    TokenPending,
    /// The access token is present and not known to be expired.
    TokenFresh,
    /// The access token is missing or past its expiry; the next request refreshes it.
    TokenExpired,
}

/// Mutable OAuth state owned by one client instance.
#[derive(Debug, Clone, Default)]
pub(crate) struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    refreshed: bool,
    used: bool,
}

impl TokenState {
    pub(crate) fn new(
        access_token: Option<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
            refreshed: false,
            used: false,
        }
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub(crate) fn refreshed(&self) -> bool {
        self.refreshed
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }

    /// Returns the refresh token to exchange when a refresh is due at `now`.
    ///
    /// A refresh is due when a refresh token is held and the access token is
    /// either missing or expired. A missing expiry counts as not expired.
    pub(crate) fn refresh_due(&self, now: DateTime<Utc>) -> Option<&str> {
        let refresh_token = self.refresh_token.as_deref()?;
        if self.access_token.is_none() || self.is_expired(now) {
            Some(refresh_token)
        } else {
            None
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Stores a successful token response. A missing refresh token keeps the
    /// previous one.
    pub(crate) fn apply(&mut self, response: TokenResponse) {
        self.access_token = Some(response.access_token);
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.expires_at = Some(response.expires_at);
        self.refreshed = true;
        self.used = true;
    }

    pub(crate) fn tokens(&self) -> Tokens {
        Tokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }

    pub(crate) fn auth_state(&self, has_api_key: bool, now: DateTime<Utc>) -> AuthState {
        if has_api_key {
            return AuthState::KeyAuthenticated;
        }
        if self.access_token.is_none() && self.refresh_token.is_none() {
            return AuthState::Unauthenticated;
        }
        if self.access_token.is_none() || self.is_expired(now) {
            return AuthState::TokenExpired;
        }
        if self.used {
            AuthState::TokenFresh
        } else {
            AuthState::TokenPending
        }
    }
}

/// Grant requested from the token endpoint.
#[derive(Debug, Clone)]
pub(crate) enum TokenGrant<'a> {
    Password {
        username: &'a str,
        password: &'a str,
        otp: Option<&'a str>,
    },
    RefreshToken(&'a str),
}

impl TokenGrant<'_> {
    /// Form fields in the order the endpoint documents them.
    pub(crate) fn form(&self) -> Vec<(&'static str, &str)> {
        match self {
            TokenGrant::Password {
                username,
                password,
                otp,
            } => {
                let mut fields = vec![
                    ("grant_type", "password"),
                    ("username", *username),
                    ("password", *password),
                ];
                if let Some(otp) = otp {
                    fields.push(("otp", *otp));
                }
                fields
            }
            TokenGrant::RefreshToken(token) => {
                vec![("grant_type", "refresh_token"), ("refresh_token", *token)]
            }
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            TokenGrant::Password { .. } => "password",
            TokenGrant::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Parsed 200 response from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(rename = ".expires")]
    expires: Option<String>,
}

impl TokenResponse {
    pub(crate) fn from_body(body: Option<serde_json::Value>) -> Result<Self> {
        let body = body.ok_or_else(|| Error::TokenResponse("empty body".into()))?;
        let raw: RawTokenResponse = serde_json::from_value(body)?;
        let access_token = raw
            .access_token
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::TokenResponse("missing access_token".into()))?;
        let expires = raw
            .expires
            .ok_or_else(|| Error::TokenResponse("missing .expires".into()))?;
        let expires_at = parse_expires(&expires).ok_or_else(|| {
            Error::TokenResponse(format!("unrecognized .expires value {expires:?}"))
        })?;
        Ok(Self {
            access_token,
            refresh_token: raw.refresh_token.filter(|s| !s.trim().is_empty()),
            expires_at,
        })
    }
}

/// Parses the `.expires` timestamp of a token response.
///
/// The API sends an HTTP date (`Mon, 13 Jan 2025 12:00:00 GMT`); RFC 3339 and
/// `2025-01-13 12:00:00 UTC` are accepted too. Naive timestamps are read as UTC.
pub(crate) fn parse_expires(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw
        .strip_suffix(" UTC")
        .or_else(|| raw.strip_suffix('Z'))
        .unwrap_or(raw);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Placeholder shown instead of a credential in `Debug` output.
pub(crate) fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

/// Per-request timeout to apply on top of the transport.
///
/// A caller-supplied transport keeps its own timeout unless one is configured
/// explicitly; the built-in transport defaults to [`DEFAULT_REQUEST_TIMEOUT`].
pub(crate) fn request_timeout(configured: Option<Duration>, prebuilt: bool) -> Option<Duration> {
    match configured {
        Some(timeout) => Some(timeout),
        None if prebuilt => None,
        None => Some(DEFAULT_REQUEST_TIMEOUT),
    }
}

/// Trims a configured value and drops it when empty.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Explicit configuration wins over the environment fallback.
pub(crate) fn resolve_api_key(explicit: Option<String>, env: Option<String>) -> Option<String> {
    non_empty(explicit).or_else(|| non_empty(env))
}

/// Validates a required path parameter, returning it trimmed.
pub(crate) fn require_field(value: impl std::fmt::Display, field_name: &str) -> Result<String> {
    let value = value.to_string();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(
            ValidationError::new(format!("{field_name} is required")).with_field(field_name),
        ));
    }
    Ok(trimmed.to_string())
}

/// Decodes a response body; an empty or whitespace-only body is absent.
pub(crate) fn decode_body(bytes: &[u8]) -> Result<Option<serde_json::Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(bytes)?))
}
