//! Session resolution. Issuing sessions belongs to the identity provider;
//! this crate only answers "who is calling".

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session secret must not be empty")]
    EmptySecret,
}

/// Signed-in identity as asserted by the identity provider. `subject` is the
/// provider's user id, stored on the matching author document as `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub subject: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
}

/// Raw credentials lifted off a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Prefers an `Authorization: Bearer` header over the session cookie.
    pub fn from_headers(authorization: Option<&str>, cookie: Option<&str>) -> Self {
        let from_header = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());
        let from_cookie = || {
            cookie?
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(name, _)| *name == SESSION_COOKIE)
                .map(|(_, value)| value.trim())
                .filter(|token| !token.is_empty())
        };
        Self {
            token: from_header.or_else(from_cookie).map(str::to_string),
        }
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self, credentials: &Credentials) -> Result<Option<Session>, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Verifies HS256 session tokens signed by the identity provider.
pub struct JwtSessionProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionProvider {
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        })
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn current_session(&self, credentials: &Credentials) -> Result<Option<Session>, AuthError> {
        let Some(token) = credentials.token.as_deref() else {
            return Ok(None);
        };
        match decode::<SessionClaims>(token, &self.key, &self.validation) {
            Ok(data) if !data.claims.sub.is_empty() => Ok(Some(Session {
                subject: data.claims.sub,
                name: data.claims.name,
                username: data.claims.username,
                image: data.claims.picture,
            })),
            Ok(_) => Ok(None),
            Err(error) => {
                debug!(%error, "rejected session token");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
