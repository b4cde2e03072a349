//! Authentication / Authorization primitives.
//!
//! The server acts as an OAuth2 resource server: an external party issues
//! access tokens, and this server validates them on incoming requests. Token
//! validation is HS256 against a shared secret; the granted scopes decide
//! what the caller may do. With auth disabled (embedded and test use) every
//! caller is the elevated system principal.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;

use crate::{Config, Error, Result};

/// Scope that grants write access to terminology tables.
pub const SCOPE_TERMINOLOGY_IMPORT: &str = "terminology/import";

/// Wildcard scope carried by superadmin tokens.
pub const SCOPE_SYSTEM_ALL: &str = "system/*.*";

#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub scopes: Vec<String>,
}

impl Principal {
    /// The implicit principal used when authentication is disabled.
    pub fn system() -> Self {
        Self {
            subject: "system".to_string(),
            scopes: vec![SCOPE_SYSTEM_ALL.to_string()],
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn can_write_terminology(&self) -> bool {
        self.has_scope(SCOPE_TERMINOLOGY_IMPORT) || self.has_scope(SCOPE_SYSTEM_ALL)
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Clone)]
pub struct AuthManager {
    config: Arc<Config>,
}

impl AuthManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Resolve the request principal from the `Authorization` header.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal> {
        if !self.config.auth.enabled {
            return Ok(Principal::system());
        }

        let secret = self
            .config
            .auth
            .secret
            .as_deref()
            .ok_or_else(|| Error::Internal("auth enabled without a secret".to_string()))?;

        let token = bearer_token(headers)
            .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| Error::Unauthorized(format!("Invalid bearer token: {e}")))?;

        let scopes = data
            .claims
            .scope
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Principal {
            subject: data.claims.sub,
            scopes,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
