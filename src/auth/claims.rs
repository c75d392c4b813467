/// JWT Claims structure
///
/// One payload shape serves both token kinds; the `type` claim tells them
/// apart so a refresh token can never be presented as an access token and
/// vice versa.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

pub const DEFAULT_ROLE: &str = "user";
pub const ADMIN_ROLE: &str = "admin";

/// Discriminator stored in the `type` claim
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Only present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Unique token identifier, only present on refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn access(user_id: Uuid, role: &str, lifetime: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            role: Some(role.to_string()),
            jti: None,
            iat: now,
            exp: now + lifetime.num_seconds(),
        }
    }

    pub fn refresh(user_id: Uuid, jti: String, lifetime: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            role: None,
            jti: Some(jti),
            iat: now,
            exp: now + lifetime.num_seconds(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// `TokenInvalid` if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }

    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(DEFAULT_ROLE)
    }

    /// # Errors
    /// `Forbidden` unless the token carries the admin role
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.role() == ADMIN_ROLE {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}
