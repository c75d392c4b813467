/// JWT Token Issuance and Decoding
///
/// `TokenIssuer` is built once from `JwtSettings` and shared by reference;
/// it owns the signing keys so no code path reaches for a global secret.

use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    /// # Errors
    /// Returns a configuration error if the secret is empty, the algorithm is
    /// not an HMAC algorithm, or a lifetime is not positive.
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        if config.secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }

        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|_| ConfigError::InvalidValue(format!("jwt.algorithm={}", config.algorithm)))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.algorithm={} (only HMAC algorithms are supported)",
                config.algorithm
            )));
        }

        if config.access_token_expire_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expire_minutes must be positive".to_string(),
            ));
        }
        if config.refresh_token_expire_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expire_days must be positive".to_string(),
            ));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_lifetime: Duration::minutes(config.access_token_expire_minutes),
            refresh_lifetime: Duration::days(config.refresh_token_expire_days),
        })
    }

    /// Mint a short-lived access token carrying the user's role.
    pub fn issue_access(&self, user_id: Uuid, role: &str) -> Result<String, AppError> {
        self.sign(&Claims::access(user_id, role, self.access_lifetime))
    }

    /// Mint a refresh token.
    ///
    /// The random `jti` keeps two tokens for the same user distinct even when
    /// issued within the same second.
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign(&Claims::refresh(user_id, Uuid::new_v4().to_string(), self.refresh_lifetime))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// # Errors
    /// `TokenExpired` past `exp`, `TokenInvalid` for anything else
    /// (bad signature, wrong algorithm, malformed payload).
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!(error = %e, "JWT decode failed");
                    AuthError::TokenInvalid
                }
            })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}
