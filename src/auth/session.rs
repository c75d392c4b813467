/// Session Protocol
///
/// Login, refresh-token rotation, logout and current-user resolution.
///
/// Each refresh token moves forward only: ISSUED, then either ROTATED
/// (consumed by a successful refresh) or REVOKED (logout). Both end
/// states are the same `revoked` flag in the store, so replaying a
/// rotated token is indistinguishable from presenting a logged-out one.

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenType};
use crate::auth::jwt::TokenIssuer;
use crate::auth::password::verify_password;
use crate::auth::refresh_token;
use crate::error::{AppError, AuthError};
use crate::users::{self, User};
use crate::validators::normalize_email;

pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Access + refresh credentials handed to the client
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

fn issue_pair(issuer: &TokenIssuer, user: &User) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: issuer.issue_access(user.id, &user.role)?,
        refresh_token: issuer.issue_refresh(user.id)?,
        token_type: TOKEN_TYPE_BEARER,
    })
}

/// Exchange email + password for a new token pair.
///
/// # Errors
/// `InvalidCredentials` for an unknown email, a wrong password, or an
/// inactive account; callers cannot tell these apart.
pub async fn login(
    pool: &SqlitePool,
    issuer: &TokenIssuer,
    email: &str,
    password: &str,
) -> Result<TokenPair, AppError> {
    let email = normalize_email(email);

    let user = match users::get_by_email(pool, &email).await? {
        Some(user) => user,
        None => {
            tracing::info!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !verify_password(password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login attempt with wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    if !user.is_active {
        tracing::info!(user_id = %user.id, "Login attempt for inactive account");
        return Err(AuthError::InvalidCredentials.into());
    }

    let pair = issue_pair(issuer, &user)?;
    refresh_token::create(pool, user.id, &pair.refresh_token).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(pair)
}

/// Rotate a refresh token: revoke the presented one, issue a new pair.
///
/// The revoke and the insert of the successor run in one transaction, and
/// the revoke only matches a row that is still active, so two concurrent
/// presentations of one token yield one winner and one
/// `TokenRevokedOrUnknown`.
///
/// # Errors
/// - `TokenInvalid` if the token fails to decode, is not a refresh token,
///   or has a malformed subject
/// - `TokenRevokedOrUnknown` if the token is not in the store, was already
///   revoked or rotated, or its owner no longer exists or is inactive
pub async fn refresh(
    pool: &SqlitePool,
    issuer: &TokenIssuer,
    presented: &str,
) -> Result<TokenPair, AppError> {
    let claims = issuer.decode(presented).map_err(|e| {
        tracing::warn!(error = %e, "Refresh token failed to decode");
        AuthError::TokenInvalid
    })?;

    if claims.token_type != TokenType::Refresh {
        tracing::warn!("Non-refresh token presented for rotation");
        return Err(AuthError::TokenInvalid.into());
    }

    let user_id = claims.user_id()?;

    // The revoke is the first statement, so this transaction holds the
    // write lock before it reads; a concurrent rotation of the same token
    // waits here and then finds no active row.
    let mut tx = pool.begin().await?;

    let record = match refresh_token::consume_by_token(&mut *tx, presented).await? {
        Some(record) => record,
        None => {
            match refresh_token::get_by_token(&mut *tx, presented).await? {
                Some(record) => tracing::warn!(
                    user_id = %user_id,
                    token_id = %record.id,
                    "Revoked refresh token presented, possible reuse"
                ),
                None => tracing::warn!(user_id = %user_id, "Unknown refresh token presented"),
            }
            return Err(AuthError::TokenRevokedOrUnknown.into());
        }
    };

    // Dropping `tx` rolls the revoke back
    if record.user_id != user_id {
        tracing::warn!(token_id = %record.id, "Refresh token subject does not match its owner");
        return Err(AuthError::TokenRevokedOrUnknown.into());
    }

    let user = users::get_by_id(&mut *tx, user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or(AuthError::TokenRevokedOrUnknown)?;

    let pair = issue_pair(issuer, &user)?;
    refresh_token::create(&mut *tx, user.id, &pair.refresh_token).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, rotated = %record.id, "Refresh token rotated");
    Ok(pair)
}

/// Revoke the presented refresh token if it exists.
///
/// Always succeeds for unknown or already revoked tokens, so the response
/// says nothing about token validity.
pub async fn logout(pool: &SqlitePool, presented: &str) -> Result<(), AppError> {
    if let Some(record) = refresh_token::get_by_token(pool, presented).await? {
        refresh_token::revoke(pool, record.id).await?;
        tracing::info!(user_id = %record.user_id, token_id = %record.id, "User logged out");
    }
    Ok(())
}

/// Revoke every refresh token the user holds.
pub async fn logout_all(pool: &SqlitePool, user_id: Uuid) -> Result<u64, AppError> {
    refresh_token::revoke_all_for_user(pool, user_id).await
}

/// Validate an access token and return its claims.
///
/// # Errors
/// `Unauthenticated` if decoding fails, the token is a refresh token, or
/// the subject is malformed.
pub fn authenticate(issuer: &TokenIssuer, access_token: &str) -> Result<Claims, AuthError> {
    let claims = issuer.decode(access_token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AuthError::Unauthenticated
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::Unauthenticated);
    }

    claims.user_id().map_err(|_| AuthError::Unauthenticated)?;
    Ok(claims)
}

/// Load the user an authenticated request belongs to.
///
/// # Errors
/// `NotFound` if the account was removed after the token was issued.
pub async fn user_for_claims(pool: &SqlitePool, claims: &Claims) -> Result<User, AppError> {
    let user_id = claims.user_id().map_err(|_| AuthError::Unauthenticated)?;

    users::get_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Resolve an access token to its user.
pub async fn current_user(
    pool: &SqlitePool,
    issuer: &TokenIssuer,
    access_token: &str,
) -> Result<User, AppError> {
    let claims = authenticate(issuer, access_token)?;
    user_for_claims(pool, &claims).await
}
