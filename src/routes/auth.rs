/// Authentication Routes
///
/// Registration, password login, refresh-token rotation, logout and the
/// current-user lookup. Token handling itself lives in `auth::session`;
/// these handlers only translate between HTTP and that module.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::{session, Claims, TokenIssuer};
use crate::error::{AppError, ErrorContext};
use crate::users::{self, UserResponse};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of both `/auth/refresh` and `/auth/logout`
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or password length
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let user = users::register(pool.get_ref(), &form.email, &form.password).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /auth/token
///
/// Exchange credentials for an access/refresh token pair. Unknown email,
/// wrong password and inactive account all answer the same 401.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<SqlitePool>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, AppError> {
    let pair = session::login(pool.get_ref(), issuer.get_ref(), &form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /auth/refresh
///
/// Rotate a refresh token. The presented token is revoked and can never be
/// used again; a replay answers 401.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    pool: web::Data<SqlitePool>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let pair = session::refresh(pool.get_ref(), issuer.get_ref(), &form.refresh_token).await?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /auth/logout
///
/// Always 204, whether or not the token was known.
pub async fn logout(
    form: web::Json<RefreshRequest>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    session::logout(pool.get_ref(), &form.refresh_token).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/me
///
/// Claims are injected by `JwtMiddleware`.
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let user = session::user_for_claims(pool.get_ref(), &claims).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// POST /auth/logout-all
///
/// Revoke every refresh token of the caller.
pub async fn logout_all(
    claims: web::ReqData<Claims>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("logout_all").with_user_id(user_id);

    let revoked = session::logout_all(pool.get_ref(), user_id).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        revoked,
        "Revoked all refresh tokens"
    );

    Ok(HttpResponse::NoContent().finish())
}
