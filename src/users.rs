/// User accounts
///
/// Registration and lookups. Emails are stored normalized (trimmed,
/// lowercased) so uniqueness is case-insensitive.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::auth::{hash_password, DEFAULT_ROLE};
use crate::error::AppError;
use crate::validators::is_valid_email;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, role, is_active, created_at, updated_at";

/// Register a new account with the default role.
///
/// # Errors
/// - `Validation` for a malformed email or a password outside 8..=128 chars
/// - `Conflict` if the normalized email is already registered
pub async fn register(pool: &SqlitePool, email: &str, password: &str) -> Result<User, AppError> {
    let email = is_valid_email(email)?;
    let password_hash = hash_password(password)?;

    if get_by_email(pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    // A concurrent registration can still lose the race at the unique index
    create(pool, &email, &password_hash)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Email already registered".to_string()),
            other => other,
        })
}

pub async fn create<'e, E>(executor: E, email: &str, password_hash: &str) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role: DEFAULT_ROLE.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(executor)
    .await?;

    Ok(user)
}

pub async fn get_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

pub async fn get_by_id<'e, E>(executor: E, user_id: Uuid) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    Ok(user)
}
