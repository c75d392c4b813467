/// Refresh Token Store
///
/// Persists issued refresh tokens and their revocation flag.
/// - Rows are keyed by the SHA-256 digest of the token string; the plaintext
///   token is never stored
/// - Revocation flips a flag and bumps `updated_at`; rows are never deleted
///   (only cascaded away with their user), which keeps an audit trail of
///   every token ever issued
/// - All functions take a connection so callers can group them in one
///   transaction

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Store a freshly issued refresh token as not revoked.
pub async fn create<'e, E>(
    executor: E,
    user_id: Uuid,
    token: &str,
) -> Result<RefreshTokenRecord, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let record = RefreshTokenRecord {
        id: Uuid::new_v4(),
        user_id,
        token_hash: hash_token(token),
        revoked: false,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, revoked, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(&record.token_hash)
    .bind(record.revoked)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await?;

    Ok(record)
}

/// Exact-match lookup by token string.
pub async fn get_by_token<'e, E>(
    executor: E,
    token: &str,
) -> Result<Option<RefreshTokenRecord>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, token_hash, revoked, created_at, updated_at
        FROM refresh_tokens
        WHERE token_hash = ?
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(executor)
    .await?;

    Ok(record)
}

/// Atomically move a token from active to revoked.
///
/// Returns `true` only for the caller that flipped the flag. A second
/// caller racing on the same row sees `false`, which is what makes a
/// refresh token single-use under concurrent presentation.
pub async fn consume<'e, E>(executor: E, token_id: Uuid) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1, updated_at = ?
        WHERE id = ? AND revoked = 0
        "#,
    )
    .bind(Utc::now())
    .bind(token_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Revoke the active row for `token` and return it, or `None` if no
/// active row matches.
///
/// This is a write, so as the first statement of a transaction it takes
/// the database write lock before anything is read. A concurrent caller
/// with the same token waits for that lock and then matches nothing.
pub async fn consume_by_token<'e, E>(
    executor: E,
    token: &str,
) -> Result<Option<RefreshTokenRecord>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1, updated_at = ?
        WHERE token_hash = ? AND revoked = 0
        RETURNING id, user_id, token_hash, revoked, created_at, updated_at
        "#,
    )
    .bind(Utc::now())
    .bind(hash_token(token))
    .fetch_optional(executor)
    .await?;

    Ok(record)
}

/// Revoke a single token. Revoking an already revoked or unknown id is a no-op.
pub async fn revoke<'e, E>(executor: E, token_id: Uuid) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if !consume(executor, token_id).await? {
        tracing::debug!(token_id = %token_id, "Refresh token already revoked");
    }
    Ok(())
}

/// Revoke every active token a user owns. Returns how many rows changed.
pub async fn revoke_all_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1, updated_at = ?
        WHERE user_id = ? AND revoked = 0
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(executor)
    .await?;

    tracing::info!(user_id = %user_id, revoked = result.rows_affected(), "Refresh tokens revoked for user");
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::startup::{file_test_pool, test_pool};
    use crate::users;

    async fn seed_user(pool: &sqlx::SqlitePool) -> Uuid {
        users::create(pool, &format!("{}@example.com", Uuid::new_v4().simple()), "hash")
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("some-token");
        let hash2 = hash_token("some-token");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, "some-token");
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token("other-token"));
    }

    #[tokio::test]
    async fn create_then_lookup_by_exact_token() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;

        let created = create(&pool, user_id, "token-a").await.unwrap();
        let found = get_by_token(&pool, "token-a").await.unwrap().expect("missing");

        assert_eq!(found.id, created.id);
        assert_eq!(found.user_id, user_id);
        assert!(!found.revoked);
        assert!(get_by_token(&pool, "token-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        let record = create(&pool, user_id, "token-a").await.unwrap();

        revoke(&pool, record.id).await.unwrap();
        revoke(&pool, record.id).await.unwrap();
        revoke(&pool, Uuid::new_v4()).await.unwrap();

        let found = get_by_token(&pool, "token-a").await.unwrap().unwrap();
        assert!(found.revoked);
        assert!(found.updated_at >= found.created_at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_of_one_token_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_test_pool(dir.path()).await;
        let user_id = seed_user(&pool).await;

        for round in 0..20 {
            let token = format!("token-{}", round);
            let record = create(&pool, user_id, &token).await.unwrap();

            let by_id = {
                let pool = pool.clone();
                tokio::spawn(async move { consume(&pool, record.id).await })
            };
            let by_token = {
                let pool = pool.clone();
                let token = token.clone();
                tokio::spawn(async move { consume_by_token(&pool, &token).await })
            };

            let by_id = by_id.await.unwrap().expect("consume failed");
            let by_token = by_token.await.unwrap().expect("consume_by_token failed");
            assert!(by_id ^ by_token.is_some(), "round {}: expected exactly one winner", round);
        }
    }

    #[tokio::test]
    async fn consume_by_token_returns_the_row_once() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        let record = create(&pool, user_id, "token-a").await.unwrap();

        let consumed = consume_by_token(&pool, "token-a").await.unwrap().expect("not consumed");
        assert_eq!(consumed.id, record.id);
        assert!(consumed.revoked);

        assert!(consume_by_token(&pool, "token-a").await.unwrap().is_none());
        assert!(consume_by_token(&pool, "token-b").await.unwrap().is_none());
        assert!(!consume(&pool, record.id).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_only_touches_the_owner() {
        let pool = test_pool().await;
        let owner = seed_user(&pool).await;
        let other = seed_user(&pool).await;

        create(&pool, owner, "owner-1").await.unwrap();
        create(&pool, owner, "owner-2").await.unwrap();
        create(&pool, other, "other-1").await.unwrap();

        assert_eq!(revoke_all_for_user(&pool, owner).await.unwrap(), 2);
        assert_eq!(revoke_all_for_user(&pool, owner).await.unwrap(), 0);

        assert!(get_by_token(&pool, "owner-1").await.unwrap().unwrap().revoked);
        assert!(get_by_token(&pool, "owner-2").await.unwrap().unwrap().revoked);
        assert!(!get_by_token(&pool, "other-1").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn rows_cascade_with_their_user() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        create(&pool, user_id, "token-a").await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(get_by_token(&pool, "token-a").await.unwrap().is_none());
    }
}
