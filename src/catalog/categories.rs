use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

pub async fn create<'e, E>(executor: E, name: &str) -> Result<Category, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query("INSERT INTO categories (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(category.id)
        .bind(&category.name)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(executor)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("Category name already exists".to_string()),
            other => other,
        })?;

    Ok(category)
}

pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Category>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, created_at, updated_at FROM categories ORDER BY name",
    )
    .fetch_all(executor)
    .await?;

    Ok(categories)
}

/// Fetch the categories whose ids are listed. Unknown ids are skipped, so
/// callers compare lengths to detect them.
pub async fn find_by_ids(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> Result<Vec<Category>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, name, created_at, updated_at FROM categories WHERE id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY name");

    let categories = builder
        .build_query_as::<Category>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::startup::test_pool;

    #[tokio::test]
    async fn create_and_list_sorted_by_name() {
        let pool = test_pool().await;
        create(&pool, "Phones").await.unwrap();
        create(&pool, "Electronics").await.unwrap();

        let names: Vec<String> = list_all(&pool).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Electronics", "Phones"]);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let pool = test_pool().await;
        create(&pool, "Phones").await.unwrap();

        assert!(matches!(create(&pool, "Phones").await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn find_by_ids_skips_unknown_ids() {
        let pool = test_pool().await;
        let phones = create(&pool, "Phones").await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let found = find_by_ids(&mut conn, &[phones.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, phones.id);
        assert!(find_by_ids(&mut conn, &[]).await.unwrap().is_empty());
    }
}
