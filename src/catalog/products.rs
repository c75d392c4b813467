use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::catalog::categories::{self, Category};
use crate::error::{AppError, ValidationError};
use crate::validators::is_valid_name;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CategoryLink {
    product_id: Uuid,
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub categories: Vec<Category>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl ProductSort {
    /// `price` ascending, `-price` descending, anything else newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("price") => ProductSort::PriceAsc,
            Some("-price") => ProductSort::PriceDesc,
            _ => ProductSort::Newest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            ProductSort::Newest => " ORDER BY p.created_at DESC, p.rowid DESC",
            ProductSort::PriceAsc => " ORDER BY p.price_cents ASC, p.rowid ASC",
            ProductSort::PriceDesc => " ORDER BY p.price_cents DESC, p.rowid ASC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name, Unicode-aware
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: ProductSort,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub category_ids: Option<Vec<Uuid>>,
}

fn validate_price(price_cents: i64) -> Result<i64, ValidationError> {
    if price_cents > 0 {
        Ok(price_cents)
    } else {
        Err(ValidationError::OutOfRange("price_cents".to_string()))
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        builder
            .push(" AND p.search_name LIKE ")
            .push_bind(format!("%{}%", escape_like(&q.to_lowercase())))
            .push(" ESCAPE '\\'");
    }
    if let Some(min_price) = filter.min_price {
        builder.push(" AND p.price_cents >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND p.price_cents <= ").push_bind(max_price);
    }
    if let Some(category_id) = filter.category_id {
        builder
            .push(" AND EXISTS (SELECT 1 FROM product_categories pc WHERE pc.product_id = p.id AND pc.category_id = ")
            .push_bind(category_id)
            .push(")");
    }
}

async fn attach_categories(
    conn: &mut SqliteConnection,
    rows: Vec<ProductRow>,
) -> Result<Vec<Product>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT pc.product_id, c.id, c.name, c.created_at, c.updated_at
        FROM product_categories pc
        JOIN categories c ON c.id = pc.category_id
        WHERE pc.product_id IN ("#,
    );
    let mut separated = builder.separated(", ");
    for row in &rows {
        separated.push_bind(row.id);
    }
    separated.push_unseparated(") ORDER BY c.name");

    let links = builder
        .build_query_as::<CategoryLink>()
        .fetch_all(&mut *conn)
        .await?;

    let mut by_product: HashMap<Uuid, Vec<Category>> = HashMap::new();
    for link in links {
        by_product.entry(link.product_id).or_default().push(Category {
            id: link.id,
            name: link.name,
            created_at: link.created_at,
            updated_at: link.updated_at,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| Product {
            categories: by_product.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            price_cents: row.price_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

/// Filtered, sorted page of products plus the total match count.
/// `page` is 1-based.
pub async fn list_with_filters(
    conn: &mut SqliteConnection,
    filter: &ProductFilter,
    page: u32,
    limit: u32,
) -> Result<(i64, Vec<Product>), AppError> {
    let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM products p");
    push_filters(&mut count, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

    let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
    let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT p.id, p.name, p.price_cents, p.created_at, p.updated_at FROM products p",
    );
    push_filters(&mut select, filter);
    select
        .push(filter.sort.order_by())
        .push(" LIMIT ")
        .push_bind(i64::from(limit))
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = select
        .build_query_as::<ProductRow>()
        .fetch_all(&mut *conn)
        .await?;

    let items = attach_categories(conn, rows).await?;
    Ok((total, items))
}

pub async fn get_by_id(
    conn: &mut SqliteConnection,
    product_id: Uuid,
) -> Result<Option<Product>, AppError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, price_cents, created_at, updated_at FROM products WHERE id = ?",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(attach_categories(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Look up every requested category, failing if any id is unknown.
async fn resolve_categories(
    conn: &mut SqliteConnection,
    category_ids: &[Uuid],
) -> Result<Vec<Category>, AppError> {
    let mut ids = category_ids.to_vec();
    ids.sort();
    ids.dedup();

    let found = categories::find_by_ids(conn, &ids).await?;
    if found.len() != ids.len() {
        return Err(AppError::Conflict(
            "At least one id in category_ids is not valid".to_string(),
        ));
    }
    Ok(found)
}

/// Replace the product's category links with exactly `categories`.
pub async fn sync_categories(
    conn: &mut SqliteConnection,
    product_id: Uuid,
    categories: &[Category],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM product_categories WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let now = Utc::now();
    for category in categories {
        sqlx::query(
            r#"
            INSERT INTO product_categories (product_id, category_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(product_id)
        .bind(category.id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn map_name_conflict(err: sqlx::Error) -> AppError {
    match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("Product name already exists".to_string()),
        other => other,
    }
}

/// Create a product linked to the given categories.
///
/// Run inside a transaction: an unknown category id aborts after the
/// product row was written.
pub async fn create_with_categories(
    conn: &mut SqliteConnection,
    name: &str,
    price_cents: i64,
    category_ids: &[Uuid],
) -> Result<Product, AppError> {
    let name = is_valid_name("name", name)?;
    let price_cents = validate_price(price_cents)?;
    let categories = resolve_categories(conn, category_ids).await?;

    let now = Utc::now();
    let product_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, name, search_name, price_cents, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(product_id)
    .bind(&name)
    .bind(name.to_lowercase())
    .bind(price_cents)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(map_name_conflict)?;

    sync_categories(conn, product_id, &categories).await?;

    get_by_id(conn, product_id)
        .await?
        .ok_or_else(|| AppError::Internal("Created product vanished".to_string()))
}

pub async fn update_with_categories(
    conn: &mut SqliteConnection,
    product_id: Uuid,
    changes: ProductChanges,
) -> Result<Product, AppError> {
    let existing = get_by_id(conn, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let name = match changes.name {
        Some(name) => is_valid_name("name", &name)?,
        None => existing.name,
    };
    let price_cents = match changes.price_cents {
        Some(price_cents) => validate_price(price_cents)?,
        None => existing.price_cents,
    };

    sqlx::query(
        "UPDATE products SET name = ?, search_name = ?, price_cents = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(name.to_lowercase())
    .bind(price_cents)
    .bind(Utc::now())
    .bind(product_id)
    .execute(&mut *conn)
    .await
    .map_err(map_name_conflict)?;

    if let Some(category_ids) = changes.category_ids {
        let categories = resolve_categories(conn, &category_ids).await?;
        sync_categories(conn, product_id, &categories).await?;
    }

    get_by_id(conn, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Returns whether a product was deleted. Order items keep their rows with
/// the product reference cleared.
pub async fn delete<'e, E>(executor: E, product_id: Uuid) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(product_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}
