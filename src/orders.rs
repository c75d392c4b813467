/// Orders
///
/// An order is a list of line items, each snapshotting the product's unit
/// price at the time the order was placed. Later price changes or product
/// deletion leave placed orders untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

const MAX_QUANTITY: i64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    #[serde(skip)]
    pub order_id: Uuid,
    /// `None` once the product has been deleted
    pub product_id: Option<Uuid>,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    fn from_parts(row: OrderRow, items: Vec<OrderItem>) -> Result<Self, AppError> {
        let total_cents = order_total(items.iter().map(|item| (item.quantity, item.unit_price_cents)))
            .ok_or_else(|| AppError::Internal(format!("Total of order {} overflows", row.id)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            items,
            total_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Sum of `quantity * unit_price_cents` over all lines, `None` on overflow.
fn order_total(lines: impl IntoIterator<Item = (i64, i64)>) -> Option<i64> {
    lines.into_iter().try_fold(0_i64, |total, (quantity, unit_price_cents)| {
        quantity
            .checked_mul(unit_price_cents)
            .and_then(|line| total.checked_add(line))
    })
}

fn validate_items(items: &[NewOrderItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyField("items".to_string()));
    }
    if items
        .iter()
        .any(|item| !(1..=MAX_QUANTITY).contains(&item.quantity))
    {
        return Err(ValidationError::OutOfRange("quantity".to_string()));
    }
    Ok(())
}

/// Place an order for `user_id`, all items or none.
///
/// # Errors
/// - `Validation` for an empty item list, a quantity outside 1..=10000, or
///   a total that does not fit in an `i64`
/// - `NotFound` if any product does not exist
pub async fn place_order(
    pool: &SqlitePool,
    user_id: Uuid,
    items: &[NewOrderItem],
) -> Result<Order, AppError> {
    validate_items(items)?;

    let mut tx = pool.begin().await?;
    let order = create(&mut *tx, user_id).await?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let unit_price_cents = sqlx::query_scalar::<_, i64>(
            "SELECT price_cents FROM products WHERE id = ?",
        )
        .bind(item.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {} not found", item.product_id)))?;

        add_item(&mut *tx, order.id, item.product_id, item.quantity, unit_price_cents).await?;
        lines.push((item.quantity, unit_price_cents));
    }

    if order_total(lines).is_none() {
        return Err(ValidationError::OutOfRange("quantity".to_string()).into());
    }

    let placed = load(&mut *tx, order.id)
        .await?
        .ok_or_else(|| AppError::Internal("Created order vanished".to_string()))?;
    tx.commit().await?;

    tracing::info!(
        order_id = %placed.id,
        user_id = %user_id,
        items = placed.items.len(),
        total_cents = placed.total_cents,
        "Order placed"
    );

    Ok(placed)
}

async fn create<'e, E>(executor: E, user_id: Uuid) -> Result<OrderRow, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let row = OrderRow {
        id: Uuid::new_v4(),
        user_id: Some(user_id),
        created_at: now,
        updated_at: now,
    };

    sqlx::query("INSERT INTO orders (id, user_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(executor)
        .await?;

    Ok(row)
}

async fn add_item<'e, E>(
    executor: E,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price_cents: i64,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO order_items
            (id, order_id, product_id, quantity, unit_price_cents, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price_cents)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

async fn items_for(conn: &mut SqliteConnection, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn load(conn: &mut SqliteConnection, order_id: Uuid) -> Result<Option<Order>, AppError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT id, user_id, created_at, updated_at FROM orders WHERE id = ?",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let items = items_for(conn, row.id).await?;
            Ok(Some(Order::from_parts(row, items)?))
        }
        None => Ok(None),
    }
}

/// Fetch one of the user's orders. Another user's order is reported as
/// missing.
pub async fn get_by_id(
    pool: &SqlitePool,
    user_id: Uuid,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let mut conn = pool.acquire().await?;
    match load(&mut conn, order_id).await? {
        Some(order) if order.user_id == Some(user_id) => Ok(order),
        _ => Err(AppError::NotFound("Order not found".to_string())),
    }
}

/// The user's orders, newest first.
pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Order>, AppError> {
    let mut conn = pool.acquire().await?;
    let rows = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, user_id, created_at, updated_at
        FROM orders
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = items_for(&mut conn, row.id).await?;
        orders.push(Order::from_parts(row, items)?);
    }

    Ok(orders)
}
