use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::{AppError, ErrorContext};
use crate::orders::{self, NewOrderItem};

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<NewOrderItem>,
}

/// POST /orders
///
/// # Errors
/// - 400: no items, or a quantity below 1
/// - 404: an item names a product that does not exist
pub async fn place_order(
    claims: web::ReqData<Claims>,
    form: web::Json<PlaceOrderRequest>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("place_order").with_user_id(user_id);

    let order = orders::place_order(pool.get_ref(), user_id, &form.items).await?;

    tracing::debug!(request_id = %context.request_id, order_id = %order.id, "Order stored");
    Ok(HttpResponse::Created().json(order))
}

/// GET /orders
pub async fn list_orders(
    claims: web::ReqData<Claims>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let orders = orders::list_for_user(pool.get_ref(), user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// GET /orders/{order_id}
pub async fn get_order(
    claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let order = orders::get_by_id(pool.get_ref(), user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}
