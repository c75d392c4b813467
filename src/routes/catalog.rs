/// Catalog Routes
///
/// Public browsing of categories and products, plus the admin-only
/// mutations mounted under `/admin`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Claims;
use crate::catalog::{categories, products, Page, ProductChanges, ProductFilter, ProductSort};
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::validators::is_valid_name;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductQuery {
    fn pagination(&self) -> Result<(u32, u32), ValidationError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page < 1 {
            return Err(ValidationError::OutOfRange("page".to_string()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ValidationError::OutOfRange("limit".to_string()));
        }
        Ok((page, limit))
    }

    fn filter(&self) -> ProductFilter {
        ProductFilter {
            q: self.q.clone(),
            category_id: self.category_id,
            min_price: self.min_price,
            max_price: self.max_price,
            sort: ProductSort::parse(self.sort.as_deref()),
        }
    }
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub category_ids: Option<Vec<Uuid>>,
}

/// GET /categories
pub async fn list_categories(pool: web::Data<SqlitePool>) -> Result<HttpResponse, AppError> {
    let categories = categories::list_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(categories))
}

/// GET /products
///
/// # Errors
/// - 400: `page` below 1 or `limit` outside 1..=100
pub async fn list_products(
    query: web::Query<ProductQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let (page, limit) = query.pagination()?;
    let filter = query.filter();

    let mut conn = pool.acquire().await?;
    let (total, items) = products::list_with_filters(&mut conn, &filter, page, limit).await?;

    Ok(HttpResponse::Ok().json(Page {
        total,
        page,
        limit,
        items,
    }))
}

/// GET /products/{product_id}
pub async fn get_product(
    path: web::Path<Uuid>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let product = products::get_by_id(&mut conn, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(HttpResponse::Ok().json(product))
}

/// POST /admin/categories
pub async fn add_category(
    claims: web::ReqData<Claims>,
    form: web::Json<CategoryRequest>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let context = ErrorContext::new("add_category").with_user_id(&claims.sub);

    let name = is_valid_name("name", &form.name)?;
    let category = categories::create(pool.get_ref(), &name).await?;

    tracing::info!(
        request_id = %context.request_id,
        category_id = %category.id,
        "Category created"
    );

    Ok(HttpResponse::Created().json(category))
}

/// POST /admin/products
///
/// # Errors
/// - 400: invalid name or a non-positive price
/// - 409: duplicate name or an unknown category id
pub async fn create_product(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateProductRequest>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let context = ErrorContext::new("create_product").with_user_id(&claims.sub);

    let mut tx = pool.begin().await?;
    let product =
        products::create_with_categories(&mut *tx, &form.name, form.price_cents, &form.category_ids)
            .await?;
    tx.commit().await?;

    tracing::info!(
        request_id = %context.request_id,
        product_id = %product.id,
        "Product created"
    );

    Ok(HttpResponse::Created().json(product))
}

/// PUT /admin/products/{product_id}
pub async fn update_product(
    claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    form: web::Json<UpdateProductRequest>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let form = form.into_inner();
    let changes = ProductChanges {
        name: form.name,
        price_cents: form.price_cents,
        category_ids: form.category_ids,
    };

    let mut tx = pool.begin().await?;
    let product = products::update_with_categories(&mut *tx, path.into_inner(), changes).await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, "Product updated");
    Ok(HttpResponse::Ok().json(product))
}

/// DELETE /admin/products/{product_id}
pub async fn delete_product(
    claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let product_id = path.into_inner();

    if !products::delete(pool.get_ref(), product_id).await? {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    tracing::info!(product_id = %product_id, "Product deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<u32>, limit: Option<u32>) -> ProductQuery {
        ProductQuery {
            q: None,
            category_id: None,
            min_price: None,
            max_price: None,
            sort: None,
            page,
            limit,
        }
    }

    #[test]
    fn pagination_defaults() {
        assert_eq!(query(None, None).pagination().unwrap(), (1, 10));
    }

    #[test]
    fn pagination_bounds() {
        assert!(query(Some(0), None).pagination().is_err());
        assert!(query(None, Some(0)).pagination().is_err());
        assert!(query(None, Some(101)).pagination().is_err());
        assert_eq!(query(Some(3), Some(100)).pagination().unwrap(), (3, 100));
    }
}
