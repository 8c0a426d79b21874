//! Product catalog endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{Error, Result};
use crate::models::Product;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/featured", get(featured_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListProductsParams {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<Vec<Product>>> {
    let category = params.category.filter(|c| c != "all");
    let featured = params.featured.filter(|f| *f);
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products \
         WHERE ($1::text IS NULL OR category = $1) \
           AND ($2::bool IS NULL OR featured = $2) \
           AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' OR description ILIKE '%' || $3 || '%') \
         ORDER BY created_at DESC",
    )
    .bind(category)
    .bind(featured)
    .bind(params.search)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(products))
}

async fn featured_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE featured ORDER BY created_at DESC LIMIT 8",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(products))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Product"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price: i64,
    #[validate(length(min = 1, message = "Product image is required"))]
    pub image: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub featured: bool,
}

async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    req.validate()?;
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, description, price, image, category, stock, featured) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.image)
    .bind(&req.category)
    .bind(req.stock)
    .bind(req.featured)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<Product>> {
    req.validate()?;
    sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, description = $3, price = $4, image = $5, \
         category = $6, stock = $7, featured = $8, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.image)
    .bind(&req.category)
    .bind(req.stock)
    .bind(req.featured)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| Error::not_found("Product"))
}

async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(Error::not_found("Product"));
    }
    Ok(Json(serde_json::json!({ "message": "Product deleted successfully" })))
}
