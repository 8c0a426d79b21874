//! Category endpoints. Categories are referenced from products by name only;
//! no referential integrity is enforced.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{Error, Result};
use crate::models::Category;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", axum::routing::put(update_category).delete(delete_category))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(categories))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

fn map_unique_violation(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Validation("Category already exists".to_string())
        }
        _ => Error::Database(err),
    }
}

async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    req.validate()?;
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, name, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(&req.description)
    .fetch_one(&state.db)
    .await
    .map_err(map_unique_violation)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    req.validate()?;
    sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = $2, description = $3, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .fetch_optional(&state.db)
    .await
    .map_err(map_unique_violation)?
    .map(Json)
    .ok_or_else(|| Error::not_found("Category"))
}

async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(Error::not_found("Category"));
    }
    Ok(Json(serde_json::json!({ "message": "Category deleted successfully" })))
}
