//! Homepage slider endpoints. Images are URL strings; upload/storage is
//! handled by an external service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{Error, Result};
use crate::models::Slider;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sliders).post(create_slider))
        .route("/active", get(active_sliders))
        .route("/:id", axum::routing::put(update_slider).delete(delete_slider))
        .route("/:id/position", patch(update_position))
}

async fn list_sliders(State(state): State<AppState>) -> Result<Json<Vec<Slider>>> {
    let sliders = sqlx::query_as::<_, Slider>(
        "SELECT * FROM sliders ORDER BY position, created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(sliders))
}

async fn active_sliders(State(state): State<AppState>) -> Result<Json<Vec<Slider>>> {
    let sliders =
        sqlx::query_as::<_, Slider>("SELECT * FROM sliders WHERE active ORDER BY position")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(sliders))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SliderRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Image is required"))]
    pub image: String,
    #[validate(length(min = 1, message = "Button text is required"))]
    pub button_text: String,
    #[validate(length(min = 1, message = "Button link is required"))]
    pub button_link: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub position: i32,
}

fn default_active() -> bool {
    true
}

async fn create_slider(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<SliderRequest>,
) -> Result<(StatusCode, Json<Slider>)> {
    req.validate()?;
    let slider = sqlx::query_as::<_, Slider>(
        "INSERT INTO sliders (id, title, description, image, button_text, button_link, active, position) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.image)
    .bind(&req.button_text)
    .bind(&req.button_link)
    .bind(req.active)
    .bind(req.position)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(slider)))
}

async fn update_slider(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SliderRequest>,
) -> Result<Json<Slider>> {
    req.validate()?;
    sqlx::query_as::<_, Slider>(
        "UPDATE sliders SET title = $2, description = $3, image = $4, button_text = $5, \
         button_link = $6, active = $7, position = $8, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.image)
    .bind(&req.button_text)
    .bind(&req.button_link)
    .bind(req.active)
    .bind(req.position)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| Error::not_found("Slider"))
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub position: i32,
}

async fn update_position(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PositionRequest>,
) -> Result<Json<Slider>> {
    sqlx::query_as::<_, Slider>(
        "UPDATE sliders SET position = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.position)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| Error::not_found("Slider"))
}

async fn delete_slider(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = sqlx::query("DELETE FROM sliders WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(Error::not_found("Slider"));
    }
    Ok(Json(serde_json::json!({ "message": "Slider deleted successfully" })))
}
