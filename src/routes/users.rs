//! Account endpoints. Credentials never pass through this service; accounts
//! are provisioned by the external auth layer through the admin API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{Error, Result};
use crate::models::{Role, User};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(me))
}

async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or(Error::Unauthorized)
}

async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<User>>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: Option<Role>,
}

async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    req.validate()?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username, email, role) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.username)
    .bind(&req.email)
    .bind(req.role.unwrap_or(Role::Buyer))
    .fetch_one(&state.db)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Validation("Username or email already taken".to_string())
        }
        _ => Error::Database(err),
    })?;
    Ok((StatusCode::CREATED, Json(user)))
}
