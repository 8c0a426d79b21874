//! Request identity extractors.
//!
//! Session mechanics live in the fronting auth layer; requests arrive with
//! the caller's id in the `x-user-id` header. The role is always re-read
//! from the account store so role changes take effect immediately.

use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Role, User};
use crate::orders::OrderUser;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// An authenticated caller.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The owner snapshot written onto orders at creation.
    pub fn order_user(&self) -> OrderUser {
        OrderUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Reuse an identity already resolved earlier in this request.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(Error::Unauthorized)?;

        let state = AppState::from_ref(state);
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(Error::Unauthorized)?;

        let user = AuthUser::from(user);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// An authenticated caller with the admin role.
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(Error::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
