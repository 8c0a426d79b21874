//! Shared row and domain types.
//!
//! Prices are integer minor units (cents). `stock` is the count of sellable
//! units and is mutated only by the order lifecycle engine and direct admin
//! edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image: String,
    pub category: String,
    pub stock: i32,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Slider {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub button_text: String,
    pub button_link: String,
    pub active: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One cart line as the order engine sees it: product reference plus the
/// snapshot data needed to build an order item without a second lookup.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Structured shipping address, stored as JSONB on the order.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    ContactForm,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_email: String,
    pub is_admin: bool,
    pub kind: MessageKind,
    pub subject: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
