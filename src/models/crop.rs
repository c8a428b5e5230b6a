use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::crops;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crops)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Crop {
    pub id: Uuid,
    pub name: String,
    pub crop_type: String,
    pub price_per_unit: BigDecimal,
    pub quantity: i32,
    pub owner_email: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crops)]
pub struct NewCrop {
    pub id: Uuid,
    pub name: String,
    pub crop_type: String,
    pub price_per_unit: BigDecimal,
    pub quantity: i32,
    pub owner_email: String,
    pub details: Value,
}

/// Partial update for PUT /crops/{id}; `None` fields are left untouched.
///
/// `quantity` is deliberately writable here even though it is otherwise only
/// mutated through the interest endpoints; a direct overwrite bypasses the
/// stock checks.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = crops)]
pub struct CropChangeset {
    pub name: Option<String>,
    pub crop_type: Option<String>,
    pub price_per_unit: Option<BigDecimal>,
    pub quantity: Option<i32>,
    pub owner_email: Option<String>,
    pub details: Option<Value>,
    pub updated_at: DateTime<Utc>,
}
