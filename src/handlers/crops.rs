use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::handlers::interests::InterestResponse;
use crate::models::crop::{Crop, CropChangeset, NewCrop};
use crate::models::interest::Interest;
use crate::schema::{crops, interests};

/// How many listings GET /latest-crops returns.
pub const LATEST_CROPS_LIMIT: i64 = 6;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCropRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub crop_type: Option<String>,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub price_per_unit: Option<String>,
    pub quantity: Option<i32>,
    pub owner: Option<String>,
    /// Any additional free-form fields submitted with the listing.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCropRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub crop_type: Option<String>,
    pub price_per_unit: Option<String>,
    pub quantity: Option<i32>,
    pub owner: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCropResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CropResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: String,
    pub price_per_unit: String,
    pub quantity: i32,
    pub owner: String,
    #[schema(value_type = Object)]
    pub details: Value,
    pub created_at: String,
    pub interests: Vec<InterestResponse>,
}

impl CropResponse {
    pub fn from_crop(crop: Crop, interests: Vec<Interest>) -> Self {
        CropResponse {
            id: crop.id,
            name: crop.name,
            crop_type: crop.crop_type,
            price_per_unit: crop.price_per_unit.to_string(),
            quantity: crop.quantity,
            owner: crop.owner_email,
            details: crop.details,
            created_at: crop.created_at.to_rfc3339(),
            interests: interests.into_iter().map(InterestResponse::from).collect(),
        }
    }
}

impl CreateCropRequest {
    /// Boundary validation: name, type and pricePerUnit must be present, the
    /// price must parse as a decimal, and quantity may not start negative.
    pub fn into_new_crop(self) -> Result<NewCrop, AppError> {
        let name = self
            .name
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::validation("name is required"))?;
        let crop_type = self
            .crop_type
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::validation("type is required"))?;
        let price = self
            .price_per_unit
            .ok_or_else(|| AppError::validation("pricePerUnit is required"))?;
        let price_per_unit = BigDecimal::from_str(&price)
            .map_err(|_| AppError::validation(format!("Invalid pricePerUnit '{}'", price)))?;
        let quantity = self.quantity.unwrap_or(0);
        if quantity < 0 {
            return Err(AppError::validation("quantity must not be negative"));
        }
        Ok(NewCrop {
            id: Uuid::new_v4(),
            name,
            crop_type,
            price_per_unit,
            quantity,
            owner_email: self.owner.unwrap_or_default(),
            details: Value::Object(self.details),
        })
    }
}

/// Load the interests of each crop, in submission order, and pair them up.
fn with_interests(
    conn: &mut PgConnection,
    crops: Vec<Crop>,
) -> Result<Vec<CropResponse>, AppError> {
    let rows = Interest::belonging_to(&crops)
        .order(interests::created_at.asc())
        .select(Interest::as_select())
        .load(conn)?;
    let grouped = rows.grouped_by(&crops);
    Ok(crops
        .into_iter()
        .zip(grouped)
        .map(|(crop, interests)| CropResponse::from_crop(crop, interests))
        .collect())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /crops
///
/// Returns every listing together with its interests. No pagination.
#[utoipa::path(
    get,
    path = "/crops",
    responses(
        (status = 200, description = "All crop listings", body = [CropResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "crops"
)]
pub async fn list_crops(pool: web::Data<DbPool>) -> Result<HttpResponse, AppError> {
    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows = crops::table
            .order(crops::created_at.asc())
            .select(Crop::as_select())
            .load(&mut conn)?;
        with_interests(&mut conn, rows)
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /latest-crops
///
/// Returns the newest listings (creation order, newest first), at most
/// [`LATEST_CROPS_LIMIT`].
#[utoipa::path(
    get,
    path = "/latest-crops",
    responses(
        (status = 200, description = "Up to 6 newest listings", body = [CropResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "crops"
)]
pub async fn latest_crops(pool: web::Data<DbPool>) -> Result<HttpResponse, AppError> {
    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows = crops::table
            .order(crops::created_at.desc())
            .limit(LATEST_CROPS_LIMIT)
            .select(Crop::as_select())
            .load(&mut conn)?;
        with_interests(&mut conn, rows)
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /crops/{id}
#[utoipa::path(
    get,
    path = "/crops/{id}",
    params(("id" = Uuid, Path, description = "Crop listing UUID")),
    responses(
        (status = 200, description = "Listing found", body = CropResponse),
        (status = 404, description = "Listing not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "crops"
)]
pub async fn get_crop(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let crop_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let crop = crops::table
            .find(crop_id)
            .select(Crop::as_select())
            .first(&mut conn)
            .optional()?;
        let Some(crop) = crop else {
            return Err(AppError::not_found("Crop not found"));
        };
        let mut responses = with_interests(&mut conn, vec![crop])?;
        Ok(responses.remove(0))
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /crops
///
/// Creates a listing with an empty interest list and returns the generated id.
#[utoipa::path(
    post,
    path = "/crops",
    request_body = CreateCropRequest,
    responses(
        (status = 201, description = "Listing created", body = CreateCropResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "crops"
)]
pub async fn create_crop(
    pool: web::Data<DbPool>,
    body: web::Json<CreateCropRequest>,
) -> Result<HttpResponse, AppError> {
    let new_crop = body.into_inner().into_new_crop()?;
    let crop_id = new_crop.id;

    web::block(move || {
        let mut conn = pool.get()?;
        diesel::insert_into(crops::table)
            .values(&new_crop)
            .execute(&mut conn)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(HttpResponse::Created().json(CreateCropResponse { id: crop_id }))
}

/// PUT /crops/{id}
///
/// Merges the given fields into the listing. Absent fields are untouched;
/// free-form extra fields are merged into the stored details. A `quantity`
/// here overwrites stock directly, bypassing the interest bookkeeping.
#[utoipa::path(
    put,
    path = "/crops/{id}",
    params(("id" = Uuid, Path, description = "Crop listing UUID")),
    request_body = UpdateCropRequest,
    responses(
        (status = 200, description = "Updated listing", body = CropResponse),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "Listing not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "crops"
)]
pub async fn update_crop(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCropRequest>,
) -> Result<HttpResponse, AppError> {
    let crop_id = path.into_inner();
    let req = body.into_inner();

    let price_per_unit = match req.price_per_unit {
        Some(p) => Some(
            BigDecimal::from_str(&p)
                .map_err(|_| AppError::validation(format!("Invalid pricePerUnit '{}'", p)))?,
        ),
        None => None,
    };

    let result = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let crop = crops::table
                .find(crop_id)
                .select(Crop::as_select())
                .for_update()
                .first(conn)
                .optional()?;
            let Some(crop) = crop else {
                return Err(AppError::not_found("Crop not found"));
            };

            // Merge extra fields into the existing details document instead of
            // replacing it wholesale.
            let details = if req.details.is_empty() {
                None
            } else {
                let mut merged = match crop.details {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                merged.extend(req.details);
                Some(Value::Object(merged))
            };

            let changeset = CropChangeset {
                name: req.name,
                crop_type: req.crop_type,
                price_per_unit,
                quantity: req.quantity,
                owner_email: req.owner,
                details,
                updated_at: Utc::now(),
            };
            let updated = diesel::update(crops::table.find(crop_id))
                .set(&changeset)
                .returning(Crop::as_returning())
                .get_result(conn)?;

            let mut responses = with_interests(conn, vec![updated])?;
            Ok(responses.remove(0))
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// DELETE /crops/{id}
///
/// Removes the listing and, via the foreign key, all of its interests.
/// Deleting an unknown id is an error, not a no-op.
#[utoipa::path(
    delete,
    path = "/crops/{id}",
    params(("id" = Uuid, Path, description = "Crop listing UUID")),
    responses(
        (status = 200, description = "Listing deleted"),
        (status = 404, description = "Listing not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "crops"
)]
pub async fn delete_crop(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let crop_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(crops::table.find(crop_id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::not_found("Crop not found"));
        }
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Crop deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, crop_type: Option<&str>, price: Option<&str>) -> CreateCropRequest {
        CreateCropRequest {
            name: name.map(String::from),
            crop_type: crop_type.map(String::from),
            price_per_unit: price.map(String::from),
            quantity: Some(10),
            owner: Some("farmer@example.com".to_string()),
            details: Map::new(),
        }
    }

    #[test]
    fn valid_request_builds_new_crop() {
        let new_crop = request(Some("Wheat"), Some("Grain"), Some("12.50"))
            .into_new_crop()
            .expect("should validate");
        assert_eq!(new_crop.name, "Wheat");
        assert_eq!(new_crop.crop_type, "Grain");
        assert_eq!(new_crop.quantity, 10);
        assert_eq!(new_crop.price_per_unit.to_string(), "12.50");
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = request(None, Some("Grain"), Some("12.50"))
            .into_new_crop()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = request(Some("   "), Some("Grain"), Some("12.50"))
            .into_new_crop()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = request(Some("Wheat"), None, Some("12.50"))
            .into_new_crop()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn missing_price_is_rejected() {
        let err = request(Some("Wheat"), Some("Grain"), None)
            .into_new_crop()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_decimal_price_is_rejected() {
        let err = request(Some("Wheat"), Some("Grain"), Some("cheap"))
            .into_new_crop()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let mut req = request(Some("Wheat"), Some("Grain"), Some("12.50"));
        req.quantity = Some(-1);
        let err = req.into_new_crop().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn quantity_defaults_to_zero() {
        let mut req = request(Some("Wheat"), Some("Grain"), Some("12.50"));
        req.quantity = None;
        assert_eq!(req.into_new_crop().unwrap().quantity, 0);
    }

    #[test]
    fn extra_fields_become_details() {
        let mut req = request(Some("Wheat"), Some("Grain"), Some("12.50"));
        req.details
            .insert("location".to_string(), Value::String("Dhaka".to_string()));
        let new_crop = req.into_new_crop().unwrap();
        assert_eq!(new_crop.details["location"], "Dhaka");
    }
}
