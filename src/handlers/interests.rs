use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::crop::Crop;
use crate::models::interest::{quantity_after_accept, Interest, InterestStatus, NewInterest};
use crate::schema::{crops, interests};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInterestRequest {
    pub requester_email: Option<String>,
    /// Units requested from the listing's stock. Defaults to 1.
    pub quantity: Option<i32>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecideInterestRequest {
    pub interest_id: Option<Uuid>,
    /// "accepted" or "rejected"
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyInterestsParams {
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterestResponse {
    pub id: Uuid,
    pub requester_email: String,
    pub quantity: i32,
    pub status: String,
    #[schema(value_type = Object)]
    pub details: Value,
    pub created_at: String,
}

impl From<Interest> for InterestResponse {
    fn from(i: Interest) -> Self {
        InterestResponse {
            id: i.id,
            requester_email: i.requester_email,
            quantity: i.quantity,
            status: i.status,
            details: i.details,
            created_at: i.created_at.to_rfc3339(),
        }
    }
}

/// One entry of the GET /my-interests projection: a listing reduced to its
/// identity plus the caller's own interests.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyInterestsEntry {
    pub listing_id: Uuid,
    pub name: String,
    pub owner: String,
    pub interests: Vec<InterestResponse>,
}

impl SubmitInterestRequest {
    pub fn validated(self) -> Result<(String, i32, Value), AppError> {
        let email = self
            .requester_email
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::validation("requesterEmail is required"))?;
        let quantity = self.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(AppError::validation("quantity must be at least 1"));
        }
        Ok((email, quantity, Value::Object(self.details)))
    }
}

impl DecideInterestRequest {
    /// A decision is only ever "accepted" or "rejected"; anything else
    /// (including "pending") is invalid input.
    pub fn validated(self) -> Result<(Uuid, InterestStatus), AppError> {
        let interest_id = self
            .interest_id
            .ok_or_else(|| AppError::validation("interestId is required"))?;
        let raw = self
            .status
            .ok_or_else(|| AppError::validation("status is required"))?;
        match InterestStatus::parse(&raw) {
            Some(status @ (InterestStatus::Accepted | InterestStatus::Rejected)) => {
                Ok((interest_id, status))
            }
            _ => Err(AppError::validation(
                "status must be 'accepted' or 'rejected'",
            )),
        }
    }
}

/// Lock the crop row for the rest of the transaction. Serializes concurrent
/// interest submissions and decisions against the same listing.
fn lock_crop(conn: &mut PgConnection, crop_id: Uuid) -> Result<Crop, AppError> {
    crops::table
        .find(crop_id)
        .select(Crop::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Crop not found"))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /crops/{id}/interest
///
/// Submits a purchase interest against a listing. The stock check and the
/// insert run in one transaction holding the crop row lock, so two concurrent
/// submissions cannot both pass the check and oversell.
#[utoipa::path(
    post,
    path = "/crops/{id}/interest",
    params(("id" = Uuid, Path, description = "Crop listing UUID")),
    request_body = SubmitInterestRequest,
    responses(
        (status = 200, description = "Interest created with status pending", body = InterestResponse),
        (status = 400, description = "Missing email or requested quantity exceeds stock"),
        (status = 404, description = "Listing not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "interests"
)]
pub async fn submit_interest(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<SubmitInterestRequest>,
) -> Result<HttpResponse, AppError> {
    let crop_id = path.into_inner();
    let (requester_email, quantity, details) = body.into_inner().validated()?;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let crop = lock_crop(conn, crop_id)?;

            if quantity > crop.quantity {
                return Err(AppError::validation(
                    "Requested quantity exceeds available stock.",
                ));
            }

            let new_interest = NewInterest {
                id: Uuid::new_v4(),
                crop_id,
                requester_email,
                quantity,
                status: InterestStatus::Pending.as_str().to_string(),
                details,
            };
            let row = diesel::insert_into(interests::table)
                .values(&new_interest)
                .returning(Interest::as_returning())
                .get_result(conn)?;
            Ok(row)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(InterestResponse::from(result)))
}

/// PUT /crops/{id}/interest
///
/// Accepts or rejects a pending interest. An acceptance decrements the
/// listing's stock by the interest's requested quantity (at least 1), floored
/// at zero. The transition is valid only from `pending`, so deciding the same
/// interest twice can never decrement stock twice.
#[utoipa::path(
    put,
    path = "/crops/{id}/interest",
    params(("id" = Uuid, Path, description = "Crop listing UUID")),
    request_body = DecideInterestRequest,
    responses(
        (status = 200, description = "Updated interest", body = InterestResponse),
        (status = 400, description = "Bad status value or interest already decided"),
        (status = 404, description = "Listing or interest not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "interests"
)]
pub async fn decide_interest(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<DecideInterestRequest>,
) -> Result<HttpResponse, AppError> {
    let crop_id = path.into_inner();
    let (interest_id, decision) = body.into_inner().validated()?;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let crop = lock_crop(conn, crop_id)?;

            let interest = interests::table
                .find(interest_id)
                .filter(interests::crop_id.eq(crop.id))
                .select(Interest::as_select())
                .first(conn)
                .optional()?;
            let Some(interest) = interest else {
                return Err(AppError::not_found("Interest not found"));
            };

            if interest.status != InterestStatus::Pending.as_str() {
                return Err(AppError::validation("Interest already decided"));
            }

            let updated = diesel::update(interests::table.find(interest.id))
                .set(interests::status.eq(decision.as_str()))
                .returning(Interest::as_returning())
                .get_result(conn)?;

            if decision == InterestStatus::Accepted && crop.quantity > 0 {
                let remaining = quantity_after_accept(crop.quantity, interest.quantity);
                diesel::update(crops::table.find(crop.id))
                    .set((
                        crops::quantity.eq(remaining),
                        crops::updated_at.eq(chrono::Utc::now()),
                    ))
                    .execute(conn)?;
            }

            Ok(updated)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(InterestResponse::from(result)))
}

/// GET /my-interests?userEmail=…
///
/// Every listing holding at least one interest from the given requester,
/// reduced to {listingId, name, owner} with only that requester's interests.
#[utoipa::path(
    get,
    path = "/my-interests",
    params(("userEmail" = String, Query, description = "Requester email address")),
    responses(
        (status = 200, description = "Listings with the caller's interests", body = [MyInterestsEntry]),
        (status = 400, description = "Missing userEmail parameter"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "interests"
)]
pub async fn my_interests(
    pool: web::Data<DbPool>,
    query: web::Query<MyInterestsParams>,
) -> Result<HttpResponse, AppError> {
    let email = query
        .into_inner()
        .user_email
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::validation("userEmail is required"))?;

    let result = web::block(move || {
        let mut conn = pool.get()?;
        let rows: Vec<(Interest, Crop)> = interests::table
            .inner_join(crops::table)
            .filter(interests::requester_email.eq(&email))
            .order((crops::created_at.asc(), interests::created_at.asc()))
            .select((Interest::as_select(), Crop::as_select()))
            .load(&mut conn)?;

        let mut entries: Vec<MyInterestsEntry> = Vec::new();
        for (interest, crop) in rows {
            match entries.iter_mut().find(|e| e.listing_id == crop.id) {
                Some(entry) => entry.interests.push(interest.into()),
                None => entries.push(MyInterestsEntry {
                    listing_id: crop.id,
                    name: crop.name,
                    owner: crop.owner_email,
                    interests: vec![interest.into()],
                }),
            }
        }
        Ok::<_, AppError>(entries)
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_requires_requester_email() {
        let req = SubmitInterestRequest {
            requester_email: None,
            quantity: Some(2),
            details: Map::new(),
        };
        assert!(matches!(req.validated(), Err(AppError::Validation(_))));
    }

    #[test]
    fn submit_quantity_defaults_to_one() {
        let req = SubmitInterestRequest {
            requester_email: Some("buyer@example.com".to_string()),
            quantity: None,
            details: Map::new(),
        };
        let (email, quantity, _) = req.validated().unwrap();
        assert_eq!(email, "buyer@example.com");
        assert_eq!(quantity, 1);
    }

    #[test]
    fn submit_rejects_non_positive_quantity() {
        let req = SubmitInterestRequest {
            requester_email: Some("buyer@example.com".to_string()),
            quantity: Some(0),
            details: Map::new(),
        };
        assert!(matches!(req.validated(), Err(AppError::Validation(_))));
    }

    #[test]
    fn decide_requires_interest_id() {
        let req = DecideInterestRequest {
            interest_id: None,
            status: Some("accepted".to_string()),
        };
        assert!(matches!(req.validated(), Err(AppError::Validation(_))));
    }

    #[test]
    fn decide_accepts_both_terminal_statuses() {
        for status in ["accepted", "rejected"] {
            let req = DecideInterestRequest {
                interest_id: Some(Uuid::new_v4()),
                status: Some(status.to_string()),
            };
            let (_, parsed) = req.validated().unwrap();
            assert_eq!(parsed.as_str(), status);
        }
    }

    #[test]
    fn decide_rejects_pending_and_unknown_statuses() {
        for status in ["pending", "approved", "", "ACCEPTED"] {
            let req = DecideInterestRequest {
                interest_id: Some(Uuid::new_v4()),
                status: Some(status.to_string()),
            };
            assert!(matches!(req.validated(), Err(AppError::Validation(_))));
        }
    }
}
