use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::interests;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = interests)]
#[diesel(belongs_to(crate::models::crop::Crop))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Interest {
    pub id: Uuid,
    pub crop_id: Uuid,
    pub requester_email: String,
    pub quantity: i32,
    pub status: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = interests)]
pub struct NewInterest {
    pub id: Uuid,
    pub crop_id: Uuid,
    pub requester_email: String,
    pub quantity: i32,
    pub status: String,
    pub details: Value,
}

/// Lifecycle of an interest: created `Pending`, decided exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InterestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InterestStatus::Pending => "pending",
            InterestStatus::Accepted => "accepted",
            InterestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InterestStatus::Pending),
            "accepted" => Some(InterestStatus::Accepted),
            "rejected" => Some(InterestStatus::Rejected),
            _ => None,
        }
    }
}

/// Remaining stock after accepting an interest.
///
/// A stored quantity of zero or less counts as a request for 1 unit, and the
/// result never goes below zero.
pub fn quantity_after_accept(current: i32, requested: i32) -> i32 {
    let reduce_by = if requested > 0 { requested } else { 1 };
    (current - reduce_by).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in ["pending", "accepted", "rejected"] {
            assert_eq!(InterestStatus::parse(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(InterestStatus::parse("approved").is_none());
        assert!(InterestStatus::parse("").is_none());
        assert!(InterestStatus::parse("Accepted").is_none());
    }

    #[test]
    fn accept_decrements_by_requested_quantity() {
        assert_eq!(quantity_after_accept(10, 3), 7);
    }

    #[test]
    fn accept_floors_at_zero() {
        assert_eq!(quantity_after_accept(2, 5), 0);
    }

    #[test]
    fn zero_requested_quantity_counts_as_one() {
        assert_eq!(quantity_after_accept(10, 0), 9);
        assert_eq!(quantity_after_accept(10, -4), 9);
    }

    #[test]
    fn exact_request_empties_stock() {
        assert_eq!(quantity_after_accept(5, 5), 0);
    }
}
