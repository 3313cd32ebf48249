use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Entitlement record granting feature access for a bounded period.
///
/// Created or renewed only as a side effect of a payment reaching
/// `completed`; never created directly by user action.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan_code: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub features: Vec<String>,
    pub max_jobs: i32,
    pub max_candidates: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Currently entitled iff active and not past its end date.
    pub fn is_currently_entitled(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date >= now
    }
}
