use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gateway::PaymentGateway;
use super::payment_status::PaymentStatus;

/// Principal type a guest checkout provisions an account for. A new variant
/// here is a compile-time-visible gap in every match that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Candidate,
    Company,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Candidate => "candidate",
            UserType::Company => "company",
        }
    }
}

/// Who a payment belongs to. Exactly one of the two holds; the variant is
/// fixed at creation time.
///
/// A guest payment that has been provisioned keeps its guest identity for
/// audit purposes and records the account it was linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentParty {
    Account {
        account_id: Uuid,
    },
    Guest {
        email: String,
        name: String,
        user_type: UserType,
        /// Set by the account provisioner once the payment completes.
        linked_account_id: Option<Uuid>,
    },
}

impl PaymentParty {
    /// The account this payment resolves to, if known yet.
    pub fn resolved_account_id(&self) -> Option<Uuid> {
        match self {
            PaymentParty::Account { account_id } => Some(*account_id),
            PaymentParty::Guest {
                linked_account_id, ..
            } => *linked_account_id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, PaymentParty::Guest { .. })
    }

    pub fn guest_email(&self) -> Option<&str> {
        match self {
            PaymentParty::Guest { email, .. } => Some(email),
            PaymentParty::Account { .. } => None,
        }
    }
}

/// One purchase attempt, independent of whether it succeeds. Never deleted.
///
/// `id` is the correlation key passed to the processor and echoed back in
/// webhooks; `provider_reference` is the processor's own id for the intent
/// and is immutable once set.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub plan_code: String,
    pub gateway: PaymentGateway,
    pub provider_reference: Option<String>,
    pub party: PaymentParty,
    pub installments: i32,
    pub create_account_after_payment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a payment in `pending` state.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub plan_code: String,
    pub gateway: PaymentGateway,
    pub party: PaymentParty,
    pub installments: i32,
    pub create_account_after_payment: bool,
}
