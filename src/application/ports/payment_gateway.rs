use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{gateway::PaymentGateway, payment_status::PaymentStatus},
};

// ============================================================================
// Port Types
// ============================================================================

/// Redirect targets the processor sends the buyer back to, parameterized by
/// payment id.
#[derive(Debug, Clone)]
pub struct RedirectUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Provider-agnostic purchase intent request. `payment_id` is the
/// correlation key the processor must echo back in webhooks and redirects.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub payment_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub plan_name: String,
    pub installments: i32,
    pub payer_email: Option<String>,
    pub redirect_urls: RedirectUrls,
}

/// Result of creating a purchase intent with a processor.
#[derive(Debug, Clone)]
pub struct IntentResult {
    /// The processor's own id for the intent (order/preference/charge id).
    pub provider_reference: String,
    /// Where to send the buyer to complete the purchase.
    pub redirect_url: String,
}

/// A processor webhook reduced to the fields reconciliation needs.
#[derive(Debug, Clone)]
pub struct GatewayNotification {
    /// Correlation key we placed at intent creation, if the processor
    /// echoed it.
    pub external_reference: Option<String>,
    /// The processor's own id for the intent.
    pub provider_reference: Option<String>,
    /// Raw processor status vocabulary, normalized via `normalize_status`.
    pub provider_status: String,
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Abstracts one external payment processor.
///
/// Each adapter owns its status mapping table; the table must be total over
/// the processor's vocabulary, with unknown values mapping to `Pending` so
/// new processor states never crash reconciliation.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    /// Which processor this adapter talks to.
    fn gateway(&self) -> PaymentGateway;

    /// Create a purchase intent and return the processor's reference plus
    /// the checkout redirect target.
    async fn create_intent(&self, req: &IntentRequest) -> AppResult<IntentResult>;

    /// Normalize the processor's status vocabulary into the internal enum.
    fn normalize_status(&self, provider_status: &str) -> PaymentStatus;

    /// Extract reconciliation fields from this processor's webhook payload.
    /// Returns `None` for payload shapes that carry nothing to reconcile
    /// (e.g. test pings).
    fn parse_notification(&self, payload: &JsonValue) -> Option<GatewayNotification>;
}
