use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Kind of downstream notification the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentCompleted,
    AccountCredentials,
    SubscriptionActivated,
    EntitlementRevoked,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentCompleted => "payment_completed",
            NotificationKind::AccountCredentials => "account_credentials",
            NotificationKind::SubscriptionActivated => "subscription_activated",
            NotificationKind::EntitlementRevoked => "entitlement_revoked",
        }
    }
}

/// Outbox row. Written transactionally alongside the state change that
/// produced it and drained asynchronously, so a crash between "state
/// updated" and "email sent" cannot drop the notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub recipient_email: String,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

/// Input for enqueueing an outbox message.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub recipient_email: String,
    pub payload: JsonValue,
}
