use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::notification::{NewNotification, NotificationMessage},
};

pub const OUTBOX_DRAIN_BATCH: i64 = 50;
pub const OUTBOX_DRAIN_INTERVAL_SECS: u64 = 5;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait NotificationOutboxTrait: Send + Sync {
    async fn enqueue(&self, msg: &NewNotification) -> AppResult<NotificationMessage>;

    async fn list_pending(&self, limit: i64) -> AppResult<Vec<NotificationMessage>>;

    async fn mark_dispatched(&self, id: Uuid) -> AppResult<()>;
}

// ============================================================================
// Drain Loop
// ============================================================================

/// Hands pending outbox messages to the notification subsystem and marks
/// them dispatched. Delivery itself (email, in-app) is owned by that
/// subsystem; this loop only drains the queue.
pub async fn run_outbox_drain_loop(outbox: Arc<dyn NotificationOutboxTrait>) {
    loop {
        match outbox.list_pending(OUTBOX_DRAIN_BATCH).await {
            Ok(batch) => {
                for msg in batch {
                    tracing::info!(
                        kind = msg.kind.as_str(),
                        recipient = %msg.recipient_email,
                        message_id = %msg.id,
                        "Dispatching notification"
                    );
                    if let Err(e) = outbox.mark_dispatched(msg.id).await {
                        tracing::error!(error = %e, message_id = %msg.id, "Failed to mark notification dispatched");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read notification outbox");
            }
        }
        tokio::time::sleep(Duration::from_secs(OUTBOX_DRAIN_INTERVAL_SECS)).await;
    }
}
