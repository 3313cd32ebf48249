use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    application::use_cases::outbox::NotificationOutboxTrait,
    domain::entities::notification::{NewNotification, NotificationMessage},
};

const SELECT_COLS: &str = r#"
    id, kind, recipient_email, payload, created_at, dispatched_at
"#;

fn row_to_message(row: &PgRow) -> NotificationMessage {
    NotificationMessage {
        id: row.get("id"),
        kind: row.get("kind"),
        recipient_email: row.get("recipient_email"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
        dispatched_at: row.get("dispatched_at"),
    }
}

#[async_trait]
impl NotificationOutboxTrait for PostgresPersistence {
    async fn enqueue(&self, msg: &NewNotification) -> AppResult<NotificationMessage> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO notification_outbox (id, kind, recipient_email, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(msg.kind)
        .bind(&msg.recipient_email)
        .bind(&msg.payload)
        .fetch_one(self.pool())
        .await?;

        Ok(row_to_message(&row))
    }

    async fn list_pending(&self, limit: i64) -> AppResult<Vec<NotificationMessage>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM notification_outbox
            WHERE dispatched_at IS NULL
            ORDER BY created_at
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn mark_dispatched(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET dispatched_at = now()
            WHERE id = $1 AND dispatched_at IS NULL
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
