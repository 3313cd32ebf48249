use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::AppResult,
    application::use_cases::activation::{SubscriptionRepoTrait, UpsertSubscription},
    domain::entities::subscription::Subscription,
};

const SELECT_COLS: &str = r#"
    id, account_id, plan_code, start_date, end_date, features,
    max_jobs, max_candidates, is_active, created_at, updated_at
"#;

fn row_to_subscription(row: &PgRow) -> Subscription {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");

    Subscription {
        id,
        account_id: row.get("account_id"),
        plan_code: row.get("plan_code"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        features: parse_json_with_fallback(&features_json, "features", &id.to_string()),
        max_jobs: row.get("max_jobs"),
        max_candidates: row.get("max_candidates"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl SubscriptionRepoTrait for PostgresPersistence {
    async fn get_by_account(&self, account_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM subscriptions WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn upsert(&self, input: &UpsertSubscription) -> AppResult<Subscription> {
        // One subscription row per account, enforced by the unique index on
        // account_id. Renewal replaces plan fields and period in place.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                id, account_id, plan_code, start_date, end_date, features,
                max_jobs, max_candidates, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (account_id) DO UPDATE SET
                plan_code = EXCLUDED.plan_code,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                features = EXCLUDED.features,
                max_jobs = EXCLUDED.max_jobs,
                max_candidates = EXCLUDED.max_candidates,
                is_active = EXCLUDED.is_active,
                updated_at = now()
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.account_id)
        .bind(&input.plan_code)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(serde_json::json!(input.features))
        .bind(input.max_jobs)
        .bind(input.max_candidates)
        .bind(input.is_active)
        .fetch_one(self.pool())
        .await?;

        Ok(row_to_subscription(&row))
    }

    async fn set_active(&self, account_id: Uuid, is_active: bool) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET is_active = $2, updated_at = now()
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(is_active)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
