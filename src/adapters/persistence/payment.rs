use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::checkout::PaymentRepoTrait,
    domain::entities::{
        gateway::PaymentGateway,
        notification::NewNotification,
        payment::{NewPayment, Payment, PaymentParty, UserType},
        payment_status::PaymentStatus,
    },
};

const SELECT_COLS: &str = r#"
    id, amount_cents, currency, status, plan_code, gateway, provider_reference,
    account_id, guest_email, guest_name, user_type, installments,
    create_account_after_payment, created_at, updated_at
"#;

fn row_to_payment(row: &PgRow) -> AppResult<Payment> {
    let guest_email: Option<String> = row.get("guest_email");
    let account_id: Option<Uuid> = row.get("account_id");

    let party = match (guest_email, account_id) {
        (Some(email), linked_account_id) => PaymentParty::Guest {
            email,
            name: row.get::<Option<String>, _>("guest_name").unwrap_or_default(),
            user_type: row
                .get::<Option<UserType>, _>("user_type")
                .unwrap_or(UserType::Candidate),
            linked_account_id,
        },
        (None, Some(account_id)) => PaymentParty::Account { account_id },
        (None, None) => {
            return Err(AppError::Persistence(
                "payment row has neither an account nor a guest".into(),
            ));
        }
    };

    Ok(Payment {
        id: row.get("id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: row.get("status"),
        plan_code: row.get("plan_code"),
        gateway: row.get("gateway"),
        provider_reference: row.get("provider_reference"),
        party,
        installments: row.get("installments"),
        create_account_after_payment: row.get("create_account_after_payment"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl PaymentRepoTrait for PostgresPersistence {
    async fn create(&self, input: &NewPayment) -> AppResult<Payment> {
        let (account_id, guest_email, guest_name, user_type) = match &input.party {
            PaymentParty::Account { account_id } => (Some(*account_id), None, None, None),
            PaymentParty::Guest {
                email,
                name,
                user_type,
                linked_account_id,
            } => (
                *linked_account_id,
                Some(email.as_str()),
                Some(name.as_str()),
                Some(*user_type),
            ),
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, amount_cents, currency, status, plan_code, gateway,
                account_id, guest_email, guest_name, user_type,
                installments, create_account_after_payment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(input.id)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .bind(PaymentStatus::Pending)
        .bind(&input.plan_code)
        .bind(input.gateway)
        .bind(account_id)
        .bind(guest_email)
        .bind(guest_name)
        .bind(user_type)
        .bind(input.installments)
        .bind(input.create_account_after_payment)
        .fetch_one(self.pool())
        .await?;

        row_to_payment(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn get_by_provider_reference(
        &self,
        gateway: PaymentGateway,
        reference: &str,
    ) -> AppResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM payments WHERE gateway = $1 AND provider_reference = $2"
        ))
        .bind(gateway)
        .bind(reference)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn set_provider_reference(&self, id: Uuid, reference: &str) -> AppResult<()> {
        // Set-once: a payment is never re-pointed at another processor order.
        sqlx::query(
            r#"
            UPDATE payments
            SET provider_reference = $2, updated_at = now()
            WHERE id = $1 AND provider_reference IS NULL
            "#,
        )
        .bind(id)
        .bind(reference)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn attach_account(&self, id: Uuid, account_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET account_id = $2, updated_at = now()
            WHERE id = $1 AND account_id IS NULL
            "#,
        )
        .bind(id)
        .bind(account_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        outbox: Option<NewNotification>,
    ) -> AppResult<bool> {
        let mut tx = self.pool().begin().await?;

        // The WHERE clause on the expected status is the compare-and-set:
        // exactly one of any concurrent reconcilers sees rows_affected = 1.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3, updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(msg) = outbox {
            sqlx::query(
                r#"
                INSERT INTO notification_outbox (id, kind, recipient_email, payload)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(msg.kind)
            .bind(&msg.recipient_email)
            .bind(&msg.payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_account(&self, account_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM payments WHERE account_id = $1 ORDER BY created_at DESC"
        ))
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_payment).collect()
    }
}
