use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    application::use_cases::provisioning::{AccountRepoTrait, NewAccount},
    domain::entities::account::Account,
};

const SELECT_COLS: &str = r#"
    id, email, name, user_type, credential_digest, profile_complete, is_admin, created_at
"#;

fn row_to_account(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        user_type: row.get("user_type"),
        credential_digest: row.get("credential_digest"),
        profile_complete: row.get("profile_complete"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AccountRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM accounts WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    async fn create(&self, input: &NewAccount) -> AppResult<Account> {
        // The unique index on email turns a concurrent creation race into
        // AppError::Duplicate via the sqlx error mapping.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (id, email, name, user_type, credential_digest, profile_complete)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.email)
        .bind(&input.name)
        .bind(input.user_type)
        .bind(&input.credential_digest)
        .bind(input.profile_complete)
        .fetch_one(self.pool())
        .await?;

        Ok(row_to_account(&row))
    }
}
