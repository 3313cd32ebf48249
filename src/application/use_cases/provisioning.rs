use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::checkout::PaymentRepoTrait,
    application::use_cases::outbox::NotificationOutboxTrait,
    domain::entities::{
        account::{Account, normalize_email},
        notification::{NewNotification, NotificationKind},
        payment::{Payment, PaymentParty, UserType},
    },
};

// ============================================================================
// Repository Trait
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub user_type: UserType,
    pub credential_digest: String,
    pub profile_complete: bool,
}

#[async_trait]
pub trait AccountRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;

    /// Create an account. Email is unique; a concurrent creation for the
    /// same email surfaces as `AppError::Duplicate`.
    async fn create(&self, input: &NewAccount) -> AppResult<Account>;
}

// ============================================================================
// Account Provisioner
// ============================================================================

const GENERATED_CREDENTIAL_BYTES: usize = 32;

/// Resolves a completed guest payment to an account: links to an existing
/// account by email, or creates one with a random credential and queues a
/// set-your-password notification.
///
/// Safe to invoke repeatedly for the same payment.
pub struct AccountProvisioner {
    account_repo: Arc<dyn AccountRepoTrait>,
    payment_repo: Arc<dyn PaymentRepoTrait>,
    outbox: Arc<dyn NotificationOutboxTrait>,
}

impl AccountProvisioner {
    pub fn new(
        account_repo: Arc<dyn AccountRepoTrait>,
        payment_repo: Arc<dyn PaymentRepoTrait>,
        outbox: Arc<dyn NotificationOutboxTrait>,
    ) -> Self {
        Self {
            account_repo,
            payment_repo,
            outbox,
        }
    }

    /// Returns the account id the payment now resolves to.
    pub async fn provision(&self, payment: &Payment) -> AppResult<Uuid> {
        // Idempotency guard: an already-resolved payment needs no lookup or
        // creation at all.
        if let Some(account_id) = payment.party.resolved_account_id() {
            return Ok(account_id);
        }

        let (email, name, user_type) = match &payment.party {
            PaymentParty::Guest {
                email,
                name,
                user_type,
                ..
            } => (normalize_email(email), name.clone(), *user_type),
            PaymentParty::Account { account_id } => return Ok(*account_id),
        };

        if let Some(existing) = self.account_repo.find_by_email(&email).await? {
            self.payment_repo
                .attach_account(payment.id, existing.id)
                .await?;
            return Ok(existing.id);
        }

        let account = match self.create_account(&email, &name, user_type).await {
            Ok(account) => account,
            Err(AppError::Duplicate(_)) => {
                // Lost a creation race for the same email: the account
                // exists now, re-fetch and attach.
                self.account_repo
                    .find_by_email(&email)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "account for {} vanished after duplicate-key conflict",
                            email
                        ))
                    })?
            }
            Err(e) => return Err(e),
        };

        self.payment_repo
            .attach_account(payment.id, account.id)
            .await?;

        Ok(account.id)
    }

    async fn create_account(
        &self,
        email: &str,
        name: &str,
        user_type: UserType,
    ) -> AppResult<Account> {
        let mut credential = [0u8; GENERATED_CREDENTIAL_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut credential);
        let credential_plaintext =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(credential);
        let credential_digest = hex::encode(Sha256::digest(credential_plaintext.as_bytes()));

        let account = self
            .account_repo
            .create(&NewAccount {
                email: email.to_string(),
                name: name.to_string(),
                user_type,
                credential_digest,
                profile_complete: false,
            })
            .await?;

        tracing::info!(
            account_id = %account.id,
            user_type = user_type.as_str(),
            "Provisioned account for guest payment"
        );

        self.outbox
            .enqueue(&NewNotification {
                kind: NotificationKind::AccountCredentials,
                recipient_email: account.email.clone(),
                payload: serde_json::json!({
                    "account_id": account.id,
                    "name": account.name,
                    "user_type": user_type.as_str(),
                }),
            })
            .await?;

        Ok(account)
    }
}
