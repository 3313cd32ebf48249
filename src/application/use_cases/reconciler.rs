use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::GatewayNotification,
    application::use_cases::{
        activation::SubscriptionActivator,
        checkout::{GatewayRegistry, PaymentRepoTrait},
        provisioning::{AccountProvisioner, AccountRepoTrait},
    },
    domain::entities::{
        gateway::PaymentGateway,
        notification::{NewNotification, NotificationKind},
        payment::Payment,
        payment_status::PaymentStatus,
    },
};

/// What reconciliation did with a notification. `Duplicate` and `Ignored`
/// are acknowledged to the processor; only genuine processing errors
/// propagate so the processor retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A forward transition was applied and its side effects ran.
    Applied {
        payment_id: Uuid,
        status: PaymentStatus,
    },
    /// Replay, equal status, terminal payment, or a lost transition race.
    Duplicate,
    /// Unresolvable or out-of-order notification; nothing to do.
    Ignored,
}

/// Applies processor notifications to payments idempotently and drives the
/// completed-payment side-effect chain exactly once per terminal transition.
pub struct WebhookReconciler {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    account_repo: Arc<dyn AccountRepoTrait>,
    provisioner: Arc<AccountProvisioner>,
    activator: Arc<SubscriptionActivator>,
    gateways: GatewayRegistry,
}

impl WebhookReconciler {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        account_repo: Arc<dyn AccountRepoTrait>,
        provisioner: Arc<AccountProvisioner>,
        activator: Arc<SubscriptionActivator>,
        gateways: GatewayRegistry,
    ) -> Self {
        Self {
            payment_repo,
            account_repo,
            provisioner,
            activator,
            gateways,
        }
    }

    pub async fn reconcile(
        &self,
        gateway: PaymentGateway,
        payload: &JsonValue,
    ) -> AppResult<ReconcileOutcome> {
        let adapter = self.gateways.get(gateway)?;

        let Some(notification) = adapter.parse_notification(payload) else {
            tracing::debug!(gateway = %gateway, "Webhook payload carries nothing to reconcile");
            return Ok(ReconcileOutcome::Ignored);
        };

        let Some(payment) = self.resolve_payment(gateway, &notification).await? else {
            // The processor will retry forever regardless of what we answer,
            // so an unknown reference is acknowledged and recorded.
            tracing::warn!(
                gateway = %gateway,
                external_reference = ?notification.external_reference,
                provider_reference = ?notification.provider_reference,
                "Webhook did not resolve to a payment"
            );
            return Ok(ReconcileOutcome::Ignored);
        };

        let normalized = adapter.normalize_status(&notification.provider_status);

        if payment.status == normalized || payment.status.is_terminal() {
            tracing::debug!(
                payment_id = %payment.id,
                current = %payment.status,
                incoming = %normalized,
                "Duplicate or late notification, nothing to do"
            );
            return Ok(ReconcileOutcome::Duplicate);
        }

        if !payment.status.can_transition_to(normalized) {
            tracing::warn!(
                payment_id = %payment.id,
                current = %payment.status,
                incoming = %normalized,
                provider_status = %notification.provider_status,
                "Out-of-order notification ignored"
            );
            return Ok(ReconcileOutcome::Ignored);
        }

        let outbox = self.transition_notification(&payment, normalized).await?;

        let won = self
            .payment_repo
            .transition(payment.id, payment.status, normalized, outbox)
            .await?;
        if !won {
            tracing::debug!(
                payment_id = %payment.id,
                "Lost transition race to a concurrent notification"
            );
            return Ok(ReconcileOutcome::Duplicate);
        }

        match normalized {
            PaymentStatus::Completed => {
                // Guests without an account at checkout get one now; every
                // other party already resolves.
                let account_id = match payment.party.resolved_account_id() {
                    Some(account_id) => account_id,
                    None if payment.create_account_after_payment => {
                        self.provisioner.provision(&payment).await?
                    }
                    None => {
                        return Err(AppError::Internal(format!(
                            "payment {} resolves to no account and was not flagged for provisioning",
                            payment.id
                        )));
                    }
                };
                self.activator.activate(account_id, &payment.plan_code).await?;
            }
            PaymentStatus::Refunded => {
                if let Some(account_id) = self.refund_target(&payment).await? {
                    self.activator.revoke(account_id).await?;
                } else {
                    tracing::warn!(
                        payment_id = %payment.id,
                        "Refunded payment has no resolvable account to revoke"
                    );
                }
            }
            PaymentStatus::Pending
            | PaymentStatus::Processing
            | PaymentStatus::Failed
            | PaymentStatus::Cancelled => {}
        }

        tracing::info!(
            payment_id = %payment.id,
            from = %payment.status,
            to = %normalized,
            "Payment reconciled"
        );

        Ok(ReconcileOutcome::Applied {
            payment_id: payment.id,
            status: normalized,
        })
    }

    /// Correlation key first; provider reference as fallback for processors
    /// that only echo their own id.
    async fn resolve_payment(
        &self,
        gateway: PaymentGateway,
        notification: &GatewayNotification,
    ) -> AppResult<Option<Payment>> {
        if let Some(reference) = &notification.external_reference {
            if let Ok(payment_id) = Uuid::parse_str(reference) {
                if let Some(payment) = self.payment_repo.get_by_id(payment_id).await? {
                    return Ok(Some(payment));
                }
            }
        }
        if let Some(provider_reference) = &notification.provider_reference {
            return self
                .payment_repo
                .get_by_provider_reference(gateway, provider_reference)
                .await;
        }
        Ok(None)
    }

    /// The outbox message written atomically with a terminal transition.
    async fn transition_notification(
        &self,
        payment: &Payment,
        next: PaymentStatus,
    ) -> AppResult<Option<NewNotification>> {
        if next != PaymentStatus::Completed {
            return Ok(None);
        }
        let Some(recipient_email) = self.recipient_email(payment).await? else {
            return Ok(None);
        };
        Ok(Some(NewNotification {
            kind: NotificationKind::PaymentCompleted,
            recipient_email,
            payload: serde_json::json!({
                "payment_id": payment.id,
                "plan_code": payment.plan_code,
                "amount_cents": payment.amount_cents,
                "currency": payment.currency,
            }),
        }))
    }

    async fn recipient_email(&self, payment: &Payment) -> AppResult<Option<String>> {
        if let Some(email) = payment.party.guest_email() {
            return Ok(Some(email.to_string()));
        }
        let Some(account_id) = payment.party.resolved_account_id() else {
            return Ok(None);
        };
        Ok(self
            .account_repo
            .get_by_id(account_id)
            .await?
            .map(|a| a.email))
    }

    async fn refund_target(&self, payment: &Payment) -> AppResult<Option<Uuid>> {
        if let Some(account_id) = payment.party.resolved_account_id() {
            return Ok(Some(account_id));
        }
        // A guest payment that completed was provisioned, but this Payment
        // value predates the attach; re-read for the linked account.
        Ok(self
            .payment_repo
            .get_by_id(payment.id)
            .await?
            .and_then(|p| p.party.resolved_account_id()))
    }
}
