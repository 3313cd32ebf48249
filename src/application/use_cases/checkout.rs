use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        IntentRequest, PaymentGatewayPort, RedirectUrls,
    },
    application::use_cases::provisioning::AccountRepoTrait,
    application::validators::{is_valid_email, is_valid_guest_name},
    domain::entities::{
        account::normalize_email,
        gateway::{PaymentGateway, PaymentMethodFamily},
        notification::NewNotification,
        payment::{NewPayment, Payment, PaymentParty, UserType},
        payment_status::PaymentStatus,
        plan::PlanCatalog,
    },
};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PaymentRepoTrait: Send + Sync {
    /// Persist a new payment in `pending` state.
    async fn create(&self, input: &NewPayment) -> AppResult<Payment>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>>;

    async fn get_by_provider_reference(
        &self,
        gateway: PaymentGateway,
        reference: &str,
    ) -> AppResult<Option<Payment>>;

    /// Attach the processor's reference to a payment. Set-once: a payment is
    /// never re-pointed at a different processor order.
    async fn set_provider_reference(&self, id: Uuid, reference: &str) -> AppResult<()>;

    /// Attach a resolved account to a guest payment. No-op when an account
    /// is already attached.
    async fn attach_account(&self, id: Uuid, account_id: Uuid) -> AppResult<()>;

    /// Compare-and-set status transition keyed on the expected current
    /// status. The outbox message, if any, is written atomically with the
    /// transition. Returns `false` when the payment already moved on (a
    /// concurrent reconciler won the race).
    async fn transition(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        outbox: Option<NewNotification>,
    ) -> AppResult<bool>;

    async fn list_by_account(&self, account_id: Uuid) -> AppResult<Vec<Payment>>;
}

// ============================================================================
// Gateway Registry
// ============================================================================

/// The set of gateway adapters, constructed once at startup and injected.
#[derive(Clone)]
pub struct GatewayRegistry {
    adapters: HashMap<PaymentGateway, Arc<dyn PaymentGatewayPort>>,
}

impl GatewayRegistry {
    pub fn new(adapters: Vec<Arc<dyn PaymentGatewayPort>>) -> Self {
        let adapters = adapters.into_iter().map(|a| (a.gateway(), a)).collect();
        Self { adapters }
    }

    pub fn get(&self, gateway: PaymentGateway) -> AppResult<Arc<dyn PaymentGatewayPort>> {
        self.adapters.get(&gateway).cloned().ok_or_else(|| {
            AppError::Internal(format!("no adapter registered for {}", gateway))
        })
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Who is buying: a verified token principal or a guest email+name pair.
#[derive(Debug, Clone)]
pub enum CheckoutPrincipal {
    Authenticated {
        account_id: Uuid,
    },
    Guest {
        email: String,
        name: String,
        user_type: UserType,
    },
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub plan_code: String,
    pub amount_cents: i64,
    pub installments: i32,
    pub method: PaymentMethodFamily,
    pub principal: CheckoutPrincipal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub payment_id: Uuid,
    pub provider_reference: String,
    pub redirect_url: String,
}

// ============================================================================
// Use Cases
// ============================================================================

/// Orchestrates checkout: validate, persist a durable pending payment,
/// create the processor intent, persist the provider handle.
pub struct CheckoutUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    account_repo: Arc<dyn AccountRepoTrait>,
    gateways: GatewayRegistry,
    catalog: PlanCatalog,
    base_url: Url,
}

impl CheckoutUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        account_repo: Arc<dyn AccountRepoTrait>,
        gateways: GatewayRegistry,
        catalog: PlanCatalog,
        base_url: Url,
    ) -> Self {
        Self {
            payment_repo,
            account_repo,
            gateways,
            catalog,
            base_url,
        }
    }

    pub async fn create_checkout(&self, req: &CheckoutRequest) -> AppResult<CheckoutOutcome> {
        let plan = self
            .catalog
            .resolve(&req.plan_code)
            .ok_or_else(|| AppError::Validation(format!("unknown plan: {}", req.plan_code)))?;

        if req.amount_cents <= 0 {
            return Err(AppError::Validation("amount must be positive".into()));
        }
        if req.amount_cents != plan.amount_cents {
            return Err(AppError::Validation(format!(
                "amount does not match plan price for {}",
                plan.code
            )));
        }
        if req.installments < 1 {
            return Err(AppError::Validation("installments must be at least 1".into()));
        }

        let (party, payer_email) = self.resolve_party(&req.principal).await?;
        let create_account_after_payment =
            party.is_guest() && party.resolved_account_id().is_none();

        // Durable record first: the payment row must exist before any
        // outbound call, so a failed gateway call never loses the attempt.
        let payment = self
            .payment_repo
            .create(&NewPayment {
                id: Uuid::new_v4(),
                amount_cents: req.amount_cents,
                currency: plan.currency.to_string(),
                plan_code: plan.code.to_string(),
                gateway: req.method.gateway(),
                party,
                installments: req.installments,
                create_account_after_payment,
            })
            .await?;

        let adapter = self.gateways.get(payment.gateway)?;
        let intent = IntentRequest {
            payment_id: payment.id,
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            plan_name: plan.name.to_string(),
            installments: payment.installments,
            payer_email,
            redirect_urls: self.redirect_urls(payment.id),
        };

        let result = match adapter.create_intent(&intent).await {
            Ok(result) => result,
            Err(e) => {
                // No orphaned pending payment without a provider handle:
                // mark it failed before surfacing the gateway error. The
                // caller must re-initiate checkout rather than retry this
                // payment, so duplicate intents cannot pile up.
                let marked = self
                    .payment_repo
                    .transition(
                        payment.id,
                        PaymentStatus::Pending,
                        PaymentStatus::Failed,
                        None,
                    )
                    .await?;
                if !marked {
                    tracing::warn!(
                        payment_id = %payment.id,
                        "Payment moved concurrently while marking checkout failure"
                    );
                }
                return Err(e);
            }
        };

        self.payment_repo
            .set_provider_reference(payment.id, &result.provider_reference)
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            gateway = %payment.gateway,
            provider_reference = %result.provider_reference,
            "Checkout created"
        );

        Ok(CheckoutOutcome {
            payment_id: payment.id,
            provider_reference: result.provider_reference,
            redirect_url: result.redirect_url,
        })
    }

    async fn resolve_party(
        &self,
        principal: &CheckoutPrincipal,
    ) -> AppResult<(PaymentParty, Option<String>)> {
        match principal {
            CheckoutPrincipal::Authenticated { account_id } => {
                let account = self
                    .account_repo
                    .get_by_id(*account_id)
                    .await?
                    .ok_or_else(|| AppError::Validation("account not found".into()))?;
                Ok((
                    PaymentParty::Account {
                        account_id: account.id,
                    },
                    Some(account.email),
                ))
            }
            CheckoutPrincipal::Guest {
                email,
                name,
                user_type,
            } => {
                if !is_valid_email(email) {
                    return Err(AppError::Validation("invalid guest email".into()));
                }
                if !is_valid_guest_name(name) {
                    return Err(AppError::Validation("invalid guest name".into()));
                }
                let normalized = normalize_email(email);
                // Opportunistic pre-fill only; a missing account never
                // blocks the guest flow.
                let linked_account_id = self
                    .account_repo
                    .find_by_email(&normalized)
                    .await?
                    .map(|a| a.id);
                Ok((
                    PaymentParty::Guest {
                        email: normalized.clone(),
                        name: name.trim().to_string(),
                        user_type: *user_type,
                        linked_account_id,
                    },
                    Some(normalized),
                ))
            }
        }
    }

    fn redirect_urls(&self, payment_id: Uuid) -> RedirectUrls {
        let target = |page: &str| {
            let mut url = self.base_url.clone();
            url.set_path(&format!("payments/{}", page));
            url.set_query(Some(&format!("payment_id={}", payment_id)));
            url.to_string()
        };
        RedirectUrls {
            success: target("success"),
            failure: target("failure"),
            pending: target("pending"),
        }
    }
}
