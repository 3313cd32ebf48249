//! In-memory mock implementations for the engine's repository traits and
//! the payment gateway port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        GatewayNotification, IntentRequest, IntentResult, PaymentGatewayPort,
    },
    application::use_cases::activation::{SubscriptionRepoTrait, UpsertSubscription},
    application::use_cases::checkout::PaymentRepoTrait,
    application::use_cases::outbox::NotificationOutboxTrait,
    application::use_cases::provisioning::{AccountRepoTrait, NewAccount},
    domain::entities::{
        account::Account,
        gateway::PaymentGateway,
        notification::{NewNotification, NotificationKind, NotificationMessage},
        payment::{NewPayment, Payment, PaymentParty},
        payment_status::PaymentStatus,
        subscription::Subscription,
    },
};

// ============================================================================
// InMemoryOutbox
// ============================================================================

#[derive(Default)]
pub struct InMemoryOutbox {
    pub messages: Mutex<Vec<NotificationMessage>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous append, shared with the payment repo so a status
    /// transition and its outbox message land together like they would in
    /// one database transaction.
    pub fn push(&self, msg: &NewNotification) -> NotificationMessage {
        let message = NotificationMessage {
            id: Uuid::new_v4(),
            kind: msg.kind,
            recipient_email: msg.recipient_email.clone(),
            payload: msg.payload.clone(),
            created_at: Utc::now(),
            dispatched_at: None,
        };
        self.messages.lock().unwrap().push(message.clone());
        message
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.messages.lock().unwrap().iter().map(|m| m.kind).collect()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.kind == kind)
            .count()
    }
}

#[async_trait]
impl NotificationOutboxTrait for InMemoryOutbox {
    async fn enqueue(&self, msg: &NewNotification) -> AppResult<NotificationMessage> {
        Ok(self.push(msg))
    }

    async fn list_pending(&self, limit: i64) -> AppResult<Vec<NotificationMessage>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.dispatched_at.is_none())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, id: Uuid) -> AppResult<()> {
        let mut messages = self.messages.lock().unwrap();
        if let Some(msg) = messages.iter_mut().find(|m| m.id == id) {
            msg.dispatched_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryPaymentRepo
// ============================================================================

pub struct InMemoryPaymentRepo {
    pub payments: Mutex<HashMap<Uuid, Payment>>,
    outbox: Arc<InMemoryOutbox>,
}

impl InMemoryPaymentRepo {
    pub fn new(outbox: Arc<InMemoryOutbox>) -> Self {
        Self {
            payments: Mutex::new(HashMap::new()),
            outbox,
        }
    }

    pub fn insert(&self, payment: Payment) {
        self.payments.lock().unwrap().insert(payment.id, payment);
    }

    pub fn status_of(&self, id: Uuid) -> Option<PaymentStatus> {
        self.payments.lock().unwrap().get(&id).map(|p| p.status)
    }
}

#[async_trait]
impl PaymentRepoTrait for InMemoryPaymentRepo {
    async fn create(&self, input: &NewPayment) -> AppResult<Payment> {
        let now = Utc::now();
        let payment = Payment {
            id: input.id,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            status: PaymentStatus::Pending,
            plan_code: input.plan_code.clone(),
            gateway: input.gateway,
            provider_reference: None,
            party: input.party.clone(),
            installments: input.installments,
            create_account_after_payment: input.create_account_after_payment,
            created_at: now,
            updated_at: now,
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.payments.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_provider_reference(
        &self,
        gateway: PaymentGateway,
        reference: &str,
    ) -> AppResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .find(|p| p.gateway == gateway && p.provider_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn set_provider_reference(&self, id: Uuid, reference: &str) -> AppResult<()> {
        let mut payments = self.payments.lock().unwrap();
        if let Some(payment) = payments.get_mut(&id) {
            if payment.provider_reference.is_none() {
                payment.provider_reference = Some(reference.to_string());
                payment.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn attach_account(&self, id: Uuid, account_id: Uuid) -> AppResult<()> {
        let mut payments = self.payments.lock().unwrap();
        if let Some(payment) = payments.get_mut(&id) {
            if let PaymentParty::Guest {
                linked_account_id, ..
            } = &mut payment.party
            {
                if linked_account_id.is_none() {
                    *linked_account_id = Some(account_id);
                    payment.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        outbox: Option<NewNotification>,
    ) -> AppResult<bool> {
        let mut payments = self.payments.lock().unwrap();
        let Some(payment) = payments.get_mut(&id) else {
            return Err(AppError::NotFound);
        };
        if payment.status != expected {
            return Ok(false);
        }
        payment.status = next;
        payment.updated_at = Utc::now();
        if let Some(msg) = outbox {
            self.outbox.push(&msg);
        }
        Ok(true)
    }

    async fn list_by_account(&self, account_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.party.resolved_account_id() == Some(account_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

// ============================================================================
// InMemoryAccountRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryAccountRepo {
    pub accounts: Mutex<HashMap<Uuid, Account>>,
}

impl InMemoryAccountRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let map = accounts.into_iter().map(|a| (a.id, a)).collect();
        Self {
            accounts: Mutex::new(map),
        }
    }

    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned()
    }
}

#[async_trait]
impl AccountRepoTrait for InMemoryAccountRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.accounts.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self.account_by_email(email))
    }

    async fn create(&self, input: &NewAccount) -> AppResult<Account> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|a| a.email == input.email) {
            return Err(AppError::Duplicate(
                "A record with this value already exists".into(),
            ));
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: input.email.clone(),
            name: input.name.clone(),
            user_type: input.user_type,
            credential_digest: input.credential_digest.clone(),
            profile_complete: input.profile_complete,
            is_admin: false,
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let map = subscriptions.into_iter().map(|s| (s.account_id, s)).collect();
        Self {
            subscriptions: Mutex::new(map),
        }
    }
}

#[async_trait]
impl SubscriptionRepoTrait for InMemorySubscriptionRepo {
    async fn get_by_account(&self, account_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().get(&account_id).cloned())
    }

    async fn upsert(&self, input: &UpsertSubscription) -> AppResult<Subscription> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let now = Utc::now();
        let existing = subscriptions.get(&input.account_id);
        let subscription = Subscription {
            id: existing.map(|s| s.id).unwrap_or_else(Uuid::new_v4),
            account_id: input.account_id,
            plan_code: input.plan_code.clone(),
            start_date: input.start_date,
            end_date: input.end_date,
            features: input.features.clone(),
            max_jobs: input.max_jobs,
            max_candidates: input.max_candidates,
            is_active: input.is_active,
            created_at: existing.map(|s| s.created_at).unwrap_or(now),
            updated_at: now,
        };
        subscriptions.insert(input.account_id, subscription.clone());
        Ok(subscription)
    }

    async fn set_active(&self, account_id: Uuid, is_active: bool) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if let Some(sub) = subscriptions.get_mut(&account_id) {
            sub.is_active = is_active;
            sub.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ============================================================================
// MockGateway
// ============================================================================

/// Gateway adapter double. Records intents, can be toggled to fail, and
/// consumes a flat canonical notification payload:
/// `{"external_reference": ..., "provider_reference": ..., "status": ...}`.
pub struct MockGateway {
    gateway: PaymentGateway,
    pub intents: Mutex<Vec<IntentRequest>>,
    failing: AtomicBool,
}

impl MockGateway {
    pub fn new(gateway: PaymentGateway) -> Self {
        Self {
            gateway,
            intents: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn intent_count(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    pub fn last_intent(&self) -> Option<IntentRequest> {
        self.intents.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGatewayPort for MockGateway {
    fn gateway(&self) -> PaymentGateway {
        self.gateway
    }

    async fn create_intent(&self, req: &IntentRequest) -> AppResult<IntentResult> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::gateway_retryable("simulated processor outage"));
        }
        self.intents.lock().unwrap().push(req.clone());
        Ok(IntentResult {
            provider_reference: format!("mock-{}", req.payment_id),
            redirect_url: format!("https://checkout.test/{}", req.payment_id),
        })
    }

    fn normalize_status(&self, provider_status: &str) -> PaymentStatus {
        match provider_status {
            "approved" | "completed" => PaymentStatus::Completed,
            "pending" => PaymentStatus::Pending,
            "processing" => PaymentStatus::Processing,
            "failed" => PaymentStatus::Failed,
            "cancelled" => PaymentStatus::Cancelled,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }

    fn parse_notification(&self, payload: &JsonValue) -> Option<GatewayNotification> {
        let provider_status = payload.get("status")?.as_str()?.to_string();
        Some(GatewayNotification {
            external_reference: payload
                .get("external_reference")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            provider_reference: payload
                .get("provider_reference")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            provider_status,
        })
    }
}
