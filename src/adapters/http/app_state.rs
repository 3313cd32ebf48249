use std::sync::Arc;

use crate::{
    application::use_cases::{
        access::AccessGate,
        checkout::{CheckoutUseCases, PaymentRepoTrait},
        outbox::NotificationOutboxTrait,
        reconciler::WebhookReconciler,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub checkout_use_cases: Arc<CheckoutUseCases>,
    pub reconciler: Arc<WebhookReconciler>,
    pub access_gate: Arc<AccessGate>,
    pub payment_repo: Arc<dyn PaymentRepoTrait>,
    pub outbox: Arc<dyn NotificationOutboxTrait>,
}
