//! Test app state builder for HTTP-level integration testing.
//!
//! Builds an `AppState` wired exactly like production setup, with in-memory
//! repositories and mock gateway adapters in place of Postgres and the real
//! processors.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::jwt,
    application::ports::payment_gateway::PaymentGatewayPort,
    application::use_cases::{
        access::AccessGate,
        activation::{SubscriptionActivator, SubscriptionRepoTrait},
        checkout::{CheckoutUseCases, GatewayRegistry, PaymentRepoTrait},
        outbox::NotificationOutboxTrait,
        provisioning::{AccountProvisioner, AccountRepoTrait},
        reconciler::WebhookReconciler,
    },
    domain::entities::{
        account::Account, gateway::PaymentGateway, payment::UserType, plan::PlanCatalog,
        subscription::Subscription,
    },
    infra::config::{AppConfig, Environment},
    test_utils::{
        InMemoryAccountRepo, InMemoryOutbox, InMemoryPaymentRepo, InMemorySubscriptionRepo,
        MockGateway,
    },
};

pub const TEST_JWT_SECRET: &str = "test_jwt_secret";

/// Issue a bearer token for a test principal, signed with the builder's
/// fixed test secret.
pub fn bearer_token(account_id: Uuid, user_type: UserType, is_admin: bool) -> String {
    jwt::issue(
        account_id,
        user_type,
        is_admin,
        &SecretString::new(TEST_JWT_SECRET.into()),
        time::Duration::hours(1),
    )
    .expect("test token issuance should not fail")
}

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: String::new(),
        base_url: Url::parse("http://localhost:3000").unwrap(),
        environment: Environment::Sandbox,
        jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        mercadopago_access_token: SecretString::new("TEST-token".into()),
        openpix_app_id: SecretString::new("test-app-id".into()),
        gateway_timeout_secs: 5,
    }
}

/// The built state plus handles to every mock, so tests can seed data and
/// assert on what the engine persisted or enqueued.
pub struct TestAppState {
    pub app_state: AppState,
    pub payments: Arc<InMemoryPaymentRepo>,
    pub accounts: Arc<InMemoryAccountRepo>,
    pub subscriptions: Arc<InMemorySubscriptionRepo>,
    pub outbox: Arc<InMemoryOutbox>,
    pub mercadopago: Arc<MockGateway>,
    pub openpix: Arc<MockGateway>,
}

#[derive(Default)]
pub struct TestAppStateBuilder {
    accounts: Vec<Account>,
    subscriptions: Vec<Subscription>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn build(self) -> TestAppState {
        let outbox = Arc::new(InMemoryOutbox::new());
        let payments = Arc::new(InMemoryPaymentRepo::new(outbox.clone()));
        let accounts = Arc::new(InMemoryAccountRepo::with_accounts(self.accounts));
        let subscriptions = Arc::new(InMemorySubscriptionRepo::with_subscriptions(
            self.subscriptions,
        ));
        let mercadopago = Arc::new(MockGateway::new(PaymentGateway::MercadoPago));
        let openpix = Arc::new(MockGateway::new(PaymentGateway::OpenPix));

        let payment_repo = payments.clone() as Arc<dyn PaymentRepoTrait>;
        let account_repo = accounts.clone() as Arc<dyn AccountRepoTrait>;
        let subscription_repo = subscriptions.clone() as Arc<dyn SubscriptionRepoTrait>;
        let outbox_trait = outbox.clone() as Arc<dyn NotificationOutboxTrait>;

        let gateways = GatewayRegistry::new(vec![
            mercadopago.clone() as Arc<dyn PaymentGatewayPort>,
            openpix.clone() as Arc<dyn PaymentGatewayPort>,
        ]);
        let catalog = PlanCatalog::default();
        let config = Arc::new(test_config());

        let checkout_use_cases = CheckoutUseCases::new(
            payment_repo.clone(),
            account_repo.clone(),
            gateways.clone(),
            catalog.clone(),
            config.base_url.clone(),
        );

        let provisioner = Arc::new(AccountProvisioner::new(
            account_repo.clone(),
            payment_repo.clone(),
            outbox_trait.clone(),
        ));
        let activator = Arc::new(SubscriptionActivator::new(
            subscription_repo.clone(),
            account_repo.clone(),
            outbox_trait.clone(),
            catalog,
        ));
        let reconciler = WebhookReconciler::new(
            payment_repo.clone(),
            account_repo,
            provisioner,
            activator,
            gateways,
        );

        let access_gate = AccessGate::new(subscription_repo);

        let app_state = AppState {
            config,
            checkout_use_cases: Arc::new(checkout_use_cases),
            reconciler: Arc::new(reconciler),
            access_gate: Arc::new(access_gate),
            payment_repo,
            outbox: outbox_trait,
        };

        TestAppState {
            app_state,
            payments,
            accounts,
            subscriptions,
            outbox,
            mercadopago,
            openpix,
        }
    }
}
