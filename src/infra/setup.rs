use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::ports::payment_gateway::PaymentGatewayPort,
    application::use_cases::{
        access::AccessGate,
        activation::{SubscriptionActivator, SubscriptionRepoTrait},
        checkout::{CheckoutUseCases, GatewayRegistry, PaymentRepoTrait},
        outbox::NotificationOutboxTrait,
        provisioning::{AccountProvisioner, AccountRepoTrait},
        reconciler::WebhookReconciler,
    },
    domain::entities::plan::PlanCatalog,
    infra::{
        config::AppConfig, mercadopago_client::MercadoPagoClient, openpix_client::OpenPixClient,
        postgres_persistence,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let payment_repo = postgres_arc.clone() as Arc<dyn PaymentRepoTrait>;
    let account_repo = postgres_arc.clone() as Arc<dyn AccountRepoTrait>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepoTrait>;
    let outbox = postgres_arc.clone() as Arc<dyn NotificationOutboxTrait>;

    let timeout = Duration::from_secs(config.gateway_timeout_secs);
    let mercadopago = Arc::new(MercadoPagoClient::new(
        config.mercadopago_access_token.clone(),
        config.environment,
        timeout,
    )?);
    let openpix = Arc::new(OpenPixClient::new(
        config.openpix_app_id.clone(),
        config.environment,
        timeout,
    )?);
    let gateways = GatewayRegistry::new(vec![
        mercadopago as Arc<dyn PaymentGatewayPort>,
        openpix as Arc<dyn PaymentGatewayPort>,
    ]);

    let catalog = PlanCatalog::default();

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
        outbox.clone(),
    ));
    let activator = Arc::new(SubscriptionActivator::new(
        subscription_repo.clone(),
        account_repo.clone(),
        outbox.clone(),
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

    Ok(AppState {
        config: Arc::new(config),
        checkout_use_cases: Arc::new(checkout_use_cases),
        reconciler: Arc::new(reconciler),
        access_gate: Arc::new(access_gate),
        payment_repo,
        outbox,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "payflow=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
