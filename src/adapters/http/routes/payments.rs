use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth},
    app_error::{AppError, AppResult},
    application::use_cases::{
        checkout::{CheckoutPrincipal, CheckoutRequest},
        reconciler::ReconcileOutcome,
    },
    domain::entities::{
        gateway::{PaymentGateway, PaymentMethodFamily},
        payment::{Payment, UserType},
        payment_status::PaymentStatus,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-preference", post(create_preference))
        .route("/webhook/{gateway}", post(gateway_webhook))
        .route("/", get(list_my_payments))
        .route("/{id}", get(get_payment))
}

// ============================================================================
// Request / Response Types
// ============================================================================

fn default_installments() -> i32 {
    1
}

#[derive(Deserialize)]
struct GuestDetails {
    email: String,
    name: String,
    user_type: UserType,
}

#[derive(Deserialize)]
struct CreatePreferenceRequest {
    plan_code: String,
    amount_cents: i64,
    #[serde(default = "default_installments")]
    installments: i32,
    payment_method: PaymentMethodFamily,
    guest: Option<GuestDetails>,
}

#[derive(Serialize)]
struct PaymentResponse {
    id: Uuid,
    status: PaymentStatus,
    plan_code: String,
    amount_cents: i64,
    currency: String,
    gateway: PaymentGateway,
    installments: i32,
    created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        PaymentResponse {
            id: p.id,
            status: p.status,
            plan_code: p.plan_code,
            amount_cents: p.amount_cents,
            currency: p.currency,
            gateway: p.gateway,
            installments: p.installments,
            created_at: p.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_preference(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePreferenceRequest>,
) -> AppResult<impl IntoResponse> {
    let principal = match auth::optional_principal(&headers, &app_state)? {
        Some(principal) => CheckoutPrincipal::Authenticated {
            account_id: principal.account_id,
        },
        None => {
            let guest = body.guest.ok_or_else(|| {
                AppError::Validation("guest details are required for unauthenticated checkout".into())
            })?;
            CheckoutPrincipal::Guest {
                email: guest.email,
                name: guest.name,
                user_type: guest.user_type,
            }
        }
    };

    let outcome = app_state
        .checkout_use_cases
        .create_checkout(&CheckoutRequest {
            plan_code: body.plan_code,
            amount_cents: body.amount_cents,
            installments: body.installments,
            method: body.payment_method,
            principal,
        })
        .await?;

    Ok(Json(outcome))
}

/// Processor notification endpoint. Duplicates and unresolvable payloads are
/// acknowledged with 200 so the processor stops retrying; genuine processing
/// failures propagate as 5xx so it retries later.
async fn gateway_webhook(
    State(app_state): State<AppState>,
    Path(gateway): Path<String>,
    Json(payload): Json<JsonValue>,
) -> AppResult<impl IntoResponse> {
    let gateway = PaymentGateway::from_path_segment(&gateway).ok_or(AppError::NotFound)?;

    let outcome = app_state.reconciler.reconcile(gateway, &payload).await?;

    let ack = match outcome {
        ReconcileOutcome::Applied { .. } => "applied",
        ReconcileOutcome::Duplicate => "duplicate",
        ReconcileOutcome::Ignored => "ignored",
    };
    Ok(Json(serde_json::json!({ "status": ack })))
}

async fn get_payment(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let payment = app_state
        .payment_repo
        .get_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;

    // An unresolved guest payment is viewable by id alone, since the buyer
    // returning from the processor redirect holds no token yet. Once an
    // account owns the payment, only that account (or an admin) may see it,
    // and foreign payments are indistinguishable from missing ones.
    if let Some(owner) = payment.party.resolved_account_id() {
        let principal = auth::current_principal(&headers, &app_state)?;
        if principal.account_id != owner && !principal.is_admin {
            return Err(AppError::NotFound);
        }
    }

    Ok(Json(PaymentResponse::from(payment)))
}

async fn list_my_payments(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let principal = auth::current_principal(&headers, &app_state)?;

    let payments = app_state
        .payment_repo
        .list_by_account(principal.account_id)
        .await?;

    Ok(Json(
        payments
            .into_iter()
            .map(PaymentResponse::from)
            .collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::domain::entities::notification::NotificationKind;
    use crate::domain::entities::payment::PaymentParty;
    use crate::test_utils::{
        TestAppState, TestAppStateBuilder, bearer_token, create_test_account, create_test_payment,
    };

    fn build_test_router(app_state: AppState) -> Router<()> {
        router().with_state(app_state)
    }

    fn server(state: &TestAppState) -> TestServer {
        TestServer::new(build_test_router(state.app_state.clone())).unwrap()
    }

    fn guest_checkout_body() -> JsonValue {
        json!({
            "plan_code": "premium",
            "amount_cents": 5_500,
            "payment_method": "card",
            "guest": {
                "email": "Buyer@Example.com",
                "name": "Guest Buyer",
                "user_type": "company",
            }
        })
    }

    // =========================================================================
    // POST /create-preference
    // =========================================================================

    #[tokio::test]
    async fn guest_checkout_creates_pending_payment_and_intent() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let response = server
            .post("/create-preference")
            .json(&guest_checkout_body())
            .await;

        response.assert_status_ok();
        let body: JsonValue = response.json();
        let payment_id: Uuid =
            serde_json::from_value(body["payment_id"].clone()).unwrap();
        assert!(body["redirect_url"].as_str().unwrap().contains(&payment_id.to_string()));

        let payment = state.payments.payments.lock().unwrap()[&payment_id].clone();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.gateway, PaymentGateway::MercadoPago);
        assert_eq!(
            payment.provider_reference.as_deref(),
            Some(format!("mock-{payment_id}").as_str())
        );
        assert!(payment.create_account_after_payment);
        // Email reaches the processor normalized.
        assert_eq!(payment.party.guest_email(), Some("buyer@example.com"));

        let intent = state.mercadopago.last_intent().unwrap();
        assert_eq!(intent.amount_cents, 5_500);
        assert_eq!(intent.payer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(state.openpix.intent_count(), 0);
    }

    #[tokio::test]
    async fn instant_transfer_routes_to_openpix() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let mut body = guest_checkout_body();
        body["payment_method"] = json!("instant_transfer");

        server.post("/create-preference").json(&body).await.assert_status_ok();

        assert_eq!(state.openpix.intent_count(), 1);
        assert_eq!(state.mercadopago.intent_count(), 0);
    }

    #[tokio::test]
    async fn checkout_unknown_plan_returns_400() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let mut body = guest_checkout_body();
        body["plan_code"] = json!("gold");

        let response = server.post("/create-preference").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_amount_mismatch_returns_400() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let mut body = guest_checkout_body();
        body["amount_cents"] = json!(100);

        let response = server.post("/create-preference").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(state.payments.payments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_without_token_or_guest_returns_400() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let response = server
            .post("/create-preference")
            .json(&json!({
                "plan_code": "premium",
                "amount_cents": 5_500,
                "payment_method": "card",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gateway_outage_marks_payment_failed_and_returns_502() {
        let state = TestAppStateBuilder::new().build();
        state.mercadopago.set_failing(true);
        let server = server(&state);

        let response = server
            .post("/create-preference")
            .json(&guest_checkout_body())
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);

        let payments = state.payments.payments.lock().unwrap();
        assert_eq!(payments.len(), 1);
        let payment = payments.values().next().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.provider_reference, None);
    }

    #[tokio::test]
    async fn authenticated_checkout_uses_account_party() {
        let account = create_test_account(|a| a.email = "owner@example.com".into());
        let account_id = account.id;
        let state = TestAppStateBuilder::new().with_account(account).build();
        let server = server(&state);

        let response = server
            .post("/create-preference")
            .authorization_bearer(bearer_token(account_id, UserType::Company, false))
            .json(&json!({
                "plan_code": "basic",
                "amount_cents": 1_500,
                "payment_method": "card",
            }))
            .await;

        response.assert_status_ok();
        let payments = state.payments.payments.lock().unwrap();
        let payment = payments.values().next().unwrap();
        assert_eq!(
            payment.party,
            PaymentParty::Account { account_id }
        );
        assert!(!payment.create_account_after_payment);
    }

    // =========================================================================
    // POST /webhook/{gateway}
    // =========================================================================

    fn webhook_payload(payment_id: Uuid, status: &str) -> JsonValue {
        json!({
            "external_reference": payment_id.to_string(),
            "status": status,
        })
    }

    #[tokio::test]
    async fn webhook_unknown_gateway_returns_404() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let response = server
            .post("/webhook/stripe")
            .json(&json!({ "status": "approved" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_for_unknown_payment_is_acknowledged() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let response = server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(Uuid::new_v4(), "approved"))
            .await;

        response.assert_status_ok();
        let body: JsonValue = response.json();
        assert_eq!(body["status"], "ignored");
    }

    #[tokio::test]
    async fn completed_webhook_provisions_guest_and_activates_subscription() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let checkout: JsonValue = server
            .post("/create-preference")
            .json(&guest_checkout_body())
            .await
            .json();
        let payment_id: Uuid = serde_json::from_value(checkout["payment_id"].clone()).unwrap();

        let response = server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(payment_id, "approved"))
            .await;

        response.assert_status_ok();
        let body: JsonValue = response.json();
        assert_eq!(body["status"], "applied");

        assert_eq!(state.payments.status_of(payment_id), Some(PaymentStatus::Completed));

        let account = state.accounts.account_by_email("buyer@example.com").unwrap();
        assert!(!account.profile_complete);

        let subscription = state.subscriptions.subscriptions.lock().unwrap()[&account.id].clone();
        assert!(subscription.is_active);
        assert_eq!(subscription.plan_code, "premium");

        let kinds = state.outbox.kinds();
        assert!(kinds.contains(&NotificationKind::PaymentCompleted));
        assert!(kinds.contains(&NotificationKind::AccountCredentials));
        assert!(kinds.contains(&NotificationKind::SubscriptionActivated));
    }

    #[tokio::test]
    async fn prelinked_guest_completion_skips_provisioning() {
        let account = create_test_account(|a| a.email = "buyer@example.com".into());
        let account_id = account.id;
        let state = TestAppStateBuilder::new().with_account(account).build();
        let server = server(&state);

        let checkout: JsonValue = server
            .post("/create-preference")
            .json(&guest_checkout_body())
            .await
            .json();
        let payment_id: Uuid = serde_json::from_value(checkout["payment_id"].clone()).unwrap();

        // Linked at checkout, so completion must not create anything.
        let payment = state.payments.payments.lock().unwrap()[&payment_id].clone();
        assert!(!payment.create_account_after_payment);
        assert_eq!(payment.party.resolved_account_id(), Some(account_id));

        server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(payment_id, "approved"))
            .await
            .assert_status_ok();

        assert_eq!(state.accounts.accounts.lock().unwrap().len(), 1);
        assert_eq!(state.outbox.count_of(NotificationKind::AccountCredentials), 0);
        let subscription = state.subscriptions.subscriptions.lock().unwrap()[&account_id].clone();
        assert!(subscription.is_active);
    }

    #[tokio::test]
    async fn replayed_webhook_is_acknowledged_without_side_effects() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        let checkout: JsonValue = server
            .post("/create-preference")
            .json(&guest_checkout_body())
            .await
            .json();
        let payment_id: Uuid = serde_json::from_value(checkout["payment_id"].clone()).unwrap();

        server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(payment_id, "approved"))
            .await
            .assert_status_ok();

        let account = state.accounts.account_by_email("buyer@example.com").unwrap();
        let end_date_before =
            state.subscriptions.subscriptions.lock().unwrap()[&account.id].end_date;

        let response = server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(payment_id, "approved"))
            .await;

        response.assert_status_ok();
        let body: JsonValue = response.json();
        assert_eq!(body["status"], "duplicate");

        // No double activation, no duplicate notifications.
        let end_date_after =
            state.subscriptions.subscriptions.lock().unwrap()[&account.id].end_date;
        assert_eq!(end_date_before, end_date_after);
        assert_eq!(state.outbox.count_of(NotificationKind::PaymentCompleted), 1);
        assert_eq!(state.outbox.count_of(NotificationKind::SubscriptionActivated), 1);
    }

    #[tokio::test]
    async fn out_of_order_webhook_is_ignored() {
        let payment = create_test_payment(|p| p.status = PaymentStatus::Processing);
        let payment_id = payment.id;
        let state = TestAppStateBuilder::new().build();
        state.payments.insert(payment);
        let server = server(&state);

        let response = server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(payment_id, "pending"))
            .await;

        response.assert_status_ok();
        let body: JsonValue = response.json();
        assert_eq!(body["status"], "ignored");
        assert_eq!(
            state.payments.status_of(payment_id),
            Some(PaymentStatus::Processing)
        );
    }

    #[tokio::test]
    async fn refund_webhook_revokes_entitlement() {
        let account = create_test_account(|a| a.email = "refunded@example.com".into());
        let account_id = account.id;
        let payment = create_test_payment(|p| {
            p.status = PaymentStatus::Completed;
            p.party = PaymentParty::Account { account_id };
        });
        let payment_id = payment.id;
        let subscription = crate::test_utils::create_test_subscription(account_id, |_| {});

        let state = TestAppStateBuilder::new()
            .with_account(account)
            .with_subscription(subscription)
            .build();
        state.payments.insert(payment);
        let server = server(&state);

        let response = server
            .post("/webhook/mercadopago")
            .json(&webhook_payload(payment_id, "refunded"))
            .await;

        response.assert_status_ok();
        assert_eq!(
            state.payments.status_of(payment_id),
            Some(PaymentStatus::Refunded)
        );
        let subscription = state.subscriptions.subscriptions.lock().unwrap()[&account_id].clone();
        assert!(!subscription.is_active);
        assert_eq!(state.outbox.count_of(NotificationKind::EntitlementRevoked), 1);
    }

    // =========================================================================
    // GET /{id} and GET /
    // =========================================================================

    #[tokio::test]
    async fn owner_sees_payment_and_stranger_sees_404() {
        let owner = create_test_account(|_| {});
        let stranger = create_test_account(|_| {});
        let owner_id = owner.id;
        let stranger_id = stranger.id;
        let payment = create_test_payment(|p| {
            p.party = PaymentParty::Account { account_id: owner_id };
        });
        let payment_id = payment.id;

        let state = TestAppStateBuilder::new()
            .with_account(owner)
            .with_account(stranger)
            .build();
        state.payments.insert(payment);
        let server = server(&state);

        server
            .get(&format!("/{payment_id}"))
            .authorization_bearer(bearer_token(owner_id, UserType::Candidate, false))
            .await
            .assert_status_ok();

        server
            .get(&format!("/{payment_id}"))
            .authorization_bearer(bearer_token(stranger_id, UserType::Candidate, false))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // Admin may inspect any payment.
        server
            .get(&format!("/{payment_id}"))
            .authorization_bearer(bearer_token(stranger_id, UserType::Candidate, true))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn unresolved_guest_payment_is_viewable_by_id() {
        let payment = create_test_payment(|p| {
            p.party = PaymentParty::Guest {
                email: "guest@example.com".into(),
                name: "Guest".into(),
                user_type: UserType::Candidate,
                linked_account_id: None,
            };
        });
        let payment_id = payment.id;
        let state = TestAppStateBuilder::new().build();
        state.payments.insert(payment);
        let server = server(&state);

        let response = server.get(&format!("/{payment_id}")).await;
        response.assert_status_ok();
        let body: JsonValue = response.json();
        // No guest identity in the response body.
        assert!(body.get("party").is_none());
        assert!(body.get("guest_email").is_none());
    }

    #[tokio::test]
    async fn listing_payments_requires_auth_and_filters_by_owner() {
        let owner = create_test_account(|_| {});
        let owner_id = owner.id;
        let mine = create_test_payment(|p| {
            p.party = PaymentParty::Account { account_id: owner_id };
        });
        let other = create_test_payment(|_| {});

        let state = TestAppStateBuilder::new().with_account(owner).build();
        state.payments.insert(mine);
        state.payments.insert(other);
        let server = server(&state);

        server.get("/").await.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .get("/")
            .authorization_bearer(bearer_token(owner_id, UserType::Candidate, false))
            .await;
        response.assert_status_ok();
        let body: Vec<JsonValue> = response.json();
        assert_eq!(body.len(), 1);
    }
}
