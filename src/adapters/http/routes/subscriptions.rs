use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    adapters::http::{app_state::AppState, auth},
    app_error::{AppError, AppResult},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/me", get(get_my_subscription))
        .route("/access", get(check_access))
}

#[derive(Serialize)]
struct SubscriptionResponse {
    plan_code: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    features: Vec<String>,
    max_jobs: i32,
    max_candidates: i32,
    is_active: bool,
    entitled: bool,
}

async fn get_my_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let principal = auth::current_principal(&headers, &app_state)?;

    let subscription = app_state
        .access_gate
        .current_subscription(principal.account_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let entitled = subscription.is_currently_entitled(Utc::now());
    Ok(Json(SubscriptionResponse {
        plan_code: subscription.plan_code,
        start_date: subscription.start_date,
        end_date: subscription.end_date,
        features: subscription.features,
        max_jobs: subscription.max_jobs,
        max_candidates: subscription.max_candidates,
        is_active: subscription.is_active,
        entitled,
    }))
}

async fn check_access(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let principal = auth::current_principal(&headers, &app_state)?;

    let allowed = app_state.access_gate.check(&principal).await?;

    Ok(Json(serde_json::json!({ "allowed": allowed })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::Duration;
    use serde_json::Value as JsonValue;
    use uuid::Uuid;

    use crate::domain::entities::payment::UserType;
    use crate::test_utils::{
        TestAppState, TestAppStateBuilder, bearer_token, create_test_account,
        create_test_subscription,
    };

    fn build_test_router(app_state: AppState) -> Router<()> {
        router().with_state(app_state)
    }

    fn server(state: &TestAppState) -> TestServer {
        TestServer::new(build_test_router(state.app_state.clone())).unwrap()
    }

    async fn access_allowed(server: &TestServer, token: &str) -> bool {
        let response = server.get("/access").authorization_bearer(token).await;
        response.assert_status_ok();
        let body: JsonValue = response.json();
        body["allowed"].as_bool().unwrap()
    }

    #[tokio::test]
    async fn access_requires_a_token() {
        let state = TestAppStateBuilder::new().build();
        let server = server(&state);

        server.get("/access").await.assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/access")
            .authorization_bearer("not-a-token")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn access_truth_table() {
        let active = create_test_account(|_| {});
        let expired = create_test_account(|_| {});
        let deactivated = create_test_account(|_| {});
        let bare = create_test_account(|_| {});
        let (active_id, expired_id, deactivated_id, bare_id) =
            (active.id, expired.id, deactivated.id, bare.id);

        let state = TestAppStateBuilder::new()
            .with_account(active)
            .with_account(expired)
            .with_account(deactivated)
            .with_account(bare)
            .with_subscription(create_test_subscription(active_id, |_| {}))
            .with_subscription(create_test_subscription(expired_id, |s| {
                s.end_date = Utc::now() - Duration::days(1);
            }))
            .with_subscription(create_test_subscription(deactivated_id, |s| {
                s.is_active = false;
            }))
            .build();
        let server = server(&state);

        let token = |id: Uuid| bearer_token(id, UserType::Company, false);
        assert!(access_allowed(&server, &token(active_id)).await);
        assert!(!access_allowed(&server, &token(expired_id)).await);
        assert!(!access_allowed(&server, &token(deactivated_id)).await);
        assert!(!access_allowed(&server, &token(bare_id)).await);
    }

    #[tokio::test]
    async fn admin_bypasses_subscription_check() {
        let admin = create_test_account(|a| a.is_admin = true);
        let admin_id = admin.id;
        let state = TestAppStateBuilder::new().with_account(admin).build();
        let server = server(&state);

        let token = bearer_token(admin_id, UserType::Company, true);
        assert!(access_allowed(&server, &token).await);
    }

    #[tokio::test]
    async fn my_subscription_reflects_entitlement() {
        let account = create_test_account(|_| {});
        let account_id = account.id;
        let state = TestAppStateBuilder::new()
            .with_account(account)
            .with_subscription(create_test_subscription(account_id, |s| {
                s.plan_code = "premium".into();
            }))
            .build();
        let server = server(&state);

        let response = server
            .get("/subscriptions/me")
            .authorization_bearer(bearer_token(account_id, UserType::Company, false))
            .await;

        response.assert_status_ok();
        let body: JsonValue = response.json();
        assert_eq!(body["plan_code"], "premium");
        assert_eq!(body["entitled"], true);
    }

    #[tokio::test]
    async fn my_subscription_without_one_is_404() {
        let account = create_test_account(|_| {});
        let account_id = account.id;
        let state = TestAppStateBuilder::new().with_account(account).build();
        let server = server(&state);

        server
            .get("/subscriptions/me")
            .authorization_bearer(bearer_token(account_id, UserType::Candidate, false))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
