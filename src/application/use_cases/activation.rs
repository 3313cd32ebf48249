use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::outbox::NotificationOutboxTrait,
    application::use_cases::provisioning::AccountRepoTrait,
    domain::entities::{
        notification::{NewNotification, NotificationKind},
        plan::PlanCatalog,
        subscription::Subscription,
    },
};

// ============================================================================
// Repository Trait
// ============================================================================

#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub account_id: Uuid,
    pub plan_code: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub features: Vec<String>,
    pub max_jobs: i32,
    pub max_candidates: i32,
    pub is_active: bool,
}

#[async_trait]
pub trait SubscriptionRepoTrait: Send + Sync {
    async fn get_by_account(&self, account_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Create the account's subscription or replace its plan fields and
    /// period. One subscription row per account.
    async fn upsert(&self, input: &UpsertSubscription) -> AppResult<Subscription>;

    async fn set_active(&self, account_id: Uuid, is_active: bool) -> AppResult<()>;
}

// ============================================================================
// Subscription Activator
// ============================================================================

/// Computes and persists entitlements once a payment completes.
pub struct SubscriptionActivator {
    subscription_repo: Arc<dyn SubscriptionRepoTrait>,
    account_repo: Arc<dyn AccountRepoTrait>,
    outbox: Arc<dyn NotificationOutboxTrait>,
    catalog: PlanCatalog,
}

impl SubscriptionActivator {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepoTrait>,
        account_repo: Arc<dyn AccountRepoTrait>,
        outbox: Arc<dyn NotificationOutboxTrait>,
        catalog: PlanCatalog,
    ) -> Self {
        Self {
            subscription_repo,
            account_repo,
            outbox,
            catalog,
        }
    }

    /// Create or renew the account's subscription from the plan template.
    ///
    /// Renewal extends from `max(now, current end date)`, so remaining time
    /// is never shortened and an expired subscription restarts from now.
    pub async fn activate(&self, account_id: Uuid, plan_code: &str) -> AppResult<Subscription> {
        let template = self
            .catalog
            .resolve(plan_code)
            .ok_or_else(|| AppError::Validation(format!("unknown plan: {}", plan_code)))?;

        let now = Utc::now();
        let current = self.subscription_repo.get_by_account(account_id).await?;

        let (start_date, end_date) = match &current {
            Some(sub) => {
                let base = if sub.end_date > now { sub.end_date } else { now };
                (sub.start_date, base + Duration::days(template.duration_days))
            }
            None => (now, now + Duration::days(template.duration_days)),
        };

        let subscription = self
            .subscription_repo
            .upsert(&UpsertSubscription {
                account_id,
                plan_code: template.code.to_string(),
                start_date,
                end_date,
                features: template.features.iter().map(|f| f.to_string()).collect(),
                max_jobs: template.max_jobs,
                max_candidates: template.max_candidates,
                is_active: true,
            })
            .await?;

        tracing::info!(
            account_id = %account_id,
            plan = template.code,
            end_date = %subscription.end_date,
            "Subscription activated"
        );

        if let Some(account) = self.account_repo.get_by_id(account_id).await? {
            self.outbox
                .enqueue(&NewNotification {
                    kind: NotificationKind::SubscriptionActivated,
                    recipient_email: account.email,
                    payload: serde_json::json!({
                        "account_id": account_id,
                        "plan_code": template.code,
                        "end_date": subscription.end_date,
                    }),
                })
                .await?;
        }

        Ok(subscription)
    }

    /// Immediate entitlement revocation, used when a completed payment is
    /// refunded.
    pub async fn revoke(&self, account_id: Uuid) -> AppResult<()> {
        self.subscription_repo.set_active(account_id, false).await?;

        tracing::info!(account_id = %account_id, "Entitlement revoked");

        if let Some(account) = self.account_repo.get_by_id(account_id).await? {
            self.outbox
                .enqueue(&NewNotification {
                    kind: NotificationKind::EntitlementRevoked,
                    recipient_email: account.email,
                    payload: serde_json::json!({ "account_id": account_id }),
                })
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_utils::{
        InMemoryAccountRepo, InMemoryOutbox, InMemorySubscriptionRepo, create_test_account,
        create_test_subscription,
    };

    struct Fixture {
        activator: SubscriptionActivator,
        subscriptions: Arc<InMemorySubscriptionRepo>,
        outbox: Arc<InMemoryOutbox>,
    }

    fn fixture(accounts: Vec<crate::domain::entities::account::Account>) -> Fixture {
        let subscriptions = Arc::new(InMemorySubscriptionRepo::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let activator = SubscriptionActivator::new(
            subscriptions.clone(),
            Arc::new(InMemoryAccountRepo::with_accounts(accounts)),
            outbox.clone(),
            crate::domain::entities::plan::PlanCatalog,
        );
        Fixture {
            activator,
            subscriptions,
            outbox,
        }
    }

    fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
        assert!((actual - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn fresh_activation_runs_from_now() {
        let account = create_test_account(|_| {});
        let account_id = account.id;
        let f = fixture(vec![account]);

        let sub = f.activator.activate(account_id, "premium").await.unwrap();

        let now = Utc::now();
        assert_close(sub.start_date, now);
        assert_close(sub.end_date, now + Duration::days(365));
        assert!(sub.is_active);
        assert_eq!(sub.max_jobs, 25);
        assert_eq!(
            f.outbox.count_of(crate::domain::entities::notification::NotificationKind::SubscriptionActivated),
            1
        );
    }

    #[tokio::test]
    async fn renewal_preserves_remaining_time() {
        let account = create_test_account(|_| {});
        let account_id = account.id;
        let f = fixture(vec![account]);

        let current_end = Utc::now() + Duration::days(10);
        let original_start = Utc::now() - Duration::days(20);
        let current = create_test_subscription(account_id, |s| {
            s.plan_code = "premium-monthly".into();
            s.start_date = original_start;
            s.end_date = current_end;
        });
        f.subscriptions
            .subscriptions
            .lock()
            .unwrap()
            .insert(account_id, current);

        let sub = f
            .activator
            .activate(account_id, "premium-monthly")
            .await
            .unwrap();

        assert_close(sub.end_date, current_end + Duration::days(30));
        assert_eq!(sub.start_date, original_start);
    }

    #[tokio::test]
    async fn expired_renewal_restarts_from_now() {
        let account = create_test_account(|_| {});
        let account_id = account.id;
        let f = fixture(vec![account]);

        let current = create_test_subscription(account_id, |s| {
            s.end_date = Utc::now() - Duration::days(90);
        });
        f.subscriptions
            .subscriptions
            .lock()
            .unwrap()
            .insert(account_id, current);

        let sub = f.activator.activate(account_id, "basic").await.unwrap();

        assert_close(sub.end_date, Utc::now() + Duration::days(30));
    }

    #[tokio::test]
    async fn unknown_plan_is_a_validation_error() {
        let f = fixture(vec![]);
        let result = f.activator.activate(Uuid::new_v4(), "gold").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn revoke_deactivates_without_deleting() {
        let account = create_test_account(|_| {});
        let account_id = account.id;
        let f = fixture(vec![account]);
        f.subscriptions
            .subscriptions
            .lock()
            .unwrap()
            .insert(account_id, create_test_subscription(account_id, |_| {}));

        f.activator.revoke(account_id).await.unwrap();

        let sub = f.subscriptions.subscriptions.lock().unwrap()[&account_id].clone();
        assert!(!sub.is_active);
        assert!(sub.end_date > Utc::now());
    }
}
