use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::use_cases::activation::SubscriptionRepoTrait,
    domain::entities::subscription::Subscription,
};

/// A principal asking for access to a protected feature.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub account_id: Uuid,
    pub is_admin: bool,
}

/// Read-only entitlement check consulted by protected feature code.
/// Performs no writes; safe to call concurrently and frequently.
pub struct AccessGate {
    subscription_repo: Arc<dyn SubscriptionRepoTrait>,
}

impl AccessGate {
    pub fn new(subscription_repo: Arc<dyn SubscriptionRepoTrait>) -> Self {
        Self { subscription_repo }
    }

    /// Grants iff an active, unexpired subscription exists. Administrative
    /// principals bypass the check unconditionally.
    pub async fn check(&self, principal: &Principal) -> AppResult<bool> {
        if principal.is_admin {
            return Ok(true);
        }

        let subscription = self
            .subscription_repo
            .get_by_account(principal.account_id)
            .await?;

        Ok(subscription
            .map(|s| s.is_currently_entitled(Utc::now()))
            .unwrap_or(false))
    }

    pub async fn current_subscription(
        &self,
        account_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        self.subscription_repo.get_by_account(account_id).await
    }
}
