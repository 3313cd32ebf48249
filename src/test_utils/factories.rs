//! Test data factories. Each factory produces a valid default fixture and
//! takes a customizer closure for the fields a test cares about.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    account::Account,
    gateway::PaymentGateway,
    payment::{Payment, PaymentParty, UserType},
    payment_status::PaymentStatus,
    subscription::Subscription,
};

pub fn create_test_account(customize: impl FnOnce(&mut Account)) -> Account {
    let id = Uuid::new_v4();
    let mut account = Account {
        id,
        email: format!("user-{}@example.com", id.simple()),
        name: "Test User".to_string(),
        user_type: UserType::Candidate,
        credential_digest: "test-digest".to_string(),
        profile_complete: true,
        is_admin: false,
        created_at: Utc::now(),
    };
    customize(&mut account);
    account
}

pub fn create_test_payment(customize: impl FnOnce(&mut Payment)) -> Payment {
    let now = Utc::now();
    let mut payment = Payment {
        id: Uuid::new_v4(),
        amount_cents: 5_500,
        currency: "BRL".to_string(),
        status: PaymentStatus::Pending,
        plan_code: "premium".to_string(),
        gateway: PaymentGateway::MercadoPago,
        provider_reference: None,
        party: PaymentParty::Account {
            account_id: Uuid::new_v4(),
        },
        installments: 1,
        create_account_after_payment: false,
        created_at: now,
        updated_at: now,
    };
    customize(&mut payment);
    payment
}

pub fn create_test_subscription(
    account_id: Uuid,
    customize: impl FnOnce(&mut Subscription),
) -> Subscription {
    let now = Utc::now();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        account_id,
        plan_code: "premium".to_string(),
        start_date: now,
        end_date: now + Duration::days(365),
        features: vec!["job_posting".to_string(), "candidate_search".to_string()],
        max_jobs: 25,
        max_candidates: 1_000,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    customize(&mut subscription);
    subscription
}
