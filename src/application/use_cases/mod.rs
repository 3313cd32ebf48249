pub mod access;
pub mod activation;
pub mod checkout;
pub mod outbox;
pub mod provisioning;
pub mod reconciler;
