pub mod account;
pub mod gateway;
pub mod notification;
pub mod payment;
pub mod payment_status;
pub mod plan;
pub mod subscription;
