use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        GatewayNotification, IntentRequest, IntentResult, PaymentGatewayPort,
    },
    domain::entities::{gateway::PaymentGateway, payment_status::PaymentStatus},
    infra::config::Environment,
};

const API_BASE: &str = "https://api.mercadopago.com";

/// Card checkout via Mercado Pago preferences. The payment id travels as
/// `external_reference` and comes back in webhooks and redirects.
pub struct MercadoPagoClient {
    client: reqwest::Client,
    access_token: SecretString,
    environment: Environment,
}

#[derive(Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: Option<String>,
    sandbox_init_point: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(
        access_token: SecretString,
        environment: Environment,
        timeout: Duration,
    ) -> AppResult<Self> {
        if access_token.expose_secret().trim().is_empty() {
            return Err(AppError::Internal(
                "Mercado Pago access token is not configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            access_token,
            environment,
        })
    }

    fn redirect_from(&self, preference: &PreferenceResponse) -> Option<String> {
        match self.environment {
            Environment::Sandbox => preference
                .sandbox_init_point
                .clone()
                .or_else(|| preference.init_point.clone()),
            Environment::Production => preference.init_point.clone(),
        }
    }
}

#[async_trait]
impl PaymentGatewayPort for MercadoPagoClient {
    fn gateway(&self) -> PaymentGateway {
        PaymentGateway::MercadoPago
    }

    async fn create_intent(&self, req: &IntentRequest) -> AppResult<IntentResult> {
        let body = json!({
            "items": [{
                "title": req.plan_name,
                "quantity": 1,
                "currency_id": req.currency,
                "unit_price": req.amount_cents as f64 / 100.0,
            }],
            "payer": req.payer_email.as_ref().map(|email| json!({ "email": email })),
            "external_reference": req.payment_id.to_string(),
            "payment_methods": { "installments": req.installments },
            "back_urls": {
                "success": req.redirect_urls.success,
                "failure": req.redirect_urls.failure,
                "pending": req.redirect_urls.pending,
            },
            "auto_return": "approved",
        });

        let response = self
            .client
            .post(format!("{API_BASE}/checkout/preferences"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AppError::gateway_retryable("Mercado Pago is unreachable")
                } else {
                    AppError::gateway_retryable(format!("Mercado Pago request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                detail = %detail,
                "Mercado Pago rejected preference creation"
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AppError::gateway_rejected("Mercado Pago rejected the credentials")
                }
                s if s.is_client_error() => {
                    AppError::gateway_rejected(format!("Mercado Pago rejected the request: {s}"))
                }
                s => AppError::gateway_retryable(format!("Mercado Pago returned {s}")),
            });
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| AppError::gateway_retryable(format!("Malformed preference response: {e}")))?;

        let redirect_url = self.redirect_from(&preference).ok_or_else(|| {
            AppError::gateway_retryable("Preference response carried no checkout URL")
        })?;

        Ok(IntentResult {
            provider_reference: preference.id,
            redirect_url,
        })
    }

    fn normalize_status(&self, provider_status: &str) -> PaymentStatus {
        match provider_status {
            "approved" => PaymentStatus::Completed,
            "pending" => PaymentStatus::Pending,
            "authorized" | "in_process" | "in_mediation" => PaymentStatus::Processing,
            "rejected" => PaymentStatus::Failed,
            "cancelled" | "expired" => PaymentStatus::Cancelled,
            "refunded" | "charged_back" => PaymentStatus::Refunded,
            other => {
                tracing::warn!(provider_status = %other, "Unknown Mercado Pago status");
                PaymentStatus::Pending
            }
        }
    }

    fn parse_notification(&self, payload: &JsonValue) -> Option<GatewayNotification> {
        // Topic notifications ("type": "payment") carry the payment resource
        // under "data"; anything else is a ping or an unrelated topic.
        if payload.get("type").and_then(JsonValue::as_str) != Some("payment") {
            return None;
        }
        let data = payload.get("data")?;
        let provider_status = data.get("status")?.as_str()?.to_string();
        let external_reference = data
            .get("external_reference")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let provider_reference = match data.get("id") {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Some(GatewayNotification {
            external_reference,
            provider_reference,
            provider_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MercadoPagoClient {
        MercadoPagoClient::new(
            SecretString::new("TEST-token".into()),
            Environment::Sandbox,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn empty_token_is_rejected_at_construction() {
        let result = MercadoPagoClient::new(
            SecretString::new("  ".into()),
            Environment::Sandbox,
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn status_table_covers_known_vocabulary() {
        let c = client();
        assert_eq!(c.normalize_status("approved"), PaymentStatus::Completed);
        assert_eq!(c.normalize_status("pending"), PaymentStatus::Pending);
        assert_eq!(c.normalize_status("authorized"), PaymentStatus::Processing);
        assert_eq!(c.normalize_status("in_process"), PaymentStatus::Processing);
        assert_eq!(c.normalize_status("in_mediation"), PaymentStatus::Processing);
        assert_eq!(c.normalize_status("rejected"), PaymentStatus::Failed);
        assert_eq!(c.normalize_status("cancelled"), PaymentStatus::Cancelled);
        assert_eq!(c.normalize_status("expired"), PaymentStatus::Cancelled);
        assert_eq!(c.normalize_status("refunded"), PaymentStatus::Refunded);
        assert_eq!(c.normalize_status("charged_back"), PaymentStatus::Refunded);
    }

    #[test]
    fn unknown_status_maps_to_pending() {
        assert_eq!(
            client().normalize_status("some_future_state"),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn payment_notification_is_parsed() {
        let payload = serde_json::json!({
            "type": "payment",
            "action": "payment.updated",
            "data": {
                "id": 1234567,
                "status": "approved",
                "external_reference": "5f64a4c7-9155-4cbe-b6f5-1f0a4b1d2c3e",
            }
        });
        let n = client().parse_notification(&payload).unwrap();
        assert_eq!(
            n.external_reference.as_deref(),
            Some("5f64a4c7-9155-4cbe-b6f5-1f0a4b1d2c3e")
        );
        assert_eq!(n.provider_reference.as_deref(), Some("1234567"));
        assert_eq!(n.provider_status, "approved");
    }

    #[test]
    fn non_payment_topics_are_skipped() {
        let payload = serde_json::json!({ "type": "test", "data": { "id": 1 } });
        assert!(client().parse_notification(&payload).is_none());
    }
}
