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

/// Pix instant-transfer checkout via OpenPix charges. The payment id travels
/// as `correlationID` and comes back in webhooks.
pub struct OpenPixClient {
    client: reqwest::Client,
    app_id: SecretString,
    base_url: &'static str,
}

#[derive(Deserialize)]
struct ChargeEnvelope {
    charge: Charge,
}

#[derive(Deserialize)]
struct Charge {
    identifier: Option<String>,
    #[serde(rename = "correlationID")]
    correlation_id: Option<String>,
    #[serde(rename = "paymentLinkUrl")]
    payment_link_url: Option<String>,
}

impl OpenPixClient {
    pub fn new(
        app_id: SecretString,
        environment: Environment,
        timeout: Duration,
    ) -> AppResult<Self> {
        if app_id.expose_secret().trim().is_empty() {
            return Err(AppError::Internal(
                "OpenPix app id is not configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        let base_url = match environment {
            Environment::Sandbox => "https://api.sandbox.openpix.com.br",
            Environment::Production => "https://api.openpix.com.br",
        };
        Ok(Self {
            client,
            app_id,
            base_url,
        })
    }
}

#[async_trait]
impl PaymentGatewayPort for OpenPixClient {
    fn gateway(&self) -> PaymentGateway {
        PaymentGateway::OpenPix
    }

    async fn create_intent(&self, req: &IntentRequest) -> AppResult<IntentResult> {
        let body = json!({
            "correlationID": req.payment_id.to_string(),
            "value": req.amount_cents,
            "comment": req.plan_name,
            "customer": req.payer_email.as_ref().map(|email| json!({ "email": email })),
        });

        let response = self
            .client
            .post(format!("{}/api/v1/charge", self.base_url))
            .header("Authorization", self.app_id.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AppError::gateway_retryable("OpenPix is unreachable")
                } else {
                    AppError::gateway_retryable(format!("OpenPix request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, detail = %detail, "OpenPix rejected charge creation");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AppError::gateway_rejected("OpenPix rejected the credentials")
                }
                s if s.is_client_error() => {
                    AppError::gateway_rejected(format!("OpenPix rejected the request: {s}"))
                }
                s => AppError::gateway_retryable(format!("OpenPix returned {s}")),
            });
        }

        let envelope: ChargeEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::gateway_retryable(format!("Malformed charge response: {e}")))?;

        let provider_reference = envelope
            .charge
            .identifier
            .or(envelope.charge.correlation_id)
            .ok_or_else(|| AppError::gateway_retryable("Charge response carried no identifier"))?;
        let redirect_url = envelope
            .charge
            .payment_link_url
            .ok_or_else(|| AppError::gateway_retryable("Charge response carried no payment link"))?;

        Ok(IntentResult {
            provider_reference,
            redirect_url,
        })
    }

    fn normalize_status(&self, provider_status: &str) -> PaymentStatus {
        match provider_status {
            "ACTIVE" => PaymentStatus::Pending,
            "COMPLETED" => PaymentStatus::Completed,
            "EXPIRED" => PaymentStatus::Cancelled,
            "ERROR" => PaymentStatus::Failed,
            "REFUNDED" => PaymentStatus::Refunded,
            other => {
                tracing::warn!(provider_status = %other, "Unknown OpenPix status");
                PaymentStatus::Pending
            }
        }
    }

    fn parse_notification(&self, payload: &JsonValue) -> Option<GatewayNotification> {
        // Charge events carry the charge object; connectivity test events
        // ("evento" pings) do not and are skipped.
        let charge = payload.get("charge")?;
        let provider_status = charge.get("status")?.as_str()?.to_string();
        let external_reference = charge
            .get("correlationID")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let provider_reference = charge
            .get("identifier")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
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

    fn client() -> OpenPixClient {
        OpenPixClient::new(
            SecretString::new("app-id".into()),
            Environment::Sandbox,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn empty_app_id_is_rejected_at_construction() {
        let result = OpenPixClient::new(
            SecretString::new("".into()),
            Environment::Sandbox,
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn status_table_covers_known_vocabulary() {
        let c = client();
        assert_eq!(c.normalize_status("ACTIVE"), PaymentStatus::Pending);
        assert_eq!(c.normalize_status("COMPLETED"), PaymentStatus::Completed);
        assert_eq!(c.normalize_status("EXPIRED"), PaymentStatus::Cancelled);
        assert_eq!(c.normalize_status("ERROR"), PaymentStatus::Failed);
        assert_eq!(c.normalize_status("REFUNDED"), PaymentStatus::Refunded);
        assert_eq!(c.normalize_status("WHO_KNOWS"), PaymentStatus::Pending);
    }

    #[test]
    fn charge_event_is_parsed() {
        let payload = serde_json::json!({
            "event": "OPENPIX:CHARGE_COMPLETED",
            "charge": {
                "correlationID": "8c5a1b9e-3d2f-4a6b-8c7d-9e0f1a2b3c4d",
                "identifier": "charge_abc123",
                "status": "COMPLETED",
            }
        });
        let n = client().parse_notification(&payload).unwrap();
        assert_eq!(
            n.external_reference.as_deref(),
            Some("8c5a1b9e-3d2f-4a6b-8c7d-9e0f1a2b3c4d")
        );
        assert_eq!(n.provider_reference.as_deref(), Some("charge_abc123"));
        assert_eq!(n.provider_status, "COMPLETED");
    }

    #[test]
    fn connectivity_ping_is_skipped() {
        let payload = serde_json::json!({ "evento": "teste_webhook" });
        assert!(client().parse_notification(&payload).is_none());
    }
}
