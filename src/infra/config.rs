use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

/// Which processor environment credentials and redirect targets belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Sandbox,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }
}

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Public origin used to build processor redirect targets.
    pub base_url: Url,
    pub environment: Environment,
    pub jwt_secret: SecretString,
    pub cors_origin: HeaderValue,
    pub mercadopago_access_token: SecretString,
    pub openpix_app_id: SecretString,
    /// Bound on every outbound processor call.
    pub gateway_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let base_url: Url = get_env("BASE_URL");
        let environment = Environment::from_str(&get_env_default::<String>(
            "PAYMENT_ENVIRONMENT",
            "sandbox".to_string(),
        ));
        let jwt_secret = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let mercadopago_access_token =
            SecretString::new(get_env::<String>("MERCADOPAGO_ACCESS_TOKEN").into());
        let openpix_app_id = SecretString::new(get_env::<String>("OPENPIX_APP_ID").into());
        let gateway_timeout_secs: u64 = get_env_default("GATEWAY_TIMEOUT_SECS", 10);

        // A production deployment redirecting buyers to a development host
        // would silently strand every checkout.
        if environment == Environment::Production {
            let host = base_url.host_str().unwrap_or("");
            assert!(
                !matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0"),
                "BASE_URL must not point at a development host in production"
            );
        }

        Self {
            bind_addr,
            database_url,
            base_url,
            environment,
            jwt_secret,
            cors_origin,
            mercadopago_access_token,
            openpix_app_id,
            gateway_timeout_secs,
        }
    }
}
