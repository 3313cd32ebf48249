use serde::{Deserialize, Serialize};

/// External payment processor that handled a purchase intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_gateway", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    MercadoPago,
    OpenPix,
}

impl PaymentGateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentGateway::MercadoPago => "mercado_pago",
            PaymentGateway::OpenPix => "openpix",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentGateway::MercadoPago => "Mercado Pago",
            PaymentGateway::OpenPix => "OpenPix",
        }
    }

    pub fn from_path_segment(s: &str) -> Option<Self> {
        match s {
            "mercadopago" | "mercado_pago" => Some(PaymentGateway::MercadoPago),
            "openpix" => Some(PaymentGateway::OpenPix),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment-method family requested by the caller. Each family is routed to
/// the gateway that handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodFamily {
    Card,
    InstantTransfer,
}

impl PaymentMethodFamily {
    pub fn gateway(&self) -> PaymentGateway {
        match self {
            PaymentMethodFamily::Card => PaymentGateway::MercadoPago,
            PaymentMethodFamily::InstantTransfer => PaymentGateway::OpenPix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_family_routes_to_gateway() {
        assert_eq!(PaymentMethodFamily::Card.gateway(), PaymentGateway::MercadoPago);
        assert_eq!(
            PaymentMethodFamily::InstantTransfer.gateway(),
            PaymentGateway::OpenPix
        );
    }

    #[test]
    fn path_segment_parsing() {
        assert_eq!(
            PaymentGateway::from_path_segment("mercadopago"),
            Some(PaymentGateway::MercadoPago)
        );
        assert_eq!(
            PaymentGateway::from_path_segment("openpix"),
            Some(PaymentGateway::OpenPix)
        );
        assert_eq!(PaymentGateway::from_path_segment("stripe"), None);
    }
}
