use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Stripe,
    Asaas,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Stripe => "stripe",
            GatewayKind::Asaas => "asaas",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "stripe" => Some(GatewayKind::Stripe),
            "asaas" => Some(GatewayKind::Asaas),
            _ => None,
        }
    }

    /// Default gateway for a tenant that has not registered a payment method yet.
    pub fn for_country(country: &str) -> Self {
        if country.trim().eq_ignore_ascii_case("BR") {
            GatewayKind::Asaas
        } else {
            GatewayKind::Stripe
        }
    }
}

impl Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
