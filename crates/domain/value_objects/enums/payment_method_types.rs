use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    Boleto,
    Pix,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "card",
            PaymentMethodType::Boleto => "boleto",
            PaymentMethodType::Pix => "pix",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "card" | "credit_card" => Some(PaymentMethodType::Card),
            "boleto" => Some(PaymentMethodType::Boleto),
            "pix" => Some(PaymentMethodType::Pix),
            _ => None,
        }
    }
}

impl Display for PaymentMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
