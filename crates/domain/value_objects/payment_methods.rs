use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::payment_methods::PaymentMethodEntity;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentMethodModel {
    /// Frontend-obtained gateway token.
    pub token: String,
    #[serde(default = "default_method_type")]
    pub method_type: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub billing_details: Option<serde_json::Value>,
}

fn default_method_type() -> String {
    "card".to_string()
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodDto {
    pub id: Uuid,
    pub method_type: String,
    pub gateway: String,
    pub is_default: bool,
    pub is_active: bool,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub card_exp_month: Option<i32>,
    pub card_exp_year: Option<i32>,
    pub billing_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentMethodEntity> for PaymentMethodDto {
    fn from(value: PaymentMethodEntity) -> Self {
        Self {
            id: value.id,
            method_type: value.method_type,
            gateway: value.gateway,
            is_default: value.is_default,
            is_active: value.is_active,
            card_last4: value.card_last4,
            card_brand: value.card_brand,
            card_exp_month: value.card_exp_month,
            card_exp_year: value.card_exp_year,
            billing_details: value.billing_details,
            created_at: value.created_at,
        }
    }
}
