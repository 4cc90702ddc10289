use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        gateways::GatewayKind, payment_method_types::PaymentMethodType,
    },
    infra::db::postgres::schema::payment_methods,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_methods)]
pub struct PaymentMethodEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub method_type: String,
    pub gateway: String,
    pub gateway_payment_method_id: String,
    pub is_default: bool,
    pub is_active: bool,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub card_exp_month: Option<i32>,
    pub card_exp_year: Option<i32>,
    pub billing_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethodEntity {
    pub fn gateway_kind(&self) -> Option<GatewayKind> {
        GatewayKind::from_str(&self.gateway)
    }

    pub fn method_type(&self) -> PaymentMethodType {
        PaymentMethodType::from_str(&self.method_type).unwrap_or(PaymentMethodType::Card)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_methods)]
pub struct InsertPaymentMethodEntity {
    pub tenant_id: Uuid,
    pub method_type: String,
    pub gateway: String,
    pub gateway_payment_method_id: String,
    pub is_default: bool,
    pub is_active: bool,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub card_exp_month: Option<i32>,
    pub card_exp_year: Option<i32>,
    pub billing_details: serde_json::Value,
}
