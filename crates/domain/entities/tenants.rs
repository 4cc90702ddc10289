use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{currencies::Currency, gateways::GatewayKind},
    infra::db::postgres::schema::tenants,
};

/// Tenant record owned by the identity module. Billing reads it and only writes the
/// gateway customer references and the plan limits.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = tenants)]
pub struct TenantEntity {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: String,
    pub currency: String,
    pub stripe_customer_id: Option<String>,
    pub asaas_customer_id: Option<String>,
    pub subscription_plan: Option<String>,
    pub max_projects: i32,
    pub max_users: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantEntity {
    pub fn customer_id_for(&self, gateway: GatewayKind) -> Option<&str> {
        match gateway {
            GatewayKind::Stripe => self.stripe_customer_id.as_deref(),
            GatewayKind::Asaas => self.asaas_customer_id.as_deref(),
        }
    }

    pub fn billing_country(&self) -> &str {
        self.country.trim()
    }

    pub fn default_currency(&self) -> Option<Currency> {
        Currency::from_str(&self.currency)
    }
}
