use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::plans;

#[derive(Debug, Clone)]
pub struct PlanEntity {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price_monthly_brl_minor: Option<i64>,
    pub price_yearly_brl_minor: Option<i64>,
    pub price_monthly_usd_minor: Option<i64>,
    pub price_yearly_usd_minor: Option<i64>,
    pub currency: String,
    pub max_projects: i32,
    pub max_users: i32,
    pub max_storage_gb: i32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub trial_days: i32,
    pub display_order: i32,
}

impl PlanEntity {
    /// A plan with no price in any currency is sold for free.
    pub fn is_free(&self) -> bool {
        [
            self.price_monthly_brl_minor,
            self.price_yearly_brl_minor,
            self.price_monthly_usd_minor,
            self.price_yearly_usd_minor,
        ]
        .iter()
        .all(|price| price.unwrap_or(0) == 0)
    }
}

/// Raw row used for Diesel queries. Features stay as JSON and are parsed into a list.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price_monthly_brl_minor: Option<i64>,
    pub price_yearly_brl_minor: Option<i64>,
    pub price_monthly_usd_minor: Option<i64>,
    pub price_yearly_usd_minor: Option<i64>,
    pub currency: String,
    pub max_projects: i32,
    pub max_users: i32,
    pub max_storage_gb: i32,
    pub features: serde_json::Value,
    pub is_active: bool,
    pub is_featured: bool,
    pub trial_days: i32,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanEntity {
    fn from(value: PlanRow) -> Self {
        let features = serde_json::from_value(value.features).unwrap_or_default();

        Self {
            id: value.id,
            slug: value.slug,
            name: value.name,
            description: value.description,
            price_monthly_brl_minor: value.price_monthly_brl_minor,
            price_yearly_brl_minor: value.price_yearly_brl_minor,
            price_monthly_usd_minor: value.price_monthly_usd_minor,
            price_yearly_usd_minor: value.price_yearly_usd_minor,
            currency: value.currency,
            max_projects: value.max_projects,
            max_users: value.max_users,
            max_storage_gb: value.max_storage_gb,
            features,
            is_active: value.is_active,
            is_featured: value.is_featured,
            trial_days: value.trial_days,
            display_order: value.display_order,
        }
    }
}
