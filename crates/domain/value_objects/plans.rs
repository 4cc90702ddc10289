use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::plans::PlanEntity,
    value_objects::{enums::currencies::Currency, money::format_minor},
};

/// Ceiling written onto the tenant when a plan limit is `0` (unlimited).
pub const UNLIMITED_SENTINEL: i32 = 999_999;

/// Plan limits as copied onto the tenant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPlanLimits {
    pub plan_slug: String,
    pub max_projects: i32,
    pub max_users: i32,
}

impl TenantPlanLimits {
    pub fn from_plan(plan: &PlanEntity) -> Self {
        Self {
            plan_slug: plan.slug.clone(),
            max_projects: concrete_limit(plan.max_projects),
            max_users: concrete_limit(plan.max_users),
        }
    }
}

fn concrete_limit(limit: i32) -> i32 {
    if limit <= 0 { UNLIMITED_SENTINEL } else { limit }
}

#[derive(Debug, Serialize)]
pub struct PlanPriceDto {
    pub monthly: String,
    pub yearly: String,
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct PlanDto {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price_monthly_brl: Option<String>,
    pub price_yearly_brl: Option<String>,
    pub price_monthly_usd: Option<String>,
    pub price_yearly_usd: Option<String>,
    pub currency: String,
    pub max_projects: i32,
    pub max_users: i32,
    pub max_storage_gb: i32,
    pub features: Vec<String>,
    pub is_featured: bool,
    pub trial_days: i32,
    pub display_order: i32,
    /// Price for the caller's billing country.
    pub price: Option<PlanPriceDto>,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            slug: value.slug,
            name: value.name,
            description: value.description,
            price_monthly_brl: value.price_monthly_brl_minor.map(format_minor),
            price_yearly_brl: value.price_yearly_brl_minor.map(format_minor),
            price_monthly_usd: value.price_monthly_usd_minor.map(format_minor),
            price_yearly_usd: value.price_yearly_usd_minor.map(format_minor),
            currency: value.currency,
            max_projects: value.max_projects,
            max_users: value.max_users,
            max_storage_gb: value.max_storage_gb,
            features: value.features,
            is_featured: value.is_featured,
            trial_days: value.trial_days,
            display_order: value.display_order,
            price: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(max_projects: i32, max_users: i32) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            slug: "essential".to_string(),
            name: "Essential".to_string(),
            description: None,
            price_monthly_brl_minor: Some(19_700),
            price_yearly_brl_minor: None,
            price_monthly_usd_minor: None,
            price_yearly_usd_minor: None,
            currency: "BRL".to_string(),
            max_projects,
            max_users,
            max_storage_gb: 0,
            features: vec![],
            is_active: true,
            is_featured: false,
            trial_days: 0,
            display_order: 1,
        }
    }

    #[test]
    fn zero_limits_become_sentinel() {
        let limits = TenantPlanLimits::from_plan(&plan(0, 5));
        assert_eq!(limits.max_projects, UNLIMITED_SENTINEL);
        assert_eq!(limits.max_users, 5);
        assert_eq!(limits.plan_slug, "essential");
    }
}
