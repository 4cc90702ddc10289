use crates::domain::{
    entities::plans::PlanEntity,
    value_objects::{
        enums::{billing_cycles::BillingCycle, currencies::Currency},
        money::Money,
    },
};

/// Country whose tenants are billed in BRL. Every other country falls back to USD.
const BRL_COUNTRY: &str = "BR";

/// Price of `plan` for a tenant billed in `country`. A missing price field resolves to zero;
/// callers decide whether zero means "free" or "not sold here".
pub fn price_for(plan: &PlanEntity, country: &str, cycle: BillingCycle) -> Money {
    let (amount, currency) = if country.trim().eq_ignore_ascii_case(BRL_COUNTRY) {
        let amount = match cycle {
            BillingCycle::Monthly => plan.price_monthly_brl_minor,
            BillingCycle::Yearly => plan.price_yearly_brl_minor,
        };
        (amount, Currency::Brl)
    } else {
        let amount = match cycle {
            BillingCycle::Monthly => plan.price_monthly_usd_minor,
            BillingCycle::Yearly => plan.price_yearly_usd_minor,
        };
        (amount, Currency::Usd)
    };

    Money::new(amount.unwrap_or(0), currency)
}

/// Day-prorated difference between two monthly prices, rounded half-up to the minor unit.
///
/// The monthly rate is used whatever the subscription's cycle is.
pub fn prorate_upgrade(
    old_monthly_minor: i64,
    new_monthly_minor: i64,
    days_used: i64,
    total_days: i64,
) -> i64 {
    if total_days <= 0 {
        return 0;
    }

    let days_used = days_used.clamp(0, total_days) as i128;
    let total = total_days as i128;
    let numerator = (new_monthly_minor - old_monthly_minor) as i128 * days_used;

    let rounded = if numerator >= 0 {
        (numerator * 2 + total) / (2 * total)
    } else {
        -((-numerator * 2 + total) / (2 * total))
    };

    rounded as i64
}
