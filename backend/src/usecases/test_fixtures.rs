use chrono::{Duration, NaiveDate, Utc};
use crates::domain::entities::{
    invoices::InvoiceEntity, payment_methods::PaymentMethodEntity, payments::PaymentEntity,
    plans::PlanEntity, subscriptions::SubscriptionEntity, tenants::TenantEntity,
};
use serde_json::json;
use uuid::Uuid;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn sample_tenant(country: &str) -> TenantEntity {
    let now = Utc::now();
    TenantEntity {
        id: Uuid::new_v4(),
        name: "Acme Ltda".to_string(),
        slug: "acme".to_string(),
        email: "billing@acme.test".to_string(),
        phone: None,
        country: country.to_string(),
        currency: if country == "BR" { "BRL" } else { "USD" }.to_string(),
        stripe_customer_id: Some("cus_acme".to_string()),
        asaas_customer_id: Some("cus_000001".to_string()),
        subscription_plan: Some("free".to_string()),
        max_projects: 1,
        max_users: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_plan(monthly_brl_minor: Option<i64>, monthly_usd_minor: Option<i64>) -> PlanEntity {
    PlanEntity {
        id: Uuid::new_v4(),
        slug: "essential".to_string(),
        name: "Essential".to_string(),
        description: None,
        price_monthly_brl_minor: monthly_brl_minor,
        price_yearly_brl_minor: monthly_brl_minor.map(|price| price * 10),
        price_monthly_usd_minor: monthly_usd_minor,
        price_yearly_usd_minor: monthly_usd_minor.map(|price| price * 10),
        currency: "BRL".to_string(),
        max_projects: 10,
        max_users: 0,
        max_storage_gb: 5,
        features: vec!["reports".to_string()],
        is_active: true,
        is_featured: false,
        trial_days: 0,
        display_order: 1,
    }
}

/// Live subscription whose 30-day period started `days_used` days ago.
pub fn sample_subscription(tenant_id: Uuid, plan_id: Uuid, days_used: i64) -> SubscriptionEntity {
    let now = Utc::now();
    let start = today() - Duration::days(days_used);
    SubscriptionEntity {
        id: Uuid::new_v4(),
        tenant_id,
        plan_id,
        status: "active".to_string(),
        billing_cycle: "monthly".to_string(),
        current_period_start: start,
        current_period_end: start + Duration::days(30),
        trial_start: None,
        trial_end: None,
        cancel_at_period_end: false,
        canceled_at: None,
        cancellation_reason: None,
        gateway: "stripe".to_string(),
        gateway_subscription_id: None,
        gateway_customer_id: Some("cus_acme".to_string()),
        payment_method_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_invoice(tenant_id: Uuid, subscription_id: Option<Uuid>) -> InvoiceEntity {
    let now = Utc::now();
    InvoiceEntity {
        id: Uuid::new_v4(),
        tenant_id,
        subscription_id,
        invoice_number: "INV-2026-0007".to_string(),
        invoice_year: 2026,
        invoice_sequence: 7,
        amount_minor: 29_700,
        tax_amount_minor: 0,
        total_amount_minor: 29_700,
        currency: "BRL".to_string(),
        status: "open".to_string(),
        issue_date: today(),
        due_date: today() + Duration::days(30),
        paid_at: None,
        gateway_invoice_id: None,
        gateway_pdf_url: None,
        line_items: json!([]),
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_payment(invoice: &InvoiceEntity, status: &str) -> PaymentEntity {
    let now = Utc::now();
    PaymentEntity {
        id: Uuid::new_v4(),
        invoice_id: invoice.id,
        tenant_id: invoice.tenant_id,
        payment_method_id: None,
        amount_minor: invoice.total_amount_minor,
        currency: invoice.currency.clone(),
        status: status.to_string(),
        payment_method_type: "card".to_string(),
        gateway: "stripe".to_string(),
        gateway_payment_id: None,
        gateway_charge_id: None,
        failure_reason: None,
        retry_count: 0,
        max_retries: 3,
        metadata: json!({}),
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_payment_method(tenant_id: Uuid, gateway: &str) -> PaymentMethodEntity {
    let now = Utc::now();
    PaymentMethodEntity {
        id: Uuid::new_v4(),
        tenant_id,
        method_type: "card".to_string(),
        gateway: gateway.to_string(),
        gateway_payment_method_id: "pm_card_visa".to_string(),
        is_default: true,
        is_active: true,
        card_last4: Some("4242".to_string()),
        card_brand: Some("visa".to_string()),
        card_exp_month: Some(12),
        card_exp_year: Some(2030),
        billing_details: json!({}),
        created_at: now,
        updated_at: now,
    }
}
