pub mod billing_cycles;
pub mod card_brands;
pub mod currencies;
pub mod gateways;
pub mod invoice_statuses;
pub mod payment_method_types;
pub mod payment_statuses;
pub mod subscription_statuses;
