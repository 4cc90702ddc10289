pub mod invoices;
pub mod payment_methods;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod tenants;
