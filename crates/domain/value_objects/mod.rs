pub mod enums;
pub mod invoices;
pub mod money;
pub mod payment_methods;
pub mod payments;
pub mod plans;
pub mod subscriptions;
