pub mod errors;
pub mod invoices;
pub mod payment_methods;
pub mod payments;
pub mod pricing;
pub mod subscriptions;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_fixtures;
