pub mod asaas_client;
pub mod gateway;
pub mod stripe_client;
