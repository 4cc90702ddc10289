pub mod invoices;
pub mod payment_methods;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod webhooks;

use std::sync::Arc;

use anyhow::Result;
use crates::{
    domain::repositories::{
        invoices::InvoiceRepository, payment_methods::PaymentMethodRepository,
        payments::PaymentRepository, plans::PlanRepository,
        subscriptions::SubscriptionRepository, tenants::TenantRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            invoices::InvoicePostgres, payment_methods::PaymentMethodPostgres,
            payments::PaymentPostgres, plans::PlanPostgres, subscriptions::SubscriptionPostgres,
            tenants::TenantPostgres,
        },
    },
    payments::{
        asaas_client::AsaasClient, gateway::PaymentGateways, stripe_client::StripeClient,
    },
};

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::{
        invoices::InvoiceGenerator, payment_methods::PaymentMethodUseCase,
        payments::PaymentProcessor, subscriptions::SubscriptionLifecycle,
        webhooks::WebhookReconciler,
    },
};

/// Every billing use case, wired once over a shared pool and gateway set.
pub struct BillingUseCases {
    pub subscriptions: Arc<SubscriptionLifecycle>,
    pub invoices: Arc<InvoiceGenerator>,
    pub payments: Arc<PaymentProcessor>,
    pub payment_methods: Arc<PaymentMethodUseCase>,
    pub webhooks: Arc<WebhookReconciler>,
}

impl BillingUseCases {
    pub fn build(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Self> {
        let gateways = PaymentGateways::new(
            Arc::new(StripeClient::new(config.stripe.clone())?),
            Arc::new(AsaasClient::new(config.asaas.clone())?),
        );

        let tenant_repo: Arc<dyn TenantRepository + Send + Sync> =
            Arc::new(TenantPostgres::new(Arc::clone(&db_pool)));
        let plan_repo: Arc<dyn PlanRepository + Send + Sync> =
            Arc::new(PlanPostgres::new(Arc::clone(&db_pool)));
        let subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync> =
            Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
        let invoice_repo: Arc<dyn InvoiceRepository + Send + Sync> =
            Arc::new(InvoicePostgres::new(Arc::clone(&db_pool)));
        let payment_repo: Arc<dyn PaymentRepository + Send + Sync> =
            Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
        let payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync> =
            Arc::new(PaymentMethodPostgres::new(Arc::clone(&db_pool)));

        let invoices = Arc::new(InvoiceGenerator::new(
            Arc::clone(&invoice_repo),
            Arc::clone(&plan_repo),
            Arc::clone(&tenant_repo),
        ));
        let payments = Arc::new(PaymentProcessor::new(
            Arc::clone(&payment_repo),
            Arc::clone(&payment_method_repo),
            Arc::clone(&subscription_repo),
            Arc::clone(&tenant_repo),
            Arc::clone(&invoice_repo),
            gateways.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionLifecycle::new(
            plan_repo,
            Arc::clone(&subscription_repo),
            Arc::clone(&tenant_repo),
            Arc::clone(&payment_method_repo),
            Arc::clone(&invoices),
            Arc::clone(&payments),
            gateways.clone(),
        ));
        let payment_methods = Arc::new(PaymentMethodUseCase::new(
            payment_method_repo,
            tenant_repo,
            subscription_repo,
            gateways.clone(),
        ));
        let webhooks = Arc::new(WebhookReconciler::new(
            payment_repo,
            invoice_repo,
            Arc::clone(&payments),
            gateways,
        ));

        Ok(Self {
            subscriptions,
            invoices,
            payments,
            payment_methods,
            webhooks,
        })
    }
}
