use std::sync::Arc;

use crates::{
    domain::{
        entities::payment_methods::InsertPaymentMethodEntity,
        repositories::{
            payment_methods::PaymentMethodRepository, subscriptions::SubscriptionRepository,
            tenants::TenantRepository,
        },
        value_objects::{
            enums::{
                card_brands::CardBrand, payment_method_types::PaymentMethodType,
                subscription_statuses::SubscriptionStatus,
            },
            payment_methods::{CreatePaymentMethodModel, PaymentMethodDto},
            subscriptions::GatewayLinkage,
        },
    },
    payments::gateway::PaymentGateways,
};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use super::errors::{BillingError, UseCaseResult};

pub struct PaymentMethodUseCase {
    payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
    tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    gateways: PaymentGateways,
}

impl PaymentMethodUseCase {
    pub fn new(
        payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
        tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            payment_method_repo,
            tenant_repo,
            subscription_repo,
            gateways,
        }
    }

    pub async fn list_payment_methods(&self, tenant_id: Uuid) -> UseCaseResult<Vec<PaymentMethodDto>> {
        let methods = self
            .payment_method_repo
            .list_for_tenant(tenant_id)
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "payment_methods: failed to list");
                BillingError::Internal(err)
            })?;

        Ok(methods.into_iter().map(PaymentMethodDto::from).collect())
    }

    /// Registers a frontend-tokenized card with the card gateway, creating the gateway
    /// customer on first use.
    pub async fn create_payment_method(
        &self,
        tenant_id: Uuid,
        model: CreatePaymentMethodModel,
    ) -> UseCaseResult<PaymentMethodDto> {
        if model.token.trim().is_empty() {
            return Err(BillingError::validation("payment method token is required"));
        }
        if PaymentMethodType::from_str(&model.method_type) != Some(PaymentMethodType::Card) {
            return Err(BillingError::validation(
                "only card payment methods can be registered",
            ));
        }

        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant"))?;

        let gateway = self.gateways.card_registration();
        let gateway_kind = gateway.kind();

        let customer_id = match tenant.customer_id_for(gateway_kind) {
            Some(customer_id) => customer_id.to_string(),
            None => {
                let customer_id = gateway.create_customer(&tenant).await?;
                self.tenant_repo
                    .update_gateway_customer_id(tenant_id, gateway_kind, customer_id.clone())
                    .await?;
                info!(
                    %tenant_id,
                    gateway = %gateway_kind,
                    %customer_id,
                    "payment_methods: gateway customer created"
                );
                customer_id
            }
        };

        let registered = gateway
            .create_payment_method(model.token.trim(), &customer_id)
            .await?;

        let is_default =
            model.is_default || self.payment_method_repo.count_for_tenant(tenant_id).await? == 0;
        let card = registered.card.unwrap_or_default();

        let created = self
            .payment_method_repo
            .create(InsertPaymentMethodEntity {
                tenant_id,
                method_type: registered.method_type.as_str().to_string(),
                gateway: gateway_kind.as_str().to_string(),
                gateway_payment_method_id: registered.id,
                is_default,
                is_active: true,
                card_last4: card.last4,
                card_brand: card
                    .brand
                    .as_deref()
                    .and_then(CardBrand::normalize)
                    .map(|brand| brand.as_str().to_string()),
                card_exp_month: card.exp_month,
                card_exp_year: card.exp_year,
                billing_details: model.billing_details.unwrap_or_else(|| json!({})),
            })
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "payment_methods: failed to store method");
                BillingError::Internal(err)
            })?;

        info!(
            %tenant_id,
            payment_method_id = %created.id,
            is_default,
            "payment_methods: payment method registered"
        );

        if created.is_default {
            self.relink_subscription(tenant_id, GatewayLinkage {
                gateway: gateway_kind,
                gateway_customer_id: Some(customer_id),
                payment_method_id: Some(created.id),
            })
            .await?;
        }

        Ok(PaymentMethodDto::from(created))
    }

    async fn relink_subscription(&self, tenant_id: Uuid, linkage: GatewayLinkage) -> UseCaseResult<()> {
        let Some(subscription) = self.subscription_repo.find_by_tenant_id(tenant_id).await? else {
            return Ok(());
        };
        if subscription.status() == Some(SubscriptionStatus::Canceled) {
            return Ok(());
        }

        self.subscription_repo
            .update_gateway_linkage(subscription.id, linkage)
            .await?;
        info!(
            %tenant_id,
            subscription_id = %subscription.id,
            "payment_methods: subscription relinked to new default method"
        );
        Ok(())
    }

    pub async fn delete_payment_method(
        &self,
        tenant_id: Uuid,
        payment_method_id: Uuid,
    ) -> UseCaseResult<()> {
        if !self
            .payment_method_repo
            .delete(tenant_id, payment_method_id)
            .await?
        {
            return Err(BillingError::not_found("payment method"));
        }

        info!(%tenant_id, %payment_method_id, "payment_methods: payment method deleted");
        Ok(())
    }

    pub async fn set_default_payment_method(
        &self,
        tenant_id: Uuid,
        payment_method_id: Uuid,
    ) -> UseCaseResult<PaymentMethodDto> {
        let method = self
            .payment_method_repo
            .set_default(tenant_id, payment_method_id)
            .await?
            .ok_or_else(|| BillingError::not_found("payment method"))?;

        info!(%tenant_id, %payment_method_id, "payment_methods: default payment method changed");
        Ok(PaymentMethodDto::from(method))
    }
}
