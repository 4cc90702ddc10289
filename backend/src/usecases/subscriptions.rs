use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::{
    domain::{
        entities::{plans::PlanEntity, subscriptions::InsertSubscriptionEntity},
        repositories::{
            payment_methods::PaymentMethodRepository, plans::PlanRepository,
            subscriptions::SubscriptionRepository, tenants::TenantRepository,
        },
        value_objects::{
            enums::{
                billing_cycles::BillingCycle, gateways::GatewayKind,
                subscription_statuses::SubscriptionStatus,
            },
            invoices::InvoiceDto,
            money::{Money, format_minor},
            plans::{PlanDto, PlanPriceDto, TenantPlanLimits},
            subscriptions::{
                CancelSubscriptionModel, CreateSubscriptionModel, CreateSubscriptionOutcome,
                SubscriptionDto, UpgradeSubscriptionDto, UpgradeSubscriptionModel,
            },
        },
    },
    payments::gateway::PaymentGateways,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{BillingError, UseCaseResult},
    invoices::InvoiceGenerator,
    payments::PaymentProcessor,
    pricing::{price_for, prorate_upgrade},
};

/// Owns the subscription state machine for create, upgrade and cancel. Payment-driven
/// transitions go through `PaymentProcessor`.
pub struct SubscriptionLifecycle {
    plan_repo: Arc<dyn PlanRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
    payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
    invoices: Arc<InvoiceGenerator>,
    payments: Arc<PaymentProcessor>,
    gateways: PaymentGateways,
}

impl SubscriptionLifecycle {
    pub fn new(
        plan_repo: Arc<dyn PlanRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
        payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
        invoices: Arc<InvoiceGenerator>,
        payments: Arc<PaymentProcessor>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            plan_repo,
            subscription_repo,
            tenant_repo,
            payment_method_repo,
            invoices,
            payments,
            gateways,
        }
    }

    pub async fn list_plans(&self, tenant_id: Uuid) -> UseCaseResult<Vec<PlanDto>> {
        info!(%tenant_id, "subscriptions: listing active plans");
        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant"))?;

        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "subscriptions: failed to list active plans");
            BillingError::Internal(err)
        })?;

        let country = tenant.billing_country();
        // The repository sorts by the BRL column; re-sort on the price this tenant sees.
        let mut priced: Vec<(PlanEntity, Money)> = plans
            .into_iter()
            .map(|plan| {
                let monthly = price_for(&plan, country, BillingCycle::Monthly);
                (plan, monthly)
            })
            .collect();
        priced.sort_by_key(|(plan, monthly)| (plan.display_order, monthly.amount_minor));

        Ok(priced
            .into_iter()
            .map(|(plan, monthly)| {
                let yearly = price_for(&plan, country, BillingCycle::Yearly);
                let mut dto = PlanDto::from(plan);
                dto.price = Some(PlanPriceDto {
                    monthly: format_minor(monthly.amount_minor),
                    yearly: format_minor(yearly.amount_minor),
                    currency: monthly.currency,
                });
                dto
            })
            .collect())
    }

    pub async fn get_current_subscription(
        &self,
        tenant_id: Uuid,
    ) -> UseCaseResult<Option<SubscriptionDto>> {
        let subscription = self
            .subscription_repo
            .find_by_tenant_id(tenant_id)
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "subscriptions: failed to load subscription");
                BillingError::Internal(err)
            })?;

        Ok(subscription.map(SubscriptionDto::from))
    }

    pub async fn create_subscription(
        &self,
        tenant_id: Uuid,
        model: CreateSubscriptionModel,
    ) -> UseCaseResult<SubscriptionDto> {
        info!(
            %tenant_id,
            plan_id = %model.plan_id,
            billing_cycle = %model.billing_cycle,
            "subscriptions: create requested"
        );

        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant"))?;

        if let Some(existing) = self.subscription_repo.find_by_tenant_id(tenant_id).await? {
            if existing.is_live() {
                warn!(
                    %tenant_id,
                    subscription_id = %existing.id,
                    status = %existing.status,
                    "subscriptions: tenant already subscribed"
                );
                return Err(already_subscribed());
            }
        }

        let plan = self.load_active_plan(model.plan_id).await?;
        let country = tenant.billing_country();
        let price = price_for(&plan, country, model.billing_cycle);
        if !price.is_positive() && !plan.is_free() {
            warn!(
                %tenant_id,
                plan_id = %plan.id,
                %country,
                "subscriptions: plan has no price for tenant country"
            );
            return Err(BillingError::validation(
                "plan is not available in this country",
            ));
        }

        let payment_method = match model.payment_method_id {
            Some(payment_method_id) => {
                let method = self
                    .payment_method_repo
                    .find_for_tenant(tenant_id, payment_method_id)
                    .await?
                    .ok_or_else(|| BillingError::not_found("payment method"))?;
                if !method.is_active {
                    return Err(BillingError::validation("payment method is not active"));
                }
                Some(method)
            }
            None => None,
        };

        let gateway = payment_method
            .as_ref()
            .and_then(|method| method.gateway_kind())
            .unwrap_or_else(|| GatewayKind::for_country(country));

        let today = Utc::now().date_naive();
        let trialing = plan.trial_days > 0 && payment_method.is_none();
        let status = if trialing {
            SubscriptionStatus::Trialing
        } else {
            SubscriptionStatus::Active
        };
        let (trial_start, trial_end) = if trialing {
            (
                Some(today),
                Some(today + Duration::days(i64::from(plan.trial_days))),
            )
        } else {
            (None, None)
        };

        let insert = InsertSubscriptionEntity {
            tenant_id,
            plan_id: plan.id,
            status: status.to_string(),
            billing_cycle: model.billing_cycle.to_string(),
            current_period_start: today,
            current_period_end: today + Duration::days(model.billing_cycle.period_days()),
            trial_start,
            trial_end,
            gateway: gateway.to_string(),
            gateway_customer_id: tenant.customer_id_for(gateway).map(str::to_string),
            payment_method_id: payment_method.as_ref().map(|method| method.id),
        };

        let subscription = match self
            .subscription_repo
            .create_for_tenant(insert, TenantPlanLimits::from_plan(&plan))
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "subscriptions: failed to create subscription");
                BillingError::Internal(err)
            })? {
            CreateSubscriptionOutcome::Created(subscription) => subscription,
            CreateSubscriptionOutcome::TenantAlreadySubscribed => {
                warn!(%tenant_id, "subscriptions: concurrent create lost the race");
                return Err(already_subscribed());
            }
        };

        info!(
            %tenant_id,
            subscription_id = %subscription.id,
            status = %subscription.status,
            gateway = %subscription.gateway,
            "subscriptions: subscription created"
        );

        if plan.is_free() {
            return Ok(SubscriptionDto::from(subscription));
        }

        let invoice = self.invoices.generate_invoice(&subscription, None).await?;

        let Some(method) = payment_method else {
            return Ok(SubscriptionDto::from(subscription));
        };

        let payment = self.payments.process_payment(&invoice, Some(method.id)).await?;
        info!(
            %tenant_id,
            invoice_number = %invoice.invoice_number,
            payment_status = %payment.status,
            "subscriptions: first invoice payment attempted"
        );

        // The payment may have moved the subscription; report what is stored.
        let subscription = self
            .subscription_repo
            .find_by_tenant_id(tenant_id)
            .await?
            .unwrap_or(subscription);

        Ok(SubscriptionDto::from(subscription))
    }

    pub async fn upgrade_subscription(
        &self,
        tenant_id: Uuid,
        model: UpgradeSubscriptionModel,
    ) -> UseCaseResult<UpgradeSubscriptionDto> {
        info!(%tenant_id, plan_id = %model.plan_id, "subscriptions: upgrade requested");

        let subscription = self
            .subscription_repo
            .find_by_tenant_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("subscription"))?;

        if subscription.status() == Some(SubscriptionStatus::Canceled) {
            return Err(BillingError::validation("subscription is canceled"));
        }
        if subscription.plan_id == model.plan_id {
            return Err(BillingError::validation(
                "subscription is already on this plan",
            ));
        }

        let new_plan = self.load_active_plan(model.plan_id).await?;
        let old_plan = self
            .plan_repo
            .find_by_id(subscription.plan_id)
            .await?
            .ok_or_else(|| BillingError::not_found("plan"))?;
        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant"))?;

        let country = tenant.billing_country();
        let old_monthly = price_for(&old_plan, country, BillingCycle::Monthly);
        let new_monthly = price_for(&new_plan, country, BillingCycle::Monthly);

        let today = Utc::now().date_naive();
        let days_used = (today - subscription.current_period_start).num_days();
        let delta = prorate_upgrade(
            old_monthly.amount_minor,
            new_monthly.amount_minor,
            days_used,
            subscription.period_days(),
        );

        let adjustment = if delta > 0 {
            let notes = format!(
                "Prorated upgrade from {} to {} ({} of {} days used)",
                old_plan.name,
                new_plan.name,
                days_used,
                subscription.period_days()
            );
            Some(self.invoices.adjustment_draft(
                &subscription,
                Money::new(delta, new_monthly.currency),
                notes,
            )?)
        } else {
            None
        };

        let plan_change = self
            .subscription_repo
            .change_plan(
                subscription.id,
                new_plan.id,
                TenantPlanLimits::from_plan(&new_plan),
                adjustment,
            )
            .await
            .map_err(|err| {
                error!(
                    %tenant_id,
                    subscription_id = %subscription.id,
                    db_error = ?err,
                    "subscriptions: failed to change plan"
                );
                BillingError::Internal(err)
            })?;

        info!(
            %tenant_id,
            subscription_id = %plan_change.subscription.id,
            from_plan = %old_plan.slug,
            to_plan = %new_plan.slug,
            prorated_minor = delta,
            adjustment_invoice = ?plan_change
                .adjustment_invoice
                .as_ref()
                .map(|invoice| invoice.invoice_number.as_str()),
            "subscriptions: plan changed"
        );

        Ok(UpgradeSubscriptionDto {
            subscription: SubscriptionDto::from(plan_change.subscription),
            adjustment_invoice: plan_change.adjustment_invoice.map(InvoiceDto::from),
        })
    }

    pub async fn cancel_subscription(
        &self,
        tenant_id: Uuid,
        model: CancelSubscriptionModel,
    ) -> UseCaseResult<SubscriptionDto> {
        info!(%tenant_id, "subscriptions: cancel requested");

        let subscription = self
            .subscription_repo
            .find_by_tenant_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("subscription"))?;

        if subscription.status() == Some(SubscriptionStatus::Canceled) {
            return Err(already_canceled());
        }

        if let (Some(gateway_subscription_id), Some(gateway)) = (
            subscription.gateway_subscription_id.as_deref(),
            subscription.gateway_kind(),
        ) {
            let canceled = self
                .gateways
                .get(gateway)
                .cancel_subscription(gateway_subscription_id)
                .await
                .map_err(|err| {
                    error!(
                        %tenant_id,
                        %gateway,
                        %gateway_subscription_id,
                        error = %err,
                        "subscriptions: gateway cancel failed"
                    );
                    BillingError::Gateway(err)
                })?;
            info!(
                %tenant_id,
                %gateway,
                canceled,
                "subscriptions: gateway subscription canceled"
            );
        }

        let canceled = self
            .subscription_repo
            .cancel(subscription.id, model.reason)
            .await?
            .ok_or_else(already_canceled)?;

        info!(%tenant_id, subscription_id = %canceled.id, "subscriptions: subscription canceled");
        Ok(SubscriptionDto::from(canceled))
    }

    async fn load_active_plan(&self, plan_id: Uuid) -> UseCaseResult<PlanEntity> {
        let plan = self
            .plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%plan_id, db_error = ?err, "subscriptions: failed to load plan");
                BillingError::Internal(err)
            })?
            .ok_or_else(|| BillingError::not_found("plan"))?;

        if !plan.is_active {
            return Err(BillingError::validation("plan is not active"));
        }
        Ok(plan)
    }
}

fn already_subscribed() -> BillingError {
    BillingError::validation("tenant already has an active subscription")
}

fn already_canceled() -> BillingError {
    BillingError::validation("subscription is already canceled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_fixtures::{
        sample_invoice, sample_payment, sample_payment_method, sample_plan, sample_subscription,
        sample_tenant, today,
    };
    use crates::{
        domain::{
            entities::{
                plans::PlanEntity, subscriptions::SubscriptionEntity, tenants::TenantEntity,
            },
            repositories::{
                invoices::MockInvoiceRepository, payment_methods::MockPaymentMethodRepository,
                payments::MockPaymentRepository, plans::MockPlanRepository,
                subscriptions::MockSubscriptionRepository, tenants::MockTenantRepository,
            },
            value_objects::{
                enums::currencies::Currency, invoices::NewInvoiceDraft,
                payments::PaymentTransition, subscriptions::PlanChange,
            },
        },
        payments::gateway::{ChargeResponse, GatewayError, MockPaymentGateway},
    };
    use mockall::predicate::eq;

    /// Repositories shared between the lifecycle and its generator/processor, wired the way
    /// the router wires them.
    struct Mocks {
        plan_repo: MockPlanRepository,
        subscription_repo: MockSubscriptionRepository,
        tenant_repo: MockTenantRepository,
        payment_method_repo: MockPaymentMethodRepository,
        invoice_repo: MockInvoiceRepository,
        payment_repo: MockPaymentRepository,
        stripe: MockPaymentGateway,
        asaas: MockPaymentGateway,
    }

    impl Mocks {
        fn new() -> Self {
            let mut stripe = MockPaymentGateway::new();
            stripe
                .expect_capture_mode()
                .return_const(crates::payments::gateway::CaptureMode::Synchronous);
            Self {
                plan_repo: MockPlanRepository::new(),
                subscription_repo: MockSubscriptionRepository::new(),
                tenant_repo: MockTenantRepository::new(),
                payment_method_repo: MockPaymentMethodRepository::new(),
                invoice_repo: MockInvoiceRepository::new(),
                payment_repo: MockPaymentRepository::new(),
                stripe,
                asaas: MockPaymentGateway::new(),
            }
        }

        fn with_tenant(mut self, tenant: &TenantEntity) -> Self {
            let tenant = tenant.clone();
            self.tenant_repo
                .expect_find_by_id()
                .returning(move |_| Ok(Some(tenant.clone())));
            self
        }

        fn with_plans(mut self, plans: Vec<PlanEntity>) -> Self {
            self.plan_repo.expect_find_by_id().returning(move |plan_id| {
                Ok(plans.iter().find(|plan| plan.id == plan_id).cloned())
            });
            self
        }

        fn with_subscription(mut self, subscription: Option<SubscriptionEntity>) -> Self {
            self.subscription_repo
                .expect_find_by_tenant_id()
                .returning(move |_| Ok(subscription.clone()));
            self
        }

        fn build(self) -> SubscriptionLifecycle {
            let plan_repo: Arc<dyn PlanRepository + Send + Sync> = Arc::new(self.plan_repo);
            let subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync> =
                Arc::new(self.subscription_repo);
            let tenant_repo: Arc<dyn TenantRepository + Send + Sync> = Arc::new(self.tenant_repo);
            let payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync> =
                Arc::new(self.payment_method_repo);
            let invoice_repo: Arc<dyn crates::domain::repositories::invoices::InvoiceRepository + Send + Sync> =
                Arc::new(self.invoice_repo);
            let gateways = PaymentGateways::new(Arc::new(self.stripe), Arc::new(self.asaas));

            let invoices = Arc::new(InvoiceGenerator::new(
                Arc::clone(&invoice_repo),
                Arc::clone(&plan_repo),
                Arc::clone(&tenant_repo),
            ));
            let payments = Arc::new(PaymentProcessor::new(
                Arc::new(self.payment_repo),
                Arc::clone(&payment_method_repo),
                Arc::clone(&subscription_repo),
                Arc::clone(&tenant_repo),
                invoice_repo,
                gateways.clone(),
            ));

            SubscriptionLifecycle::new(
                plan_repo,
                subscription_repo,
                tenant_repo,
                payment_method_repo,
                invoices,
                payments,
                gateways,
            )
        }
    }

    fn created_from(insert: &InsertSubscriptionEntity) -> SubscriptionEntity {
        let mut subscription = sample_subscription(insert.tenant_id, insert.plan_id, 0);
        subscription.status = insert.status.clone();
        subscription.billing_cycle = insert.billing_cycle.clone();
        subscription.current_period_start = insert.current_period_start;
        subscription.current_period_end = insert.current_period_end;
        subscription.trial_start = insert.trial_start;
        subscription.trial_end = insert.trial_end;
        subscription.gateway = insert.gateway.clone();
        subscription.gateway_customer_id = insert.gateway_customer_id.clone();
        subscription.payment_method_id = insert.payment_method_id;
        subscription
    }

    fn echo_invoice(draft: NewInvoiceDraft) -> crates::domain::entities::invoices::InvoiceEntity {
        let mut invoice = sample_invoice(draft.tenant_id, draft.subscription_id);
        invoice.amount_minor = draft.amount_minor;
        invoice.total_amount_minor = draft.total_amount_minor();
        invoice.currency = draft.currency.to_string();
        invoice.due_date = draft.due_date;
        invoice
    }

    #[tokio::test]
    async fn trial_plan_without_payment_method_starts_trialing() {
        let tenant = sample_tenant("BR");
        let mut plan = sample_plan(Some(29_700), None);
        plan.trial_days = 14;

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()])
            .with_subscription(None);

        let plan_id = plan.id;
        mocks
            .subscription_repo
            .expect_create_for_tenant()
            .withf(move |insert, limits| {
                insert.plan_id == plan_id
                    && insert.status == "trialing"
                    && insert.gateway == "asaas"
                    && insert.gateway_customer_id.as_deref() == Some("cus_000001")
                    && limits.max_projects == 10
                    && limits.max_users == 999_999
            })
            .times(1)
            .returning(|insert, _| Ok(CreateSubscriptionOutcome::Created(created_from(&insert))));
        mocks
            .invoice_repo
            .expect_create_invoice()
            .times(1)
            .returning(|draft| Ok(echo_invoice(draft)));
        mocks.payment_repo.expect_create_pending().times(0);

        let subscription = mocks
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(subscription.status, "trialing");
        let (trial_start, trial_end) = (subscription.trial_start.unwrap(), subscription.trial_end.unwrap());
        assert_eq!(trial_start, today());
        assert_eq!((trial_end - trial_start).num_days(), 14);
    }

    #[tokio::test]
    async fn second_live_subscription_is_rejected() {
        let tenant = sample_tenant("BR");
        let plan = sample_plan(Some(29_700), None);
        let existing = sample_subscription(tenant.id, plan.id, 5);

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()])
            .with_subscription(Some(existing));
        mocks.subscription_repo.expect_create_for_tenant().times(0);

        let result = mocks
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn concurrent_create_surfaces_as_validation_error() {
        let tenant = sample_tenant("BR");
        let plan = sample_plan(Some(29_700), None);

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()])
            .with_subscription(None);
        mocks
            .subscription_repo
            .expect_create_for_tenant()
            .returning(|_, _| Ok(CreateSubscriptionOutcome::TenantAlreadySubscribed));
        mocks.invoice_repo.expect_create_invoice().times(0);

        let result = mocks
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn plan_without_price_for_the_country_is_rejected() {
        let tenant = sample_tenant("US");
        let plan = sample_plan(Some(29_700), None);

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()])
            .with_subscription(None);
        mocks.subscription_repo.expect_create_for_tenant().times(0);

        let result = mocks
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: None,
                },
            )
            .await;

        match result {
            Err(BillingError::Validation(message)) => {
                assert_eq!(message, "plan is not available in this country")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inactive_plan_is_rejected() {
        let tenant = sample_tenant("BR");
        let mut plan = sample_plan(Some(29_700), None);
        plan.is_active = false;

        let result = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()])
            .with_subscription(None)
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: None,
                },
            )
            .await;

        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn free_plan_skips_invoicing() {
        let tenant = sample_tenant("US");
        let plan = sample_plan(None, None);

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()])
            .with_subscription(None);
        mocks
            .subscription_repo
            .expect_create_for_tenant()
            .returning(|insert, _| Ok(CreateSubscriptionOutcome::Created(created_from(&insert))));
        mocks.invoice_repo.expect_create_invoice().times(0);

        let subscription = mocks
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(subscription.status, "active");
        assert_eq!(subscription.gateway, "stripe");
    }

    #[tokio::test]
    async fn supplied_payment_method_activates_and_charges_the_first_invoice() {
        let tenant = sample_tenant("US");
        let mut plan = sample_plan(None, Some(3_900));
        plan.trial_days = 7;
        let method = sample_payment_method(tenant.id, "stripe");
        let method_id = method.id;

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![plan.clone()]);

        // Nothing stored before the create; the post-payment re-read falls back to the row.
        mocks
            .subscription_repo
            .expect_find_by_tenant_id()
            .returning(|_| Ok(None));
        mocks
            .subscription_repo
            .expect_create_for_tenant()
            .withf(move |insert, _| {
                insert.status == "active" && insert.payment_method_id == Some(method_id)
            })
            .times(1)
            .returning(|insert, _| Ok(CreateSubscriptionOutcome::Created(created_from(&insert))));

        let method_clone = method.clone();
        mocks
            .payment_method_repo
            .expect_find_for_tenant()
            .with(eq(tenant.id), eq(method_id))
            .returning(move |_, _| Ok(Some(method_clone.clone())));

        mocks
            .invoice_repo
            .expect_create_invoice()
            .withf(|draft| draft.amount_minor == 3_900 && draft.currency == Currency::Usd)
            .times(1)
            .returning(|draft| Ok(echo_invoice(draft)));

        mocks.payment_repo.expect_create_pending().times(1).returning(|payment| {
            let invoice = sample_invoice(payment.tenant_id, None);
            Ok(sample_payment(&invoice, "pending"))
        });
        mocks.stripe.expect_process_payment().times(1).returning(|_| {
            Ok(ChargeResponse {
                id: "pi_first".to_string(),
                status: Some("succeeded".to_string()),
                charge_id: None,
            })
        });
        mocks.payment_repo.expect_apply_success().times(1).returning(|_, _, _| {
            let invoice = sample_invoice(Uuid::new_v4(), None);
            Ok(PaymentTransition::Applied(sample_payment(&invoice, "succeeded")))
        });

        let subscription = mocks
            .build()
            .create_subscription(
                tenant.id,
                CreateSubscriptionModel {
                    plan_id: plan.id,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method_id: Some(method_id),
                },
            )
            .await
            .unwrap();

        assert_eq!(subscription.status, "active");
        assert_eq!(subscription.trial_end, None);
    }

    #[tokio::test]
    async fn midpoint_upgrade_issues_a_prorated_adjustment() {
        let tenant = sample_tenant("BR");
        let old_plan = sample_plan(Some(29_700), None);
        let mut new_plan = sample_plan(Some(79_700), None);
        new_plan.slug = "pro".to_string();
        new_plan.name = "Pro".to_string();
        let subscription = sample_subscription(tenant.id, old_plan.id, 15);
        let subscription_id = subscription.id;
        let new_plan_id = new_plan.id;

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![old_plan.clone(), new_plan.clone()])
            .with_subscription(Some(subscription.clone()));

        let limits = TenantPlanLimits::from_plan(&new_plan);
        mocks
            .subscription_repo
            .expect_change_plan()
            .withf(move |id, plan_id, plan_limits, adjustment| {
                *id == subscription_id
                    && *plan_id == new_plan_id
                    && *plan_limits == limits
                    && adjustment.as_ref().is_some_and(|draft| {
                        draft.amount_minor == 25_000
                            && draft.currency == Currency::Brl
                            && draft.subscription_id == Some(subscription_id)
                            && draft.due_date == today() + Duration::days(7)
                    })
            })
            .times(1)
            .returning(move |_, plan_id, _, adjustment| {
                let mut updated = subscription.clone();
                updated.plan_id = plan_id;
                Ok(PlanChange {
                    subscription: updated,
                    adjustment_invoice: adjustment.map(echo_invoice),
                })
            });
        mocks.invoice_repo.expect_create_invoice().times(0);

        let upgraded = mocks
            .build()
            .upgrade_subscription(tenant.id, UpgradeSubscriptionModel { plan_id: new_plan_id })
            .await
            .unwrap();

        assert_eq!(upgraded.subscription.plan_id, new_plan_id);
        let adjustment = upgraded.adjustment_invoice.unwrap();
        assert_eq!(adjustment.total_amount, "250.00");
    }

    #[tokio::test]
    async fn downgrade_issues_no_adjustment_invoice() {
        let tenant = sample_tenant("BR");
        let old_plan = sample_plan(Some(79_700), None);
        let new_plan = sample_plan(Some(29_700), None);
        let subscription = sample_subscription(tenant.id, old_plan.id, 10);

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![old_plan.clone(), new_plan.clone()])
            .with_subscription(Some(subscription.clone()));
        mocks
            .subscription_repo
            .expect_change_plan()
            .withf(|_, _, _, adjustment| adjustment.is_none())
            .returning(move |_, plan_id, _, _| {
                let mut updated = subscription.clone();
                updated.plan_id = plan_id;
                Ok(PlanChange {
                    subscription: updated,
                    adjustment_invoice: None,
                })
            });
        mocks.invoice_repo.expect_create_invoice().times(0);

        let upgraded = mocks
            .build()
            .upgrade_subscription(tenant.id, UpgradeSubscriptionModel { plan_id: new_plan.id })
            .await
            .unwrap();

        assert!(upgraded.adjustment_invoice.is_none());
    }

    #[tokio::test]
    async fn failed_plan_change_leaves_no_adjustment_invoice_behind() {
        let tenant = sample_tenant("BR");
        let old_plan = sample_plan(Some(29_700), None);
        let new_plan = sample_plan(Some(79_700), None);
        let subscription = sample_subscription(tenant.id, old_plan.id, 15);

        let mut mocks = Mocks::new()
            .with_tenant(&tenant)
            .with_plans(vec![old_plan.clone(), new_plan.clone()])
            .with_subscription(Some(subscription));
        mocks
            .subscription_repo
            .expect_change_plan()
            .withf(|_, _, _, adjustment| adjustment.is_some())
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("invoice numbering lock timed out")));
        mocks.invoice_repo.expect_create_invoice().times(0);

        let result = mocks
            .build()
            .upgrade_subscription(tenant.id, UpgradeSubscriptionModel { plan_id: new_plan.id })
            .await;

        assert!(matches!(result, Err(BillingError::Internal(_))));
    }

    #[tokio::test]
    async fn upgrade_to_the_same_plan_is_rejected() {
        let tenant = sample_tenant("BR");
        let plan = sample_plan(Some(29_700), None);
        let subscription = sample_subscription(tenant.id, plan.id, 3);

        let mut mocks = Mocks::new().with_subscription(Some(subscription));
        mocks.subscription_repo.expect_change_plan().times(0);

        let result = mocks
            .build()
            .upgrade_subscription(tenant.id, UpgradeSubscriptionModel { plan_id: plan.id })
            .await;

        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn cancel_also_cancels_the_gateway_subscription() {
        let tenant = sample_tenant("US");
        let mut subscription = sample_subscription(tenant.id, Uuid::new_v4(), 3);
        subscription.gateway_subscription_id = Some("sub_123".to_string());
        let subscription_id = subscription.id;

        let mut mocks = Mocks::new().with_subscription(Some(subscription.clone()));
        mocks
            .stripe
            .expect_cancel_subscription()
            .withf(|id| id.to_string() == "sub_123")
            .times(1)
            .returning(|_| Ok(true));
        mocks
            .subscription_repo
            .expect_cancel()
            .with(eq(subscription_id), eq(Some("too expensive".to_string())))
            .times(1)
            .returning(move |_, reason| {
                let mut canceled = subscription.clone();
                canceled.status = "canceled".to_string();
                canceled.cancel_at_period_end = true;
                canceled.cancellation_reason = reason;
                canceled.canceled_at = Some(Utc::now());
                Ok(Some(canceled))
            });

        let canceled = mocks
            .build()
            .cancel_subscription(
                tenant.id,
                CancelSubscriptionModel {
                    reason: Some("too expensive".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(canceled.status, "canceled");
        assert!(canceled.cancel_at_period_end);
        assert!(canceled.canceled_at.is_some());
    }

    #[tokio::test]
    async fn gateway_cancel_failure_keeps_the_subscription() {
        let tenant = sample_tenant("US");
        let mut subscription = sample_subscription(tenant.id, Uuid::new_v4(), 3);
        subscription.gateway_subscription_id = Some("sub_123".to_string());

        let mut mocks = Mocks::new().with_subscription(Some(subscription));
        mocks
            .stripe
            .expect_cancel_subscription()
            .returning(|_| Err(GatewayError::Transport("connection reset".to_string())));
        mocks.subscription_repo.expect_cancel().times(0);

        let result = mocks
            .build()
            .cancel_subscription(tenant.id, CancelSubscriptionModel::default())
            .await;

        assert!(matches!(result, Err(BillingError::Gateway(_))));
    }

    #[tokio::test]
    async fn canceled_subscription_cannot_be_canceled_again() {
        let tenant = sample_tenant("US");
        let mut subscription = sample_subscription(tenant.id, Uuid::new_v4(), 3);
        subscription.status = "canceled".to_string();

        let mut mocks = Mocks::new().with_subscription(Some(subscription));
        mocks.subscription_repo.expect_cancel().times(0);

        let result = mocks
            .build()
            .cancel_subscription(tenant.id, CancelSubscriptionModel::default())
            .await;

        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn plans_carry_the_price_for_the_tenant_country() {
        let tenant = sample_tenant("BR");
        let plan = sample_plan(Some(29_700), Some(5_900));

        let mut mocks = Mocks::new().with_tenant(&tenant);
        mocks
            .plan_repo
            .expect_list_active_plans()
            .returning(move || Ok(vec![plan.clone()]));

        let plans = mocks.build().list_plans(tenant.id).await.unwrap();

        let price = plans[0].price.as_ref().unwrap();
        assert_eq!(price.monthly, "297.00");
        assert_eq!(price.yearly, "2970.00");
        assert_eq!(price.currency, Currency::Brl);
    }

    #[tokio::test]
    async fn foreign_tenant_sees_plans_ordered_by_their_own_price() {
        let tenant = sample_tenant("US");
        let mut featured = sample_plan(Some(99_700), Some(19_900));
        featured.slug = "enterprise".to_string();
        featured.display_order = 0;
        let mut cheap_in_brl = sample_plan(Some(19_700), Some(5_900));
        cheap_in_brl.slug = "essential".to_string();
        let mut cheap_in_usd = sample_plan(Some(29_700), Some(3_900));
        cheap_in_usd.slug = "starter".to_string();

        let mut mocks = Mocks::new().with_tenant(&tenant);
        mocks
            .plan_repo
            .expect_list_active_plans()
            .times(1)
            .returning(move || {
                Ok(vec![
                    featured.clone(),
                    cheap_in_brl.clone(),
                    cheap_in_usd.clone(),
                ])
            });

        let plans = mocks.build().list_plans(tenant.id).await.unwrap();

        let slugs: Vec<&str> = plans.iter().map(|plan| plan.slug.as_str()).collect();
        assert_eq!(slugs, ["enterprise", "starter", "essential"]);
        let monthly: Vec<&str> = plans
            .iter()
            .map(|plan| plan.price.as_ref().unwrap().monthly.as_str())
            .collect();
        assert_eq!(monthly, ["199.00", "39.00", "59.00"]);
    }
}
