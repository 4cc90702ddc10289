use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{entities::payments::PaymentEntity, value_objects::money::format_minor};

/// Gateway statuses that count as a successful attempt.
pub const ACCEPTED_GATEWAY_STATUSES: [&str; 6] = [
    "succeeded",
    "requires_capture",
    "processing",
    "confirmed",
    "confirmado",
    "paid",
];

/// Interpretation of a gateway's reported status for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded,
    Failed { reason: String },
}

impl ChargeOutcome {
    pub fn from_status(status: Option<&str>) -> Self {
        let normalized = status.map(|value| value.trim().to_lowercase());
        match normalized.as_deref() {
            Some(value) if ACCEPTED_GATEWAY_STATUSES.contains(&value) => ChargeOutcome::Succeeded,
            Some(value) if !value.is_empty() => ChargeOutcome::Failed {
                reason: format!("gateway payment status: {value}"),
            },
            _ => ChargeOutcome::Failed {
                reason: "gateway payment status: unknown".to_string(),
            },
        }
    }
}

/// Result of applying a terminal transition to a payment row.
#[derive(Debug, Clone)]
pub enum PaymentTransition {
    Applied(PaymentEntity),
    /// The payment was already terminal; nothing was written.
    AlreadyTerminal(PaymentEntity),
}

impl PaymentTransition {
    pub fn payment(&self) -> &PaymentEntity {
        match self {
            PaymentTransition::Applied(payment) | PaymentTransition::AlreadyTerminal(payment) => {
                payment
            }
        }
    }

    pub fn into_payment(self) -> PaymentEntity {
        match self {
            PaymentTransition::Applied(payment) | PaymentTransition::AlreadyTerminal(payment) => {
                payment
            }
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, PaymentTransition::Applied(_))
    }
}

/// Body of `POST invoices/{id}/pay`. Without a method the tenant's default is charged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayInvoiceModel {
    pub payment_method_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub payment_method_id: Option<Uuid>,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub payment_method_type: String,
    pub gateway: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_charge_id: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentEntity> for PaymentDto {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            invoice_id: value.invoice_id,
            payment_method_id: value.payment_method_id,
            amount: format_minor(value.amount_minor),
            currency: value.currency,
            status: value.status,
            payment_method_type: value.payment_method_type,
            gateway: value.gateway,
            gateway_payment_id: value.gateway_payment_id,
            gateway_charge_id: value.gateway_charge_id,
            failure_reason: value.failure_reason,
            retry_count: value.retry_count,
            max_retries: value.max_retries,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
