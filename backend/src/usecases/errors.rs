use axum::http::StatusCode;
use crates::payments::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    /// A caller precondition failed. Never retried.
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        BillingError::NotFound(what.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Validation(_) | BillingError::InvalidSignature => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Gateway(_) => StatusCode::BAD_GATEWAY,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;
