use axum::{
    Json, async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{axum_http::error_responses::ErrorResponse, config::config_loader};

/// HS256 claims issued by the identity service for a tenant member.
#[derive(Debug, Serialize, Deserialize)]
pub struct TenantClaims {
    pub sub: String,
    pub tenant_id: String,
    pub role: String,
    pub email: Option<String>,
    pub exp: usize,
}

/// Authenticated caller. Every billing query is scoped to `tenant_id`.
#[derive(Debug, Clone)]
pub struct AuthTenant {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: Option<String>,
    pub role: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("Authorization header must be `Bearer <token>`")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token carries an invalid {0}")]
    InvalidClaim(&'static str),
    #[error("auth is not configured")]
    NotConfigured(#[source] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::NotConfigured(err) => {
                error!(error = ?err, "auth: jwt secret unavailable");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl TryFrom<TenantClaims> for AuthTenant {
    type Error = AuthError;

    fn try_from(claims: TenantClaims) -> Result<Self, Self::Error> {
        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidClaim("user id"))?;
        let tenant_id =
            Uuid::parse_str(&claims.tenant_id).map_err(|_| AuthError::InvalidClaim("tenant id"))?;

        Ok(AuthTenant {
            user_id,
            tenant_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

pub fn validate_tenant_jwt(token: &str) -> Result<TenantClaims, AuthError> {
    let secret = config_loader::get_jwt_secret()
        .map_err(AuthError::NotConfigured)?
        .jwt_secret;

    let token_data = decode::<TenantClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(token_data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MalformedHeader)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthTenant
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        validate_tenant_jwt(token)
            .and_then(AuthTenant::try_from)
            .inspect_err(|err| warn!(error = %err, "auth: request rejected"))
    }
}

#[cfg(test)]
mod tests;
