use super::*;
use axum::http::HeaderValue;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::env;

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";
const TENANT_ID: &str = "8f14e45f-ceea-467f-a0d4-4b1c3a6d2e10";

fn set_env_vars() {
    unsafe {
        env::set_var("JWT_SECRET", SECRET);
    }
}

fn claims(exp: usize) -> TenantClaims {
    TenantClaims {
        sub: USER_ID.to_string(),
        tenant_id: TENANT_ID.to_string(),
        role: "owner".to_string(),
        email: Some("billing@example.com".to_string()),
        exp,
    }
}

fn sign(claims: &TenantClaims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn headers_with(authorization: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
    headers
}

#[test]
fn test_validate_tenant_jwt_success() {
    set_env_vars();
    let my_claims = claims(9999999999);
    let token = sign(&my_claims, SECRET);

    let claims = validate_tenant_jwt(&token).expect("Valid token should pass");
    assert_eq!(claims.sub, my_claims.sub);
    assert_eq!(claims.tenant_id, my_claims.tenant_id);
    assert_eq!(claims.role, "owner");
}

#[test]
fn test_validate_tenant_jwt_expired() {
    set_env_vars();
    let token = sign(&claims(1), SECRET);

    assert!(matches!(
        validate_tenant_jwt(&token),
        Err(AuthError::InvalidToken(_))
    ));
}

#[test]
fn test_validate_tenant_jwt_invalid_signature() {
    set_env_vars();
    let token = sign(&claims(9999999999), "wrongsecret");

    assert!(matches!(
        validate_tenant_jwt(&token),
        Err(AuthError::InvalidToken(_))
    ));
}

#[test]
fn claims_convert_into_tenant_scope() {
    let tenant = AuthTenant::try_from(claims(9999999999)).unwrap();

    assert_eq!(tenant.user_id.to_string(), USER_ID);
    assert_eq!(tenant.tenant_id.to_string(), TENANT_ID);
    assert_eq!(tenant.email.as_deref(), Some("billing@example.com"));
}

#[test]
fn non_uuid_tenant_claim_is_rejected() {
    let mut bad = claims(9999999999);
    bad.tenant_id = "acme".to_string();

    assert!(matches!(
        AuthTenant::try_from(bad),
        Err(AuthError::InvalidClaim("tenant id"))
    ));
}

#[test]
fn bearer_token_requires_scheme_and_value() {
    assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
    assert!(matches!(
        bearer_token(&HeaderMap::new()),
        Err(AuthError::MissingHeader)
    ));
    assert!(matches!(
        bearer_token(&headers_with("Basic abc")),
        Err(AuthError::MalformedHeader)
    ));
    assert!(matches!(
        bearer_token(&headers_with("Bearer ")),
        Err(AuthError::MalformedHeader)
    ));
}

#[test]
fn rejections_render_as_unauthorized() {
    let response = AuthError::MissingHeader.into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
