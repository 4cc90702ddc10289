use anyhow::{Context, Result};
use crates::payments::{
    asaas_client::{AsaasConfig, AsaasEnvironment},
    stripe_client::{DEFAULT_STRIPE_API_BASE, StripeConfig},
};

use super::{
    config_model::{AuthSecret, BackendServer, Database, DotEnvyConfig},
    stage::Stage,
};

const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let auth = AuthSecret {
        jwt_secret: required("JWT_SECRET")?,
    };

    let timeout_secs = match optional("GATEWAY_TIMEOUT_SECS") {
        Some(raw) => raw.parse().context("GATEWAY_TIMEOUT_SECS is invalid")?,
        None => DEFAULT_GATEWAY_TIMEOUT_SECS,
    };

    let webhook_tolerance_secs = match optional("WEBHOOK_TOLERANCE_SECS") {
        Some(raw) => raw.parse().context("WEBHOOK_TOLERANCE_SECS is invalid")?,
        None => DEFAULT_WEBHOOK_TOLERANCE_SECS,
    };

    let stripe = StripeConfig {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        api_base: optional("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
        timeout_secs,
        webhook_tolerance_secs,
    };

    let environment = match optional("ASAAS_ENVIRONMENT") {
        Some(raw) => AsaasEnvironment::from_str(&raw)
            .with_context(|| format!("ASAAS_ENVIRONMENT is invalid: {raw}"))?,
        None => AsaasEnvironment::default(),
    };

    let asaas = AsaasConfig {
        api_key: required("ASAAS_API_KEY")?,
        environment,
        webhook_token: required("ASAAS_WEBHOOK_TOKEN")?,
        timeout_secs,
    };

    Ok(DotEnvyConfig {
        stage: get_stage(),
        backend_server,
        database,
        auth,
        stripe,
        asaas,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_jwt_secret() -> Result<AuthSecret> {
    dotenvy::dotenv().ok();

    Ok(AuthSecret {
        jwt_secret: required("JWT_SECRET")?,
    })
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stage_falls_back_to_local() {
        assert_eq!(
            Stage::try_from(&"qa".to_string()).unwrap_or_default(),
            Stage::Local
        );
        assert_eq!(
            Stage::try_from(&"PRODUCTION".to_string()).unwrap(),
            Stage::Production
        );
    }
}
