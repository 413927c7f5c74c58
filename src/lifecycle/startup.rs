//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve secrets from the environment
//! - Build the session, registry client, inventory and controller from config
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::SyncConfig;
use crate::controller::Controller;
use crate::inventory::FileInventory;
use crate::reconcile::Reconciler;
use crate::registry::{HttpRegistryClient, RegistryError, Session, TokenEndpoint};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("environment variable {0} is not set")]
    MissingSecret(String),

    #[error("invalid URL in {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Build the registry session, reading secrets through `env`.
pub fn build_session_with<F>(config: &SyncConfig, env: F) -> Result<Session, StartupError>
where
    F: Fn(&str) -> Option<String>,
{
    match &config.auth {
        Some(auth) => {
            let client_secret = env(&auth.client_secret_env)
                .ok_or_else(|| StartupError::MissingSecret(auth.client_secret_env.clone()))?;
            let url = Url::parse(&auth.token_url).map_err(|source| StartupError::InvalidUrl {
                field: "auth.token_url",
                source,
            })?;

            Ok(Session::from_endpoint(TokenEndpoint {
                url,
                client_id: auth.client_id.clone(),
                client_secret,
                requested_subject: auth.requested_subject.clone(),
                refresh_margin: Duration::from_secs(auth.refresh_margin_secs),
                timeout: Duration::from_secs(config.registry.timeout_secs),
            })?)
        }
        None => {
            let token = env(&config.registry.token_env)
                .ok_or_else(|| StartupError::MissingSecret(config.registry.token_env.clone()))?;
            Ok(Session::fixed(token))
        }
    }
}

/// Build the HTTP registry client from the process environment.
pub fn build_registry(config: &SyncConfig) -> Result<HttpRegistryClient, StartupError> {
    let session = build_session_with(config, |var| std::env::var(var).ok())?;
    let base_url = Url::parse(&config.registry.base_url).map_err(|source| StartupError::InvalidUrl {
        field: "registry.base_url",
        source,
    })?;
    Ok(HttpRegistryClient::new(
        base_url,
        session,
        Duration::from_secs(config.registry.timeout_secs),
    )?)
}

pub fn build_inventory(config: &SyncConfig) -> FileInventory {
    FileInventory::new(
        &config.inventory.path,
        &config.inventory.instance_id_annotation,
        config.inventory.ready_only,
    )
}

/// Wire every subsystem into a controller.
pub fn build_controller(config: &SyncConfig) -> Result<Controller, StartupError> {
    let registry = Arc::new(build_registry(config)?);
    let inventory = Arc::new(build_inventory(config));

    tracing::info!(
        registry = %config.registry.base_url,
        inventory = %config.inventory.path,
        listeners = config.listeners.len(),
        "Subsystems initialized"
    );

    Ok(Controller::new(
        Reconciler::new(registry),
        inventory,
        config.listener_refs(),
        config.reconcile.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[tokio::test]
    async fn test_static_token_from_env() {
        let config = SyncConfig::default();
        let session = build_session_with(&config, env(&[("LB_SYNC_TOKEN", "tok")])).unwrap();
        assert_eq!(session.bearer().await.unwrap(), "tok");
    }

    #[test]
    fn test_missing_token() {
        let err = build_session_with(&SyncConfig::default(), env(&[])).unwrap_err();
        assert!(matches!(err, StartupError::MissingSecret(var) if var == "LB_SYNC_TOKEN"));
    }

    #[test]
    fn test_endpoint_session_needs_secret() {
        let mut config = SyncConfig::default();
        config.auth = Some(AuthConfig {
            token_url: "https://sso.example.com/token".into(),
            client_id: "lb-sync".into(),
            client_secret_env: "MY_SECRET".into(),
            requested_subject: None,
            refresh_margin_secs: 30,
        });

        assert!(matches!(
            build_session_with(&config, env(&[])),
            Err(StartupError::MissingSecret(_))
        ));
        assert!(build_session_with(&config, env(&[("MY_SECRET", "x")])).is_ok());
    }
}
