//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sync daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::registry::ListenerRef;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend registry endpoint.
    pub registry: RegistryConfig,

    /// Token endpoint credentials. Without it a static token is read from
    /// the environment.
    pub auth: Option<AuthConfig>,

    /// Node inventory source.
    pub inventory: InventoryConfig,

    /// Control loop timing.
    pub reconcile: ReconcileConfig,

    /// Listeners whose backend pools are kept in sync.
    pub listeners: Vec<ListenerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the SLB API (e.g., "https://slb.example.com/api/v1").
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Environment variable holding a static bearer token.
    pub token_env: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000/api/v1".to_string(),
            timeout_secs: 10,
            token_env: "LB_SYNC_TOKEN".to_string(),
        }
    }
}

/// OpenID Connect token endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Token endpoint URL.
    pub token_url: String,

    pub client_id: String,

    /// Environment variable holding the client secret.
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Subject to request via token exchange.
    #[serde(default)]
    pub requested_subject: Option<String>,

    /// Refresh tokens this many seconds before they expire.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
}

fn default_client_secret_env() -> String {
    "LB_SYNC_CLIENT_SECRET".to_string()
}

fn default_refresh_margin() -> u64 {
    30
}

/// Node inventory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Path to a `NodeList` JSON document.
    pub path: String,

    /// Annotation carrying the provider instance id.
    pub instance_id_annotation: String,

    /// Only register nodes that are Ready and schedulable.
    pub ready_only: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: "/var/run/lb-sync/nodes.json".to_string(),
            instance_id_annotation: "loadbalancer.io/instance-id".to_string(),
            ready_only: true,
        }
    }
}

/// Control loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Seconds between reconciliation ticks.
    pub interval_secs: u64,

    /// Base delay for exponential backoff after a failed pass, in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for exponential backoff, in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
        }
    }
}

/// A listener whose backend pool is managed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    pub load_balancer_id: String,

    pub listener_id: String,

    /// Backend port registered for every node.
    pub port: u16,
}

impl From<&ListenerConfig> for ListenerRef {
    fn from(config: &ListenerConfig) -> Self {
        ListenerRef::new(&config.load_balancer_id, &config.listener_id, config.port)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl SyncConfig {
    /// Listener references for every configured listener.
    pub fn listener_refs(&self) -> Vec<ListenerRef> {
        self.listeners.iter().map(ListenerRef::from).collect()
    }
}
