//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SyncConfig (validated, immutable)
//!     → lifecycle::startup builds registry, inventory, controller
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets are referenced by environment variable name, never stored inline

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::SyncConfig;
pub use schema::{AuthConfig, InventoryConfig, ListenerConfig, ObservabilityConfig, ReconcileConfig, RegistryConfig};
