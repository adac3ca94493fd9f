//! Configuration persistence and the typed env-var catalog.

pub mod env_catalog;
pub mod loader;
pub mod schema;

pub use env_catalog::{EnvVarSpec, CATALOG};
pub use loader::{default_config_path, load_config, load_default_config, save_config};
pub use schema::{AppConfig, ApprovalConfig, AuditConfig, ProviderConfig, SchedulerConfig, SecurityConfig, TokenConfig};
