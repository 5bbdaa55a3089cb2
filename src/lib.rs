//! CAST AI resource bindings and provider plugin
//!
//! - [`resource`] - Typed resource and data source bindings over a generic engine
//! - [`runtime`] - Host contract, in-process host and test mocks
//! - [`provider`] - Provider plugin implementation backed by the CAST AI API
//! - [`castai`] - REST client
//! - [`config`] - `apiToken` / `apiUrl` resolution

pub mod castai;
pub mod config;
pub mod error;
pub mod provider;
pub mod resource;
pub mod runtime;

/// Version injected at compile time via CASTAI_PROVIDER_VERSION (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("CASTAI_PROVIDER_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

pub use config::{ConfigFile, ConfigOverrides, ProviderConfig};
pub use error::{ProviderError, Result};
pub use provider::{CastAiProvider, ProviderService};
pub use resource::{CustomResource, Inputs, Output, ResourceOptions};
pub use runtime::{Context, LocalMonitor, MockMonitor, ResourceMonitor};
