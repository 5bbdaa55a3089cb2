//! CAST AI API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - Main client bound to a resolved [`ProviderConfig`](crate::config::ProviderConfig)
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use castai_provider::castai::client::CastAiClient;
//! use castai_provider::config::ProviderConfig;
//! use reqwest::Method;
//!
//! async fn example() -> castai_provider::Result<()> {
//!     let client = CastAiClient::new(ProviderConfig::new("https://api.cast.ai", Some("token"))?)?;
//!     let orgs = client.request(Method::GET, "/v1/organizations", None).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;

pub use client::CastAiClient;
pub use http::{format_api_error, CastAiHttpClient};
