//! Error types shared by the binding engine, the provider and the HTTP client.

use thiserror::Error;

/// Errors surfaced by resource bindings, data sources and the provider.
///
/// The type is `Clone` because a single registration result is shared by
/// every `Output` that reads from it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Missing required property '{property}'")]
    MissingRequiredProperty { resource: String, property: String },

    #[error("unknown resource type {0}")]
    UnknownType(String),

    #[error("invalid value for property '{property}': {message}")]
    InvalidProperty { property: String, message: String },

    /// Remote rejection. `message` is the backend response body, unchanged.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource registration failed: {0}")]
    Registration(String),
}

impl ProviderError {
    pub fn missing(resource: &str, property: &str) -> Self {
        Self::MissingRequiredProperty {
            resource: resource.to_string(),
            property: property.to_string(),
        }
    }

    /// HTTP status carried by a remote rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
