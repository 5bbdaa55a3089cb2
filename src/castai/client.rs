//! CAST AI Client
//!
//! Main client for interacting with the CAST AI API, combining the resolved
//! provider configuration and the HTTP layer.

use super::http::CastAiHttpClient;
use crate::config::ProviderConfig;
use crate::error::Result;
use reqwest::Method;
use serde_json::Value;

/// Main CAST AI client
#[derive(Clone)]
pub struct CastAiClient {
    pub config: ProviderConfig,
    pub http: CastAiHttpClient,
}

impl CastAiClient {
    /// Create a new client; fails when no API token was resolved
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.require_token()?;
        let http = CastAiHttpClient::new(config.request_timeout())?;
        Ok(Self { config, http })
    }

    /// Send a request to an API path (`/v1/...`) relative to `apiUrl`
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.config.require_token()?;
        let url = self.url(path);
        self.http.request(method, &url, token, body).await
    }

    /// Build a full API URL from a path
    pub fn url(&self, path: &str) -> String {
        let base = self.config.api_url().as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> CastAiClient {
        CastAiClient::new(ProviderConfig::new(url, Some("token")).unwrap()).unwrap()
    }

    #[test]
    fn test_url_joins_path() {
        let c = client("https://api.cast.ai");
        assert_eq!(c.url("/v1/organizations"), "https://api.cast.ai/v1/organizations");
        assert_eq!(c.url("v1/organizations"), "https://api.cast.ai/v1/organizations");
    }

    #[test]
    fn test_new_requires_token() {
        let config = ProviderConfig::new("https://api.cast.ai", None).unwrap();
        assert!(CastAiClient::new(config).is_err());
    }
}
