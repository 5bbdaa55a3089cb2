//! HTTP utilities for CAST AI REST API calls

use crate::error::{ProviderError, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for CAST AI API calls
#[derive(Clone)]
pub struct CastAiHttpClient {
    client: Client,
}

impl CastAiHttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("castai-provider/{}", crate::VERSION))
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Send a request and decode the JSON response.
    ///
    /// Non-2xx answers become `ProviderError::Api` carrying the body verbatim.
    /// Empty bodies decode to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("{} {} (request {})", method, url, request_id);

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .header("X-API-Key", token)
            .header("X-Request-Id", &request_id)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Only the sanitized body goes to the log; the caller gets it unchanged.
            tracing::error!(
                "API error: {} {} -> {} - {}",
                method,
                url,
                status,
                sanitize_for_log(&response_body)
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response_body,
            });
        }

        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body)
            .map_err(|e| ProviderError::Decode(format!("Failed to parse response JSON: {}", e)))
    }

}

/// Format a CAST AI API error for terminal display.
/// The full backend message is kept; only non-printable characters are dropped.
pub fn format_api_error(error: &ProviderError) -> String {
    match error {
        ProviderError::Api { status, message } => {
            let hint = match status {
                401 => " (check apiToken)",
                403 => " (token lacks permission for this operation)",
                404 => " (resource not found)",
                409 => " (resource conflict)",
                429 => " (rate limited)",
                _ => "",
            };
            let cleaned: String = message
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .collect();
            format!("CAST AI API returned {}{}: {}", status, hint, cleaned)
        }
        other => other.to_string(),
    }
}
