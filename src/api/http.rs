//! HTTP transport for REST API calls

use crate::error::{Error, Result};
use reqwest::{Client, Method};
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Status and body of a completed exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client wrapper shared by discovery and the request router
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(user_agent: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, token })
    }

    /// Perform one request; only I/O failures are errors here
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> std::result::Result<RawResponse, reqwest::Error> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} {} - {}", method, status, sanitize_for_log(&body));
        }

        Ok(RawResponse { status, body })
    }

    /// GET a JSON document, mapping every failure into the error taxonomy
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .send(Method::GET, url, None)
            .await
            .map_err(|source| Error::Transport {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(Error::from_response(url, response.status, &response.body));
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}

/// Format an API error for display
pub fn format_api_error(error: &Error) -> String {
    match error {
        Error::Unauthorized { .. } => {
            "Authentication failed. Check the configured bearer token.".to_string()
        }
        Error::Forbidden { .. } => "Permission denied for this resource.".to_string(),
        Error::ServerRejection { status, .. } if status.code == 404 => {
            "Resource not found.".to_string()
        }
        Error::ServerRejection { status, .. } if status.code == 409 => {
            "Resource conflict. The resource may already exist or have been modified.".to_string()
        }
        Error::ServerRejection { status, .. } if status.code >= 500 => {
            "Server temporarily unavailable. Please try again.".to_string()
        }
        Error::Transport { .. } => {
            "Request failed. Check your network connection and the server address.".to_string()
        }
        other => {
            let text = other.to_string();
            let sanitized = text
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(120)
                .collect::<String>();
            if sanitized.len() < text.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let logged = sanitize_for_log(&body);
        assert!(logged.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(logged.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_format_api_error_messages() {
        let not_found = Error::ServerRejection {
            url: "u".into(),
            status: Status {
                code: 404,
                message: "gone".into(),
                reason: "NotFound".into(),
            },
        };
        assert_eq!(format_api_error(&not_found), "Resource not found.");

        let forbidden = Error::Forbidden {
            url: "u".into(),
            message: "no".into(),
        };
        assert_eq!(format_api_error(&forbidden), "Permission denied for this resource.");
    }
}
