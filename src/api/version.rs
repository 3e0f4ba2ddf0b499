//! Server version
//!
//! Best-effort probe of `GET /version`, consulted by capability factories.

use super::http::HttpTransport;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Version information reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerVersion {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
    #[serde(default)]
    pub git_version: String,
}

impl ServerVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major: major.to_string(),
            minor: minor.to_string(),
            git_version: format!("v{}.{}.0", major, minor),
        }
    }

    /// Numeric (major, minor); tolerates suffixes such as `"11+"`
    pub fn numeric(&self) -> Option<(u32, u32)> {
        let major = leading_number(&self.major).or_else(|| self.from_git_version().map(|v| v.0))?;
        let minor = leading_number(&self.minor).or_else(|| self.from_git_version().map(|v| v.1))?;
        Some((major, minor))
    }

    /// True if the server is at least `major.minor`
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        self.numeric().is_some_and(|v| v >= (major, minor))
    }

    fn from_git_version(&self) -> Option<(u32, u32)> {
        let mut parts = self.git_version.trim_start_matches('v').split('.');
        let major = leading_number(parts.next()?)?;
        let minor = leading_number(parts.next()?)?;
        Some((major, minor))
    }
}

fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Fetch the server version
pub async fn fetch_server_version(transport: &HttpTransport, base_url: &str) -> Result<ServerVersion> {
    let url = format!("{}/version", base_url.trim_end_matches('/'));
    transport.get_json(&url).await
}
