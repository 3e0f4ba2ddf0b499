//! Client core for Kubernetes/OpenShift-style API servers
//!
//! Resource types are discovered from the server at runtime, URLs are built
//! for both the legacy and the modern addressing conventions, and optional
//! behaviors are negotiated as capabilities.

pub mod api;
pub mod config;
pub mod error;
pub mod resource;

pub use api::ApiClient;
pub use config::Config;
pub use error::{Error, Result};
