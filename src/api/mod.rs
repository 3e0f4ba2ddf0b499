//! Cluster API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - Main client combining configuration, discovery and routing
//! - [`http`] - HTTP transport shared by discovery and requests
//! - [`version`] - Server version probe
//!
//! # Example
//!
//! ```ignore
//! use kubeclient::{ApiClient, Config};
//! use kubeclient::resource::ResourceIdentity;
//!
//! async fn example() -> kubeclient::Result<()> {
//!     let client = ApiClient::new(Config::load())?;
//!     let pods = client.list(&ResourceIdentity::new("Pod").namespace("ns1")).await?;
//!     println!("{} pods", pods.items.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod version;

pub use client::ApiClient;
pub use version::ServerVersion;
