//! Resource abstraction layer
//!
//! Everything the client knows about server resources is discovered at
//! runtime rather than compiled in.
//!
//! # Architecture
//!
//! - [`discovery`] - Walks the legacy and grouped API surfaces
//! - [`catalog`] - Lazily discovered lookup of endpoints and types
//! - [`address`] - Builds endpoint URLs for both address conventions
//! - [`router`] - Dispatches CRUD requests through the catalog
//! - [`capability`] - Optional per-resource and per-client behaviors
//! - [`materialize`] - Turns response bodies into typed resources
//! - [`watch`] - Watch addressing and event decoding
//!
//! # Example
//!
//! ```ignore
//! use kubeclient::resource::{Request, RequestRouter, Verb};
//!
//! async fn get_pod(router: &RequestRouter) -> kubeclient::Result<String> {
//!     let request = Request::new(Verb::Get, "Pod").namespace("ns1").name("p1");
//!     router.execute(&request, |body| Ok(body.to_string())).await
//! }
//! ```

pub mod address;
pub mod capability;
pub mod catalog;
pub mod descriptor;
pub mod discovery;
pub mod kinds;
pub mod materialize;
pub mod router;
pub mod watch;

pub use address::{AddressConvention, EndpointAddressBuilder};
pub use capability::{Capability, CapabilityFactory, CapabilityKind, CapabilityRegistry, MaterializedResource};
pub use catalog::{Catalog, TypeCatalog};
pub use descriptor::{ApiGroupDescriptor, EndpointDescriptor, ResourceIdentity, TypeDescriptor};
pub use materialize::{MaterializerRegistry, Resource, ResourceList};
pub use router::{Payload, Request, RequestRouter, Verb};
pub use watch::{ChangeType, WatchChannel, WatchEvent, WatchListener};
