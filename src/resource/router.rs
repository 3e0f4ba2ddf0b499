//! Request routing
//!
//! [`RequestRouter`] turns one logical operation into a concrete HTTP
//! exchange: resolve the endpoint, build the address, choose the body, call the
//! transport and hand the response body to a caller-supplied materialization
//! function. It also owns the client-level capability registry.

use super::address::EndpointAddressBuilder;
use super::capability::{
    Capability, CapabilityContext, CapabilityFactory, CapabilityKind, CapabilityRegistry,
    MaterializedResource,
};
use super::catalog::TypeCatalog;
use super::descriptor::{EndpointDescriptor, ResourceIdentity};
use super::kinds;
use super::materialize::Resource;
use crate::api::http::HttpTransport;
use crate::api::version::{fetch_server_version, ServerVersion};
use crate::error::{Error, Result};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Operation performed on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Patch,
    Delete,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Verb::Get | Verb::List => Method::GET,
            Verb::Create => Method::POST,
            Verb::Update => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }

    /// Read-only verbs never carry a body
    pub fn is_read_only(self) -> bool {
        matches!(self, Verb::Get | Verb::List)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body source
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Resource(Resource),
    Json(Value),
    Raw(Vec<u8>),
}

impl Payload {
    /// `apiVersion` declared by the payload itself
    pub fn api_version(&self) -> Option<&str> {
        match self {
            Payload::Resource(resource) => resource.api_version(),
            Payload::Json(value) => value.get("apiVersion").and_then(|v| v.as_str()),
            Payload::Raw(_) => None,
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Resource(resource) => Ok(serde_json::to_vec(resource)?),
            Payload::Json(value) => Ok(serde_json::to_vec(value)?),
            Payload::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

/// One logical remote operation
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub verb: Verb,
    pub kind: String,
    /// Explicit version; defaults to the payload's `apiVersion`
    pub version: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub subresource: Option<String>,
    pub payload: Option<Payload>,
    pub params: Vec<(String, String)>,
}

impl Request {
    pub fn new(verb: Verb, kind: impl Into<String>) -> Self {
        Self {
            verb,
            kind: kind.into(),
            version: None,
            namespace: None,
            name: None,
            subresource: None,
            payload: None,
            params: Vec::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = Some(subresource.into());
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Version used for resolution
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.payload.as_ref().and_then(Payload::api_version))
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity {
            kind: self.kind.clone(),
            version: self.effective_version().map(str::to_string),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            subresource: self.subresource.clone(),
        }
    }
}

/// A request whose address and body are final
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<u8>>,
    pub endpoint: EndpointDescriptor,
}

/// Generic CRUD dispatch over the discovered catalog
#[derive(Clone)]
pub struct RequestRouter {
    base_url: String,
    catalog: Arc<TypeCatalog>,
    transport: HttpTransport,
    factories: Arc<Vec<Arc<dyn CapabilityFactory>>>,
    server_version: Arc<OnceCell<Option<ServerVersion>>>,
    capabilities: Arc<OnceCell<CapabilityRegistry>>,
}

impl RequestRouter {
    pub fn new(
        base_url: &str,
        catalog: Arc<TypeCatalog>,
        transport: HttpTransport,
        factories: Vec<Arc<dyn CapabilityFactory>>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            catalog,
            transport,
            factories: Arc::new(factories),
            server_version: Arc::new(OnceCell::new()),
            capabilities: Arc::new(OnceCell::new()),
        }
    }

    /// Pin the server version instead of probing `/version`
    pub fn with_server_version(mut self, version: Option<ServerVersion>) -> Self {
        self.server_version = Arc::new(OnceCell::new_with(Some(version)));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Resolve the address and body of `request` without sending it
    pub async fn prepare(&self, request: &Request) -> Result<PreparedRequest> {
        if request.kind == kinds::LIST {
            return Err(Error::UnsupportedOperation {
                verb: request.verb.to_string(),
                kind: request.kind.clone(),
            });
        }

        let catalog = self.catalog.catalog().await;
        let builder = EndpointAddressBuilder::new(&self.base_url, &catalog)
            .kind(request.effective_version(), &request.kind)?
            .identity(&request.identity())
            .params(request.params.iter().cloned());
        let url = builder.build()?;
        let endpoint = builder
            .resolved_endpoint()
            .cloned()
            .ok_or_else(|| Error::UnsupportedEndpoint {
                kind: request.kind.clone(),
                version: request.effective_version().map(str::to_string),
            })?;

        let body = if request.verb.is_read_only() {
            None
        } else {
            match &request.payload {
                Some(payload) => Some(payload.to_body()?),
                None => Some(Vec::new()),
            }
        };

        Ok(PreparedRequest {
            method: request.verb.method(),
            url,
            body,
            endpoint,
        })
    }

    /// Execute `request` and materialize the response body
    pub async fn execute<T, F>(&self, request: &Request, materialize: F) -> Result<T>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        let prepared = self.prepare(request).await?;
        let body = self.send(prepared).await?;
        materialize(&body)
    }

    /// Execute on a spawned task and pass the outcome to `continuation`
    ///
    /// Completion order relative to other in-flight requests is unspecified.
    pub fn execute_with_callback<T, F, C>(
        &self,
        request: Request,
        materialize: F,
        continuation: C,
    ) -> tokio::task::JoinHandle<()>
    where
        T: Send + 'static,
        F: FnOnce(&str) -> Result<T> + Send + 'static,
        C: FnOnce(Result<T>) + Send + 'static,
    {
        let router = self.clone();
        tokio::spawn(async move {
            let result = router.execute(&request, materialize).await;
            continuation(result);
        })
    }

    async fn send(&self, prepared: PreparedRequest) -> Result<String> {
        let PreparedRequest {
            method, url, body, ..
        } = prepared;

        let response = self
            .transport
            .send(method, &url, body)
            .await
            .map_err(|source| Error::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(Error::from_response(&url, response.status, &response.body));
        }
        Ok(response.body)
    }

    /// Server version, probed once; `None` when the probe fails
    pub async fn server_version(&self) -> Option<ServerVersion> {
        self.server_version
            .get_or_init(|| async {
                match fetch_server_version(&self.transport, &self.base_url).await {
                    Ok(version) => Some(version),
                    Err(e) => {
                        tracing::warn!("Server version unavailable: {}", e);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Client-level capability registry
    pub async fn capabilities(&self) -> &CapabilityRegistry {
        self.capabilities
            .get_or_init(|| async {
                let context = CapabilityContext {
                    server_version: self.server_version().await,
                    catalog: Some(self.catalog.catalog().await),
                    ..Default::default()
                };
                CapabilityRegistry::new(self.factories.to_vec(), context)
            })
            .await
    }

    pub async fn supports(&self, kind: CapabilityKind) -> bool {
        self.capabilities().await.supports(kind)
    }

    pub async fn accept_if_supported<R, F>(&self, kind: CapabilityKind, visitor: F, fallback: R) -> R
    where
        F: FnOnce(&Capability) -> R,
    {
        self.capabilities()
            .await
            .accept_if_supported(kind, visitor, fallback)
    }

    /// Attach a capability registry to a materialized resource
    pub async fn with_capabilities(&self, resource: Resource) -> MaterializedResource {
        let catalog = self.catalog.catalog().await;
        let endpoint = resource
            .kind()
            .and_then(|kind| catalog.resolve(resource.api_version(), kind))
            .cloned();
        let context = CapabilityContext::for_resource(
            &resource,
            endpoint,
            self.server_version().await,
            Some(catalog),
        );
        MaterializedResource::new(resource, CapabilityRegistry::new(self.factories.to_vec(), context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::capability::default_factories;
    use crate::resource::catalog::tests::fixture_catalog;
    use serde_json::json;
    use std::time::Duration;

    const BASE: &str = "https://cluster.example";

    fn router() -> RequestRouter {
        let transport = HttpTransport::new("kubeclient-test", Duration::from_secs(1), None).unwrap();
        RequestRouter::new(
            BASE,
            Arc::new(TypeCatalog::from_catalog(fixture_catalog())),
            transport,
            default_factories(),
        )
        .with_server_version(Some(ServerVersion::new(1, 9)))
    }

    #[tokio::test]
    async fn test_list_kind_rejected_for_every_verb() {
        let router = router();
        for verb in [Verb::Get, Verb::List, Verb::Create, Verb::Update, Verb::Patch, Verb::Delete] {
            let err = router
                .execute(&Request::new(verb, "List"), |_| Ok(()))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::UnsupportedOperation { ref kind, .. } if kind == "List"));
        }
    }

    #[tokio::test]
    async fn test_unknown_kind_is_unsupported_endpoint() {
        let err = router()
            .prepare(&Request::new(Verb::Get, "Widget").name("w"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_read_only_verbs_have_no_body() {
        let prepared = router()
            .prepare(&Request::new(Verb::Get, "Deployment").version("apps/v1").namespace("ns1").name("d1"))
            .await
            .unwrap();
        assert_eq!(prepared.method, Method::GET);
        assert_eq!(prepared.url, format!("{}/apis/apps/v1/namespaces/ns1/deployments/d1", BASE));
        assert!(prepared.body.is_none());
    }

    #[tokio::test]
    async fn test_version_defaults_to_payload() {
        let payload = Resource::from_value(json!({
            "apiVersion": "v1beta1",
            "kind": "Pod",
            "metadata": {"name": "p1"}
        }))
        .unwrap();
        let prepared = router()
            .prepare(
                &Request::new(Verb::Create, "Pod")
                    .namespace("ns1")
                    .payload(Payload::Resource(payload.clone())),
            )
            .await
            .unwrap();
        assert_eq!(prepared.method, Method::POST);
        assert_eq!(prepared.url, format!("{}/api/v1beta1/pods?namespace=ns1", BASE));
        let body: Resource = serde_json::from_slice(prepared.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn test_write_without_payload_sends_empty_body() {
        let prepared = router()
            .prepare(
                &Request::new(Verb::Delete, "Pod")
                    .version("v1")
                    .namespace("ns1")
                    .name("p1")
                    .param("gracePeriodSeconds", "0"),
            )
            .await
            .unwrap();
        assert_eq!(prepared.method, Method::DELETE);
        assert_eq!(prepared.body, Some(Vec::new()));
        assert!(prepared.url.ends_with("/api/v1/namespaces/ns1/pods/p1?gracePeriodSeconds=0"));
    }

    #[tokio::test]
    async fn test_client_capabilities_use_pinned_server_version() {
        let router = router();
        assert_eq!(router.server_version().await, Some(ServerVersion::new(1, 9)));
        assert!(!router.supports(CapabilityKind::ProjectRequest).await);
        assert_eq!(
            router
                .accept_if_supported(CapabilityKind::PodLogs, |_| "yes", "no")
                .await,
            "no"
        );
    }

    #[tokio::test]
    async fn test_materialized_resource_capabilities() {
        let pod = Resource::from_value(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "p1"}}))
            .unwrap();
        let materialized = router().with_capabilities(pod).await;
        assert!(materialized.supports(CapabilityKind::PodLogs));
        assert_eq!(materialized.resource().name(), Some("p1"));
    }
}
