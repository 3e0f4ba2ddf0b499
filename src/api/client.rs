//! API Client
//!
//! Main client for talking to a cluster, wiring configuration, transport,
//! the discovered type catalog and the request router together.

use super::http::HttpTransport;
use super::version::ServerVersion;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resource::capability::{default_factories, CapabilityFactory, CapabilityKind, MaterializedResource};
use crate::resource::catalog::TypeCatalog;
use crate::resource::descriptor::ResourceIdentity;
use crate::resource::kinds;
use crate::resource::materialize::{MaterializerRegistry, Resource, ResourceList};
use crate::resource::router::{Payload, Request, RequestRouter, Verb};
use crate::resource::watch::{watch_address, WatchChannel, WatchListener};
use serde_json::Value;
use std::sync::Arc;

/// Main cluster client
#[derive(Clone)]
pub struct ApiClient {
    config: Config,
    router: RequestRouter,
    materializers: MaterializerRegistry,
}

impl ApiClient {
    /// Create a new client with the default capability factories
    pub fn new(config: Config) -> Result<Self> {
        Self::with_factories(config, default_factories())
    }

    /// Create a new client with a custom ordered set of capability factories
    pub fn with_factories(config: Config, factories: Vec<Arc<dyn CapabilityFactory>>) -> Result<Self> {
        let base_url = config.base_url()?;
        let transport = HttpTransport::new(
            &config.effective_user_agent(),
            config.effective_timeout(),
            config.token.clone(),
        )?;
        let catalog = Arc::new(TypeCatalog::new(transport.clone(), &base_url));
        let router = RequestRouter::new(&base_url, catalog, transport, factories);

        tracing::debug!("Client configured for {}", base_url);

        Ok(Self {
            config,
            router,
            materializers: MaterializerRegistry::new(),
        })
    }

    /// Replace the materializer registry
    pub fn with_materializers(mut self, materializers: MaterializerRegistry) -> Self {
        self.materializers = materializers;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        self.router.base_url()
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        self.router.catalog()
    }

    pub fn materializers(&self) -> &MaterializerRegistry {
        &self.materializers
    }

    /// Fetch one resource
    pub async fn get(&self, identity: &ResourceIdentity) -> Result<Resource> {
        let name = required_name(identity)?;
        let request = self.request(Verb::Get, identity).await?.name(name);
        self.router
            .execute(&request, |body| self.materializers.materialize_body(body))
            .await
    }

    /// Fetch a collection; items inherit `kind`/`apiVersion` from the envelope
    pub async fn list(&self, identity: &ResourceIdentity) -> Result<ResourceList> {
        let mut request = self.request(Verb::List, identity).await?;
        request.name = None;
        self.router
            .execute(&request, |body| self.materializers.materialize_list(body))
            .await
    }

    /// Create `resource`, in its own namespace unless one is given
    pub async fn create(&self, resource: &Resource, namespace: Option<&str>) -> Result<Resource> {
        let request = self.write_request(Verb::Create, resource, namespace).await?;
        self.router
            .execute(&request, |body| self.materializers.materialize_body(body))
            .await
    }

    /// Replace `resource`; its name is taken from its metadata
    pub async fn update(&self, resource: &Resource, namespace: Option<&str>) -> Result<Resource> {
        let name = resource
            .name()
            .ok_or_else(|| Error::Configuration("Cannot update a resource without a name".to_string()))?
            .to_string();
        let request = self
            .write_request(Verb::Update, resource, namespace)
            .await?
            .name(name);
        self.router
            .execute(&request, |body| self.materializers.materialize_body(body))
            .await
    }

    /// Delete one resource, returning whatever the server answered with
    pub async fn delete(&self, identity: &ResourceIdentity) -> Result<Value> {
        let name = required_name(identity)?;
        let request = self.request(Verb::Delete, identity).await?.name(name);
        self.router
            .execute(&request, |body| {
                if body.trim().is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(serde_json::from_str(body)?)
                }
            })
            .await
    }

    /// Address of a watch on `identity`, resuming after `list` when given
    pub async fn watch_url(&self, identity: &ResourceIdentity, list: Option<&ResourceList>) -> Result<String> {
        if identity.kind == kinds::LIST {
            return Err(Error::UnsupportedOperation {
                verb: "watch".to_string(),
                kind: identity.kind.clone(),
            });
        }
        let namespace = self.namespace_for(identity).await;
        let catalog = self.catalog().catalog().await;
        watch_address(
            self.base_url(),
            &catalog,
            identity.version.as_deref(),
            &identity.kind,
            namespace.as_deref(),
            list,
        )
    }

    /// Channel state for a watch on `identity` delivering to `listener`
    pub async fn watch_channel<L: WatchListener>(
        &self,
        identity: &ResourceIdentity,
        list: Option<&ResourceList>,
        listener: L,
    ) -> Result<WatchChannel<L>> {
        let url = self.watch_url(identity, list).await?;
        Ok(WatchChannel::new(url, listener, self.materializers.clone()))
    }

    /// Server version, probed once
    pub async fn server_version(&self) -> Option<ServerVersion> {
        self.router.server_version().await
    }

    /// True if the client-level registry holds `kind`
    pub async fn supports(&self, kind: CapabilityKind) -> bool {
        self.router.supports(kind).await
    }

    /// Attach the capabilities applicable to `resource`
    pub async fn capabilities_for(&self, resource: Resource) -> MaterializedResource {
        self.router.with_capabilities(resource).await
    }

    /// The aggregate `List` kind is rejected before the catalog is consulted
    async fn request(&self, verb: Verb, identity: &ResourceIdentity) -> Result<Request> {
        if identity.kind == kinds::LIST {
            return Err(Error::UnsupportedOperation {
                verb: verb.to_string(),
                kind: identity.kind.clone(),
            });
        }
        let mut request = Request::new(verb, identity.kind.clone());
        request.version = identity.version.clone();
        request.namespace = self.namespace_for(identity).await;
        request.subresource = identity.subresource.clone();
        Ok(request)
    }

    async fn write_request(&self, verb: Verb, resource: &Resource, namespace: Option<&str>) -> Result<Request> {
        let kind = resource
            .kind()
            .ok_or_else(|| Error::Configuration("Resource has no kind".to_string()))?;
        let mut identity = ResourceIdentity::new(kind);
        identity.version = resource.api_version().map(str::to_string);
        identity.namespace = namespace.or(resource.namespace()).map(str::to_string);

        Ok(self
            .request(verb, &identity)
            .await?
            .payload(Payload::Resource(resource.clone())))
    }

    /// Explicit namespace, else the configured default for namespaced kinds
    async fn namespace_for(&self, identity: &ResourceIdentity) -> Option<String> {
        if identity.namespace.is_some() {
            return identity.namespace.clone();
        }
        if kinds::is_namespace_root(&identity.kind) {
            return None;
        }
        let endpoint = self
            .catalog()
            .resolve(identity.version.as_deref(), &identity.kind)
            .await?;
        endpoint
            .namespaced
            .then(|| self.config.effective_namespace())
    }
}

fn required_name(identity: &ResourceIdentity) -> Result<String> {
    identity
        .name
        .clone()
        .ok_or_else(|| Error::Configuration(format!("A name is required for {}", identity.kind)))
}
