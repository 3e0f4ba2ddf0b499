//! Capability negotiation
//!
//! Optional behavior (pod logs, exec, scaling, build and deployment triggers,
//! ...) depends on what the server exposes. A [`CapabilityRegistry`] evaluates
//! an ordered list of [`CapabilityFactory`]s against a [`CapabilityContext`]
//! the first time it is queried and keeps the resulting record for its
//! owner's lifetime. Factories that do not apply contribute nothing; when two
//! factories produce the same [`CapabilityKind`], the one registered first wins.

use super::catalog::Catalog;
use super::descriptor::EndpointDescriptor;
use super::kinds;
use super::materialize::Resource;
use crate::api::version::ServerVersion;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// Annotation naming the tool that generated a resource
pub const GENERATED_BY_ANNOTATION: &str = "openshift.io/generated-by";
/// Annotation naming the template a resource was instantiated from
pub const TEMPLATE_ANNOTATION: &str = "openshift.io/template.name";

/// Closed set of negotiable capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    PodLogs,
    PodExec,
    PortForward,
    Scale,
    BuildTrigger,
    BinaryBuild,
    DeploymentTrigger,
    ProjectRequest,
    Traceability,
}

/// How a deployment is re-triggered on this server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// POST to the `instantiate` sub-resource
    Instantiate,
    /// Update the object with an incremented `latestVersion`
    LatestVersionBump,
}

/// A negotiated capability implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Behavior exposed through a sub-resource of the owning endpoint
    Subresource {
        kind: CapabilityKind,
        subresource: String,
    },
    DeploymentTrigger { mode: TriggerMode },
    /// Self-provisioning of projects through `ProjectRequest`
    ProjectRequest { api_version: String },
    /// Provenance recorded in resource annotations
    Traceability {
        generated_by: Option<String>,
        template: Option<String>,
    },
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Subresource { kind, .. } => *kind,
            Capability::DeploymentTrigger { .. } => CapabilityKind::DeploymentTrigger,
            Capability::ProjectRequest { .. } => CapabilityKind::ProjectRequest,
            Capability::Traceability { .. } => CapabilityKind::Traceability,
        }
    }

    /// Sub-resource to address when exercising this capability
    pub fn subresource(&self) -> Option<&str> {
        match self {
            Capability::Subresource { subresource, .. } => Some(subresource),
            Capability::DeploymentTrigger {
                mode: TriggerMode::Instantiate,
            } => Some("instantiate"),
            _ => None,
        }
    }
}

/// Everything a factory may inspect when deciding whether it applies
#[derive(Debug, Clone, Default)]
pub struct CapabilityContext {
    /// Kind of the owning resource; `None` for client-level registries
    pub kind: Option<String>,
    pub endpoint: Option<EndpointDescriptor>,
    pub annotations: BTreeMap<String, String>,
    pub server_version: Option<ServerVersion>,
    pub catalog: Option<Arc<Catalog>>,
}

impl CapabilityContext {
    /// Context of a materialized resource
    pub fn for_resource(
        resource: &Resource,
        endpoint: Option<EndpointDescriptor>,
        server_version: Option<ServerVersion>,
        catalog: Option<Arc<Catalog>>,
    ) -> Self {
        Self {
            kind: resource.kind().map(str::to_string),
            endpoint,
            annotations: resource.annotations(),
            server_version,
            catalog,
        }
    }

    fn endpoint_supports(&self, subresource: &str) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|e| e.is_supported(subresource))
    }

    fn kind_is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

/// Decides whether one capability applies and builds it
pub trait CapabilityFactory: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    fn create(&self, context: &CapabilityContext) -> Option<Capability>;
}

/// Applies when the owning endpoint lists `subresource`
pub struct SubresourceFactory {
    kind: CapabilityKind,
    subresource: &'static str,
    /// Restrict to one resource kind
    resource_kind: Option<&'static str>,
}

impl SubresourceFactory {
    pub fn new(kind: CapabilityKind, subresource: &'static str) -> Self {
        Self {
            kind,
            subresource,
            resource_kind: None,
        }
    }

    pub fn for_kind(mut self, resource_kind: &'static str) -> Self {
        self.resource_kind = Some(resource_kind);
        self
    }
}

impl CapabilityFactory for SubresourceFactory {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    fn create(&self, context: &CapabilityContext) -> Option<Capability> {
        if let Some(resource_kind) = self.resource_kind {
            if !context.kind_is(resource_kind) {
                return None;
            }
        }
        context
            .endpoint_supports(self.subresource)
            .then(|| Capability::Subresource {
                kind: self.kind,
                subresource: self.subresource.to_string(),
            })
    }
}

/// Deployment re-triggering; servers before 1.5 lack `instantiate`
pub struct DeploymentTriggerFactory;

impl CapabilityFactory for DeploymentTriggerFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::DeploymentTrigger
    }

    fn create(&self, context: &CapabilityContext) -> Option<Capability> {
        if !context.kind_is(kinds::DEPLOYMENT_CONFIG) {
            return None;
        }
        if context.endpoint_supports("instantiate") {
            return Some(Capability::DeploymentTrigger {
                mode: TriggerMode::Instantiate,
            });
        }
        match &context.server_version {
            Some(version) if version.numeric().is_some() && !version.at_least(1, 5) => {
                Some(Capability::DeploymentTrigger {
                    mode: TriggerMode::LatestVersionBump,
                })
            }
            _ => None,
        }
    }
}

/// Applies when the catalog serves `ProjectRequest`
pub struct ProjectRequestFactory;

impl CapabilityFactory for ProjectRequestFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::ProjectRequest
    }

    fn create(&self, context: &CapabilityContext) -> Option<Capability> {
        let endpoint = context.catalog.as_ref()?.resolve(None, "ProjectRequest")?;
        Some(Capability::ProjectRequest {
            api_version: endpoint.api_version(),
        })
    }
}

/// Applies when provenance annotations are present
pub struct TraceabilityFactory;

impl CapabilityFactory for TraceabilityFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Traceability
    }

    fn create(&self, context: &CapabilityContext) -> Option<Capability> {
        let generated_by = context.annotations.get(GENERATED_BY_ANNOTATION).cloned();
        let template = context.annotations.get(TEMPLATE_ANNOTATION).cloned();
        if generated_by.is_none() && template.is_none() {
            return None;
        }
        Some(Capability::Traceability {
            generated_by,
            template,
        })
    }
}

/// Built-in factories in evaluation order
pub fn default_factories() -> Vec<Arc<dyn CapabilityFactory>> {
    vec![
        Arc::new(SubresourceFactory::new(CapabilityKind::PodLogs, "log").for_kind(kinds::POD)),
        Arc::new(SubresourceFactory::new(CapabilityKind::PodLogs, "log").for_kind(kinds::BUILD_CONFIG)),
        Arc::new(SubresourceFactory::new(CapabilityKind::PodExec, "exec").for_kind(kinds::POD)),
        Arc::new(SubresourceFactory::new(CapabilityKind::PortForward, "portforward").for_kind(kinds::POD)),
        Arc::new(SubresourceFactory::new(CapabilityKind::Scale, "scale")),
        Arc::new(
            SubresourceFactory::new(CapabilityKind::BuildTrigger, "instantiate")
                .for_kind(kinds::BUILD_CONFIG),
        ),
        Arc::new(
            SubresourceFactory::new(CapabilityKind::BinaryBuild, "instantiatebinary")
                .for_kind(kinds::BUILD_CONFIG),
        ),
        Arc::new(DeploymentTriggerFactory),
        Arc::new(ProjectRequestFactory),
        Arc::new(TraceabilityFactory),
    ]
}

/// Lazily populated capability record of one client or resource
pub struct CapabilityRegistry {
    factories: Vec<Arc<dyn CapabilityFactory>>,
    context: CapabilityContext,
    record: OnceLock<HashMap<CapabilityKind, Capability>>,
}

impl CapabilityRegistry {
    pub fn new(factories: Vec<Arc<dyn CapabilityFactory>>, context: CapabilityContext) -> Self {
        Self {
            factories,
            context,
            record: OnceLock::new(),
        }
    }

    fn record(&self) -> &HashMap<CapabilityKind, Capability> {
        self.record.get_or_init(|| {
            let mut record = HashMap::new();
            for factory in &self.factories {
                if record.contains_key(&factory.kind()) {
                    continue;
                }
                if let Some(capability) = factory.create(&self.context) {
                    record.insert(capability.kind(), capability);
                }
            }
            tracing::debug!(
                "Capabilities for {}: {:?}",
                self.context.kind.as_deref().unwrap_or("client"),
                record.keys().collect::<Vec<_>>()
            );
            record
        })
    }

    pub fn is_populated(&self) -> bool {
        self.record.get().is_some()
    }

    pub fn supports(&self, kind: CapabilityKind) -> bool {
        self.record().contains_key(&kind)
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<&Capability> {
        self.record().get(&kind)
    }

    /// Run `visitor` on the capability if present, otherwise return `fallback`
    pub fn accept_if_supported<R, F>(&self, kind: CapabilityKind, visitor: F, fallback: R) -> R
    where
        F: FnOnce(&Capability) -> R,
    {
        match self.get(kind) {
            Some(capability) => visitor(capability),
            None => fallback,
        }
    }

    /// Supported kinds, sorted
    pub fn kinds(&self) -> Vec<CapabilityKind> {
        let mut kinds: Vec<_> = self.record().keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn context(&self) -> &CapabilityContext {
        &self.context
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("factories", &self.factories.len())
            .field("context", &self.context)
            .field("record", &self.record.get())
            .finish()
    }
}

/// A resource together with its negotiated capabilities
#[derive(Debug)]
pub struct MaterializedResource {
    resource: Resource,
    capabilities: CapabilityRegistry,
}

impl MaterializedResource {
    pub fn new(resource: Resource, capabilities: CapabilityRegistry) -> Self {
        Self {
            resource,
            capabilities,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn into_resource(self) -> Resource {
        self.resource
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn supports(&self, kind: CapabilityKind) -> bool {
        self.capabilities.supports(kind)
    }

    pub fn accept_if_supported<R, F>(&self, kind: CapabilityKind, visitor: F, fallback: R) -> R
    where
        F: FnOnce(&Capability) -> R,
    {
        self.capabilities.accept_if_supported(kind, visitor, fallback)
    }
}
