//! Type catalog
//!
//! [`TypeCatalog`] discovers the server's endpoints and types exactly once, on
//! the first resolution request, and answers every later query from an
//! immutable [`Catalog`] snapshot. Concurrent first callers share a single
//! discovery round-trip and all of them observe the completed snapshot.
//!
//! Resolution of an ambiguous `(kind, None)` pair is decided by discovery
//! order: legacy surfaces (in [`LEGACY_SURFACES`](super::kinds::LEGACY_SURFACES)
//! order) come before grouped APIs (in the order the server lists them).

use super::descriptor::{
    ApiGroupDescriptor, EndpointDescriptor, EndpointKey, TypeDescriptor, TypeKey, VersionSelector,
};
use super::discovery::{self, ResourceListDocument, SurfaceVersion};
use super::kinds::{self, GROUPED_PREFIX};
use super::materialize::Resource;
use crate::api::http::HttpTransport;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Immutable result of discovery
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<ApiGroupDescriptor>,
    endpoints: Vec<EndpointDescriptor>,
    endpoint_index: HashMap<EndpointKey, usize>,
    types: Vec<TypeDescriptor>,
    type_index: HashMap<TypeKey, usize>,
    plurals: HashMap<TypeKey, String>,
}

impl Catalog {
    /// Discovered surfaces in discovery order
    pub fn groups(&self) -> &[ApiGroupDescriptor] {
        &self.groups
    }

    /// Discovered endpoints in discovery order
    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty() && self.types.is_empty()
    }

    /// Resolve the endpoint serving `kind` at `version`
    ///
    /// A bare version (or group name) scans endpoints in discovery order; an
    /// explicit `group/version` is an exact identity lookup.
    pub fn resolve(&self, version: Option<&str>, kind: &str) -> Option<&EndpointDescriptor> {
        match VersionSelector::parse(version) {
            VersionSelector::Any => self.endpoints.iter().find(|e| e.matches_kind(kind)),
            VersionSelector::Single(segment) => self.endpoints.iter().find(|e| {
                e.matches_kind(kind)
                    && (e.version == segment || e.group_name.as_deref() == Some(segment))
            }),
            VersionSelector::Grouped { group, version } => {
                let key = EndpointKey {
                    address_prefix: GROUPED_PREFIX.to_string(),
                    group_name: Some(group.to_string()),
                    version: version.to_string(),
                    plural_name: self.plural_for(kind, Some(group), version),
                };
                self.endpoint_index.get(&key).map(|&i| &self.endpoints[i])
            }
        }
    }

    /// Resolve the type descriptor for `kind` at `version`, ignoring plurals
    pub fn resolve_type(&self, version: Option<&str>, kind: &str) -> Option<&TypeDescriptor> {
        match VersionSelector::parse(version) {
            VersionSelector::Any => self.types.iter().find(|t| t.kind == kind),
            VersionSelector::Single(segment) => self.types.iter().find(|t| {
                t.kind == kind && (t.version == segment || t.group_name.as_deref() == Some(segment))
            }),
            VersionSelector::Grouped { group, version } => {
                let key = TypeKey {
                    group_name: Some(group.to_string()),
                    version: version.to_string(),
                    kind: kind.to_string(),
                };
                self.type_index.get(&key).map(|&i| &self.types[i])
            }
        }
    }

    pub fn is_supported(&self, kind: &str, version: Option<&str>) -> bool {
        self.resolve(version, kind).is_some()
    }

    /// Plural name discovered for `kind`, or the suffix-rule plural
    pub fn plural_for(&self, kind: &str, group: Option<&str>, version: &str) -> String {
        let key = TypeKey {
            group_name: group.map(str::to_string),
            version: version.to_string(),
            kind: kind.to_string(),
        };
        self.plurals
            .get(&key)
            .cloned()
            .unwrap_or_else(|| kinds::pluralize(kind))
    }
}

/// Accumulates discovery documents into a [`Catalog`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: ApiGroupDescriptor) {
        let exists = self.catalog.groups.iter().any(|g| {
            g.address_prefix == group.address_prefix && g.group_name == group.group_name
        });
        if !exists {
            self.catalog.groups.push(group);
        }
    }

    /// Merge one surface/version resource list
    ///
    /// Base entries are merged before sub-resource entries so a capability
    /// suffix always finds its base endpoint regardless of listing order.
    pub fn add_resource_list(&mut self, surface: &SurfaceVersion, list: &ResourceListDocument) {
        let (bases, suffixed): (Vec<_>, Vec<_>) = list
            .resources
            .iter()
            .partition(|entry| entry.split_name().1.is_none());

        for entry in bases {
            self.add_type(surface, entry.group.as_deref(), entry.version.as_deref(), &entry.kind);

            if entry.verbs.is_empty() {
                continue;
            }

            self.catalog
                .plurals
                .entry(TypeKey {
                    group_name: surface.group_name.clone(),
                    version: surface.version.clone(),
                    kind: entry.kind.clone(),
                })
                .or_insert_with(|| entry.name.clone());

            let endpoint = EndpointDescriptor {
                address_prefix: surface.address_prefix.clone(),
                group_name: surface.group_name.clone(),
                version: surface.version.clone(),
                plural_name: entry.name.clone(),
                kind: entry.kind.clone(),
                namespaced: entry.namespaced,
                verbs: entry.verbs.clone(),
                capabilities: BTreeSet::new(),
            };
            self.merge_endpoint(endpoint);
        }

        for entry in suffixed {
            let (base, suffix) = entry.split_name();
            self.add_type(surface, entry.group.as_deref(), entry.version.as_deref(), &entry.kind);

            let Some(suffix) = suffix else { continue };
            let key = EndpointKey {
                address_prefix: surface.address_prefix.clone(),
                group_name: surface.group_name.clone(),
                version: surface.version.clone(),
                plural_name: base.to_string(),
            };
            match self.catalog.endpoint_index.get(&key) {
                Some(&i) => {
                    self.catalog.endpoints[i].capabilities.insert(suffix.to_string());
                }
                None => tracing::debug!(
                    "Ignoring capability {} for unknown endpoint {}/{}",
                    suffix,
                    surface.path(),
                    base
                ),
            }
        }
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }

    fn merge_endpoint(&mut self, endpoint: EndpointDescriptor) {
        let key = endpoint.key();
        match self.catalog.endpoint_index.get(&key) {
            Some(&i) => {
                let existing = &mut self.catalog.endpoints[i];
                for verb in endpoint.verbs {
                    if !existing.verbs.contains(&verb) {
                        existing.verbs.push(verb);
                    }
                }
            }
            None => {
                self.catalog
                    .endpoint_index
                    .insert(key, self.catalog.endpoints.len());
                self.catalog.endpoints.push(endpoint);
            }
        }
    }

    fn add_type(
        &mut self,
        surface: &SurfaceVersion,
        group: Option<&str>,
        version: Option<&str>,
        kind: &str,
    ) {
        if kind.is_empty() {
            return;
        }
        // Entries may declare the group/version of the type they return
        let group_name = match group.filter(|g| !g.is_empty()) {
            Some(group) => Some(group.to_string()),
            None if version.is_some_and(|v| !v.is_empty()) => None,
            None => surface.group_name.clone(),
        };
        let descriptor = TypeDescriptor {
            address_prefix: if group_name.is_some() {
                GROUPED_PREFIX.to_string()
            } else {
                surface.address_prefix.clone()
            },
            group_name,
            version: version
                .filter(|v| !v.is_empty())
                .unwrap_or(surface.version.as_str())
                .to_string(),
            kind: kind.to_string(),
        };

        let key = descriptor.key();
        if !self.catalog.type_index.contains_key(&key) {
            self.catalog.type_index.insert(key, self.catalog.types.len());
            self.catalog.types.push(descriptor);
        }
    }
}

/// Lazily discovered, shared catalog of endpoints and types
pub struct TypeCatalog {
    transport: Option<HttpTransport>,
    base_url: String,
    preferred_versions: HashMap<String, String>,
    catalog: OnceCell<Arc<Catalog>>,
}

impl TypeCatalog {
    /// Catalog that discovers against `base_url` on first use
    pub fn new(transport: HttpTransport, base_url: &str) -> Self {
        Self {
            transport: Some(transport),
            base_url: base_url.trim_end_matches('/').to_string(),
            preferred_versions: seeded_preferred_versions(),
            catalog: OnceCell::new(),
        }
    }

    /// Catalog backed by an already built snapshot; never performs I/O
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            transport: None,
            base_url: String::new(),
            preferred_versions: seeded_preferred_versions(),
            catalog: OnceCell::new_with(Some(Arc::new(catalog))),
        }
    }

    /// The snapshot, running discovery first if it has not happened yet
    pub async fn catalog(&self) -> Arc<Catalog> {
        self.catalog
            .get_or_init(|| async {
                match &self.transport {
                    Some(transport) => Arc::new(discovery::discover(transport, &self.base_url).await),
                    None => Arc::new(Catalog::default()),
                }
            })
            .await
            .clone()
    }

    /// True once discovery has committed
    pub fn is_discovered(&self) -> bool {
        self.catalog.initialized()
    }

    pub async fn resolve(&self, version: Option<&str>, kind: &str) -> Option<EndpointDescriptor> {
        self.catalog().await.resolve(version, kind).cloned()
    }

    pub async fn resolve_type(&self, version: Option<&str>, kind: &str) -> Option<TypeDescriptor> {
        self.catalog().await.resolve_type(version, kind).cloned()
    }

    pub async fn is_supported(&self, kind: &str, version: Option<&str>) -> bool {
        self.catalog().await.is_supported(kind, version)
    }

    /// True if the resource's own kind and `apiVersion` resolve
    pub async fn is_supported_resource(&self, resource: &Resource) -> bool {
        match resource.kind() {
            Some(kind) => self.is_supported(kind, resource.api_version()).await,
            None => false,
        }
    }

    /// Static fallback version for a surface, independent of discovery
    pub fn preferred_version_for(&self, surface_id: &str) -> Option<&str> {
        self.preferred_versions.get(surface_id).map(String::as_str)
    }
}

fn seeded_preferred_versions() -> HashMap<String, String> {
    kinds::preferred_versions()
        .map(|(surface, version)| (surface.to_string(), version.to_string()))
        .collect()
}
