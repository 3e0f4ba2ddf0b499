//! Endpoint address builder
//!
//! Assembles the URL of one resource, collection or sub-resource. The address
//! convention depends only on the resolved endpoint's API version:
//!
//! - legacy (ungrouped `v1beta1`, `v1beta2`): `{base}/{prefix}/{version}[/watch]/{plural}[/{name}][/{sub}]?namespace={ns}&...`
//! - modern: `{base}/{prefix}[/{group}]/{version}[/watch][/namespaces/{ns}]/{plural}[/{name}][/{sub}][?...]`

use super::catalog::Catalog;
use super::descriptor::{EndpointDescriptor, ResourceIdentity};
use super::kinds;
use crate::error::{Error, Result};

/// Versions addressed with the namespace passed as a query parameter
const LEGACY_VERSIONS: &[&str] = &["v1beta1", "v1beta2"];

const NAMESPACE_PARAM: &str = "namespace";

/// Addressing scheme of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressConvention {
    /// Namespace as a query parameter
    Legacy,
    /// Namespace as a path segment
    Modern,
}

impl AddressConvention {
    /// Convention of a full API version; `group/version` is always modern
    pub fn for_version(api_version: &str) -> Self {
        if LEGACY_VERSIONS.contains(&api_version) {
            AddressConvention::Legacy
        } else {
            AddressConvention::Modern
        }
    }

    pub fn for_endpoint(endpoint: &EndpointDescriptor) -> Self {
        Self::for_version(&endpoint.api_version())
    }
}

/// Whether the namespace belongs in the address of `endpoint`
fn scopes_namespace(endpoint: &EndpointDescriptor) -> bool {
    endpoint.namespaced && !kinds::is_namespace_root(&endpoint.kind)
}

/// Per-call URL builder; resolve the kind first, then accumulate the address
#[derive(Debug, Clone)]
pub struct EndpointAddressBuilder<'a> {
    base_url: String,
    catalog: &'a Catalog,
    endpoint: Option<EndpointDescriptor>,
    name: Option<String>,
    namespace: Option<String>,
    subresource: Option<String>,
    watch: bool,
    params: Vec<(String, String)>,
}

impl<'a> EndpointAddressBuilder<'a> {
    pub fn new(base_url: &str, catalog: &'a Catalog) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            catalog,
            endpoint: None,
            name: None,
            namespace: None,
            subresource: None,
            watch: false,
            params: Vec::new(),
        }
    }

    /// Resolve `kind` at `version`; unknown kinds fail immediately
    pub fn kind(mut self, version: Option<&str>, kind: &str) -> Result<Self> {
        let endpoint = self
            .catalog
            .resolve(version, kind)
            .ok_or_else(|| Error::UnsupportedEndpoint {
                kind: kind.to_string(),
                version: version.map(str::to_string),
            })?;
        self.endpoint = Some(endpoint.clone());
        Ok(self)
    }

    /// Use an endpoint resolved elsewhere
    pub fn endpoint(mut self, endpoint: EndpointDescriptor) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|n: &String| !n.is_empty());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into()).filter(|n: &String| !n.is_empty());
        self
    }

    pub fn subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = Some(subresource.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Append a query parameter; repeated keys are kept in insertion order
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Apply every field of a caller-supplied identity except its kind
    pub fn identity(mut self, identity: &ResourceIdentity) -> Self {
        if let Some(namespace) = &identity.namespace {
            self = self.namespace(namespace.clone());
        }
        if let Some(name) = &identity.name {
            self = self.name(name.clone());
        }
        if let Some(subresource) = &identity.subresource {
            self = self.subresource(subresource.clone());
        }
        self
    }

    pub fn resolved_endpoint(&self) -> Option<&EndpointDescriptor> {
        self.endpoint.as_ref()
    }

    /// Assemble the URL
    pub fn build(&self) -> Result<String> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            Error::Configuration("No kind set on the endpoint address builder".to_string())
        })?;

        let mut segments: Vec<String> = vec![endpoint.address_prefix.clone()];
        let mut query: Vec<(&str, &str)> = Vec::new();

        match AddressConvention::for_endpoint(endpoint) {
            AddressConvention::Legacy => {
                segments.push(endpoint.version.clone());
                if self.watch {
                    segments.push("watch".to_string());
                }
                if let Some(namespace) = self.namespace.as_ref().filter(|_| scopes_namespace(endpoint)) {
                    query.push((NAMESPACE_PARAM, namespace.as_str()));
                }
            }
            AddressConvention::Modern => {
                if let Some(group) = &endpoint.group_name {
                    segments.push(group.clone());
                }
                segments.push(endpoint.version.clone());
                if self.watch {
                    segments.push("watch".to_string());
                }
                if let Some(namespace) = self.namespace.as_ref().filter(|_| scopes_namespace(endpoint)) {
                    segments.push("namespaces".to_string());
                    segments.push(urlencoding::encode(namespace).into_owned());
                }
            }
        }

        segments.push(endpoint.plural_name.clone());
        if let Some(name) = &self.name {
            segments.push(urlencoding::encode(name).into_owned());
        }
        if let Some(subresource) = &self.subresource {
            segments.push(subresource.clone());
        }

        query.extend(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let mut url = format!("{}/{}", self.base_url, segments.join("/"));
        if !query.is_empty() {
            let parts: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&parts.join("&"));
        }
        Ok(url)
    }
}

/// Recover the identity addressed by `url`, using the endpoint's convention
///
/// Returns `None` when the URL does not belong to `endpoint`.
pub fn extract_identity(
    base_url: &str,
    endpoint: &EndpointDescriptor,
    url: &str,
) -> Option<ResourceIdentity> {
    let rest = url.strip_prefix(base_url.trim_end_matches('/'))?;
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    let mut segments = path.trim_start_matches('/').split('/').peekable();

    if segments.next()? != endpoint.address_prefix {
        return None;
    }
    let convention = AddressConvention::for_endpoint(endpoint);
    if convention == AddressConvention::Modern {
        if let Some(group) = &endpoint.group_name {
            if segments.next()? != group.as_str() {
                return None;
            }
        }
    }
    if segments.next()? != endpoint.version {
        return None;
    }
    if segments.peek() == Some(&"watch") {
        segments.next();
    }

    let mut identity = ResourceIdentity {
        kind: endpoint.kind.clone(),
        version: Some(endpoint.api_version()),
        ..Default::default()
    };

    let scoped = scopes_namespace(endpoint);
    if convention == AddressConvention::Modern && scoped && segments.peek() == Some(&"namespaces") {
        segments.next();
        identity.namespace = Some(decode(segments.next()?)?);
    }
    if segments.next()? != endpoint.plural_name {
        return None;
    }
    if let Some(name) = segments.next() {
        identity.name = Some(decode(name)?);
    }
    if let Some(subresource) = segments.next() {
        identity.subresource = Some(subresource.to_string());
    }

    if convention == AddressConvention::Legacy && scoped {
        identity.namespace = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == NAMESPACE_PARAM)
            .and_then(|(_, v)| decode(v));
    }

    Some(identity)
}

fn decode(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}
