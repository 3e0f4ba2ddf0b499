//! Descriptor records
//!
//! Plain records produced by discovery and owned by the catalog, plus the
//! caller-supplied [`ResourceIdentity`].

use serde::Serialize;
use std::collections::BTreeSet;

use super::kinds;

/// One discovered API surface: a legacy prefix or a named group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiGroupDescriptor {
    pub address_prefix: String,
    /// `None` for legacy surfaces
    pub group_name: Option<String>,
    pub supported_versions: Vec<String>,
    pub preferred_version: Option<String>,
}

impl ApiGroupDescriptor {
    pub fn is_legacy(&self) -> bool {
        self.group_name.is_none()
    }
}

/// Identity key of an [`EndpointDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub address_prefix: String,
    pub group_name: Option<String>,
    pub version: String,
    pub plural_name: String,
}

/// An addressable resource collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub address_prefix: String,
    pub group_name: Option<String>,
    pub version: String,
    pub plural_name: String,
    pub kind: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
    /// Sub-resource suffixes discovered for this collection (`log`, `exec`, ...)
    pub capabilities: BTreeSet<String>,
}

impl EndpointDescriptor {
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            address_prefix: self.address_prefix.clone(),
            group_name: self.group_name.clone(),
            version: self.version.clone(),
            plural_name: self.plural_name.clone(),
        }
    }

    /// True if discovery listed `capability` as a sub-resource of this endpoint
    pub fn is_supported(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// `group/version` for grouped endpoints, bare version for legacy ones
    pub fn api_version(&self) -> String {
        match &self.group_name {
            Some(group) => format!("{}/{}", group, self.version),
            None => self.version.clone(),
        }
    }

    /// Matches a kind by its declared name or its plural form
    pub fn matches_kind(&self, kind: &str) -> bool {
        self.kind == kind || self.plural_name == kinds::pluralize(kind)
    }
}

/// Identity key of a [`TypeDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub group_name: Option<String>,
    pub version: String,
    pub kind: String,
}

/// A (group, version, kind) type known to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub address_prefix: String,
    pub group_name: Option<String>,
    pub version: String,
    pub kind: String,
}

impl TypeDescriptor {
    pub fn key(&self) -> TypeKey {
        TypeKey {
            group_name: self.group_name.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// A requested `apiVersion` split into its group and version parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector<'a> {
    /// No version given: any surface may answer
    Any,
    /// One segment: a bare version or a group name
    Single(&'a str),
    /// Explicit `group/version`
    Grouped { group: &'a str, version: &'a str },
}

impl<'a> VersionSelector<'a> {
    pub fn parse(version: Option<&'a str>) -> Self {
        let Some(version) = version.filter(|v| !v.is_empty()) else {
            return VersionSelector::Any;
        };
        match version.split_once('/') {
            Some((group, version)) => VersionSelector::Grouped { group, version },
            None => VersionSelector::Single(version),
        }
    }
}

/// Caller-supplied address of one remote object or collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub kind: String,
    pub version: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub subresource: Option<String>,
}

impl ResourceIdentity {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
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
}
