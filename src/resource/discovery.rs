//! API discovery
//!
//! Fetches the legacy root documents, the grouped-API root document and every
//! per-version resource list, and feeds them to a [`CatalogBuilder`] in
//! discovery order. Failures are logged per surface and never abort discovery.

use super::catalog::{Catalog, CatalogBuilder};
use super::descriptor::ApiGroupDescriptor;
use super::kinds::{self, GROUPED_PREFIX, LEGACY_SURFACES};
use crate::api::http::HttpTransport;
use crate::error::Result;
use futures::future::join_all;
use serde::Deserialize;

/// `GET /api`, `GET /oapi`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyRootDocument {
    #[serde(default)]
    pub versions: Vec<String>,
}

/// `GET /apis`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupRootDocument {
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<GroupVersionEntry>,
    #[serde(default)]
    pub preferred_version: Option<PreferredVersion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionEntry {
    #[serde(default)]
    pub group_version: Option<String>,
    pub version: String,
}

/// Servers publish the preferred version either as an object or a bare string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PreferredVersion {
    Entry(GroupVersionEntry),
    Plain(String),
}

impl PreferredVersion {
    pub fn version(&self) -> &str {
        match self {
            PreferredVersion::Entry(entry) => &entry.version,
            PreferredVersion::Plain(version) => version,
        }
    }
}

/// `GET /{prefix}[/{group}]/{version}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceListDocument {
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub namespaced: bool,
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl ResourceEntry {
    /// Split `pods/log` into (`pods`, Some(`log`))
    pub fn split_name(&self) -> (&str, Option<&str>) {
        match self.name.split_once('/') {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (self.name.as_str(), None),
        }
    }
}

/// One (surface, version) pair whose resource list must be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceVersion {
    pub address_prefix: String,
    pub group_name: Option<String>,
    pub version: String,
}

impl SurfaceVersion {
    pub fn path(&self) -> String {
        match &self.group_name {
            Some(group) => format!("{}/{}/{}", self.address_prefix, group, self.version),
            None => format!("{}/{}", self.address_prefix, self.version),
        }
    }
}

/// Run the full discovery protocol against `base_url`
pub async fn discover(transport: &HttpTransport, base_url: &str) -> Catalog {
    let base = base_url.trim_end_matches('/');
    let mut builder = CatalogBuilder::new();
    let mut surfaces: Vec<SurfaceVersion> = Vec::new();

    for prefix in LEGACY_SURFACES {
        let url = format!("{}/{}", base, prefix);
        match transport.get_json::<LegacyRootDocument>(&url).await {
            Ok(root) => {
                surfaces.extend(root.versions.iter().map(|version| SurfaceVersion {
                    address_prefix: prefix.to_string(),
                    group_name: None,
                    version: version.clone(),
                }));
                builder.add_group(legacy_group(prefix, root));
            }
            Err(e) => tracing::warn!("Skipping legacy surface {}: {}", prefix, e),
        }
    }

    let url = format!("{}/{}", base, GROUPED_PREFIX);
    match transport.get_json::<GroupRootDocument>(&url).await {
        Ok(root) => {
            for group in root.groups {
                surfaces.extend(group.versions.iter().map(|entry| SurfaceVersion {
                    address_prefix: GROUPED_PREFIX.to_string(),
                    group_name: Some(group.name.clone()),
                    version: entry.version.clone(),
                }));
                builder.add_group(grouped_group(group));
            }
        }
        Err(e) => tracing::warn!("Skipping grouped API discovery: {}", e),
    }

    // Fetched concurrently, merged in discovery order
    let lists = join_all(
        surfaces
            .iter()
            .map(|surface| fetch_resource_list(transport, base, surface)),
    )
    .await;

    for (surface, list) in surfaces.iter().zip(lists) {
        match list {
            Ok(list) => builder.add_resource_list(surface, &list),
            Err(e) => tracing::warn!("Skipping {}: {}", surface.path(), e),
        }
    }

    let catalog = builder.build();
    tracing::info!(
        "Discovery complete: {} surfaces, {} endpoints, {} types",
        catalog.groups().len(),
        catalog.endpoints().len(),
        catalog.types().len()
    );
    catalog
}

async fn fetch_resource_list(
    transport: &HttpTransport,
    base: &str,
    surface: &SurfaceVersion,
) -> Result<ResourceListDocument> {
    transport
        .get_json(&format!("{}/{}", base, surface.path()))
        .await
}

fn legacy_group(prefix: &str, root: LegacyRootDocument) -> ApiGroupDescriptor {
    let preferred_version = kinds::preferred_versions()
        .find(|(surface, _)| *surface == prefix)
        .map(|(_, version)| version.to_string())
        .filter(|version| root.versions.contains(version))
        .or_else(|| root.versions.last().cloned());

    ApiGroupDescriptor {
        address_prefix: prefix.to_string(),
        group_name: None,
        supported_versions: root.versions,
        preferred_version,
    }
}

fn grouped_group(group: GroupEntry) -> ApiGroupDescriptor {
    ApiGroupDescriptor {
        address_prefix: GROUPED_PREFIX.to_string(),
        preferred_version: group
            .preferred_version
            .as_ref()
            .map(|p| p.version().to_string()),
        supported_versions: group.versions.into_iter().map(|v| v.version).collect(),
        group_name: Some(group.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_root_accepts_both_preferred_forms() {
        let root: GroupRootDocument = serde_json::from_str(
            r#"{"groups":[
                {"name":"apps","versions":[{"groupVersion":"apps/v1","version":"v1"}],
                 "preferredVersion":{"groupVersion":"apps/v1","version":"v1"}},
                {"name":"batch","versions":[{"version":"v1"}],"preferredVersion":"v1"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(root.groups.len(), 2);
        let apps = grouped_group(root.groups[0].clone());
        assert_eq!(apps.group_name.as_deref(), Some("apps"));
        assert_eq!(apps.preferred_version.as_deref(), Some("v1"));
        let batch = grouped_group(root.groups[1].clone());
        assert_eq!(batch.preferred_version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_legacy_group_prefers_seeded_version() {
        let root = LegacyRootDocument {
            versions: vec!["v1beta1".into(), "v1".into(), "v2alpha".into()],
        };
        let group = legacy_group("api", root);
        assert!(group.is_legacy());
        assert_eq!(group.preferred_version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_split_name() {
        let entry: ResourceEntry =
            serde_json::from_str(r#"{"name":"pods/log","kind":"Pod","verbs":["get"]}"#).unwrap();
        assert_eq!(entry.split_name(), ("pods", Some("log")));
        assert!(!entry.namespaced);
    }

    #[test]
    fn test_surface_paths() {
        let legacy = SurfaceVersion {
            address_prefix: "api".into(),
            group_name: None,
            version: "v1".into(),
        };
        let grouped = SurfaceVersion {
            address_prefix: "apis".into(),
            group_name: Some("apps".into()),
            version: "v1".into(),
        };
        assert_eq!(legacy.path(), "api/v1");
        assert_eq!(grouped.path(), "apis/apps/v1");
    }
}
