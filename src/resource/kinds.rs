//! Well-known resource kinds
//!
//! Static tables consulted before (or instead of) discovery: irregular plural
//! forms, the kinds that form the namespace root, and the fallback preferred
//! version of each legacy surface.

/// Aggregate kind materialized client-side; never addressable on the server
pub const LIST: &str = "List";
pub const PROJECT: &str = "Project";
pub const NAMESPACE: &str = "Namespace";
pub const POD: &str = "Pod";
pub const BUILD_CONFIG: &str = "BuildConfig";
pub const DEPLOYMENT_CONFIG: &str = "DeploymentConfig";
pub const DEPLOYMENT: &str = "Deployment";
pub const REPLICATION_CONTROLLER: &str = "ReplicationController";
pub const SERVICE: &str = "Service";

/// Legacy, ungrouped surfaces in discovery order
pub const LEGACY_SURFACES: &[&str] = &["api", "oapi"];

/// Address prefix of grouped APIs
pub const GROUPED_PREFIX: &str = "apis";

/// Plural forms that the suffix rules get wrong
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("Endpoints", "endpoints"),
    ("SecurityContextConstraints", "securitycontextconstraints"),
    ("PodSecurityPolicy", "podsecuritypolicies"),
    ("ComponentStatus", "componentstatuses"),
];

/// Fallback preferred version per surface, used before discovery has run
const PREFERRED_VERSIONS: &[(&str, &str)] = &[("api", "v1"), ("oapi", "v1")];

/// Lower-case plural resource name for a kind
pub fn pluralize(kind: &str) -> String {
    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(k, _)| *k == kind) {
        return plural.to_string();
    }

    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh") {
        return format!("{}es", lower);
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", lower)
}

/// True for kinds addressed without a namespace path segment
pub fn is_namespace_root(kind: &str) -> bool {
    kind == PROJECT || kind == NAMESPACE
}

/// Seed table of preferred versions keyed by surface id
pub fn preferred_versions() -> impl Iterator<Item = (&'static str, &'static str)> {
    PREFERRED_VERSIONS.iter().copied()
}
