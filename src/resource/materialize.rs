//! Resource materialization
//!
//! Response bodies become [`Resource`] values through a [`MaterializerRegistry`]
//! keyed by (group, version, kind). Identities without a registered factory
//! fall back to the generic representation.

use super::descriptor::{TypeKey, VersionSelector};
use super::kinds;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Generic JSON-backed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Map<String, Value>);

impl Resource {
    /// Wrap a JSON object; anything else is rejected
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Configuration(format!(
                "Expected a JSON object for a resource, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Build an empty resource of the given type
    pub fn new(api_version: &str, kind: &str) -> Self {
        let mut map = Map::new();
        map.insert("apiVersion".to_string(), Value::String(api_version.to_string()));
        map.insert("kind".to_string(), Value::String(kind.to_string()));
        Self(map)
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(|v| v.as_str())
    }

    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(|v| v.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace")
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata_str("resourceVersion")
    }

    /// String annotations from `metadata.annotations`
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.0
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.as_object())
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_kind(&mut self, kind: &str) {
        self.0.insert("kind".to_string(), Value::String(kind.to_string()));
    }

    pub fn set_api_version(&mut self, api_version: &str) {
        self.0
            .insert("apiVersion".to_string(), Value::String(api_version.to_string()));
    }

    pub fn set_name(&mut self, name: &str) {
        self.set_metadata_field("name", name);
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.set_metadata_field("namespace", namespace);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.0
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(|v| v.as_str())
    }

    fn set_metadata_field(&mut self, field: &str, value: &str) {
        let metadata = self
            .0
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        let value = Value::String(value.to_string());
        if let Value::Object(map) = metadata {
            map.insert(field.to_string(), value);
        } else {
            let mut map = Map::new();
            map.insert(field.to_string(), value);
            *metadata = Value::Object(map);
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Client-side materialization of a list response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    /// Kind of the items, without the `List` suffix
    pub kind: String,
    pub api_version: Option<String>,
    /// Cursor for a subsequent watch
    pub resource_version: Option<String>,
    pub items: Vec<Resource>,
}

/// Factory turning a JSON object into a resource
pub type Materializer = Arc<dyn Fn(Value) -> Result<Resource> + Send + Sync>;

/// Registry of per-type materializers
#[derive(Clone, Default)]
pub struct MaterializerRegistry {
    factories: HashMap<TypeKey, Materializer>,
}

impl MaterializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for one (group, version, kind) identity
    pub fn register<F>(&mut self, api_version: &str, kind: &str, factory: F)
    where
        F: Fn(Value) -> Result<Resource> + Send + Sync + 'static,
    {
        self.factories
            .insert(type_key(Some(api_version), kind), Arc::new(factory));
    }

    pub fn is_registered(&self, api_version: &str, kind: &str) -> bool {
        self.factories
            .contains_key(&type_key(Some(api_version), kind))
    }

    /// Materialize a single object
    pub fn materialize(&self, value: Value) -> Result<Resource> {
        let key = type_key(
            value.get("apiVersion").and_then(|v| v.as_str()),
            value.get("kind").and_then(|v| v.as_str()).unwrap_or_default(),
        );
        match self.factories.get(&key) {
            Some(factory) => factory(value),
            None => Resource::from_value(value),
        }
    }

    /// Decode a response body into a single resource
    pub fn materialize_body(&self, body: &str) -> Result<Resource> {
        let value: Value = serde_json::from_str(body)?;
        self.materialize(value)
    }

    /// Decode a list envelope; items missing `kind`/`apiVersion` inherit them
    pub fn materialize_list(&self, body: &str) -> Result<ResourceList> {
        let envelope: Value = serde_json::from_str(body)?;
        let list_kind = envelope
            .get("kind")
            .and_then(|v| v.as_str())
            .unwrap_or(kinds::LIST);
        let kind = list_kind
            .strip_suffix(kinds::LIST)
            .unwrap_or(list_kind)
            .to_string();
        let api_version = envelope
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let resource_version = envelope
            .get("metadata")
            .and_then(|m| m.get("resourceVersion"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let raw_items = envelope
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut items = Vec::with_capacity(raw_items.len());
        for mut item in raw_items {
            if let Value::Object(ref mut map) = item {
                if !kind.is_empty() && !map.contains_key("kind") {
                    map.insert("kind".to_string(), Value::String(kind.clone()));
                }
                if let Some(api_version) = &api_version {
                    if !map.contains_key("apiVersion") {
                        map.insert("apiVersion".to_string(), Value::String(api_version.clone()));
                    }
                }
            }
            items.push(self.materialize(item)?);
        }

        Ok(ResourceList {
            kind,
            api_version,
            resource_version,
            items,
        })
    }
}

fn type_key(api_version: Option<&str>, kind: &str) -> TypeKey {
    let (group_name, version) = match VersionSelector::parse(api_version) {
        VersionSelector::Any => (None, String::new()),
        VersionSelector::Single(version) => (None, version.to_string()),
        VersionSelector::Grouped { group, version } => {
            (Some(group.to_string()), version.to_string())
        }
    };
    TypeKey {
        group_name,
        version,
        kind: kind.to_string(),
    }
}
