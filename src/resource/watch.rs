//! Watch channel boundary
//!
//! The long-lived duplex channel belongs to the transport; this module covers
//! what it needs from the core: the watch address (resumed from a list's
//! `resourceVersion`), decoding of event messages, the listener contract and
//! translation of channel failures into [`Error`].

use super::address::EndpointAddressBuilder;
use super::catalog::Catalog;
use super::materialize::{MaterializerRegistry, Resource, ResourceList};
use crate::error::{Error, Result, Status};
use serde::Deserialize;
use serde_json::Value;

const RESOURCE_VERSION_PARAM: &str = "resourceVersion";

/// Kind of change carried by a watch event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    #[serde(alias = "Added")]
    Added,
    #[serde(alias = "Modified")]
    Modified,
    #[serde(alias = "Deleted")]
    Deleted,
    #[serde(alias = "Error")]
    Error,
}

/// Raw message as received from the channel
#[derive(Debug, Deserialize)]
struct WatchMessage {
    #[serde(rename = "type")]
    change_type: ChangeType,
    #[serde(default)]
    object: Value,
}

/// A decoded change event
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub change_type: ChangeType,
    pub resource: Resource,
}

/// Receiver of watch notifications
pub trait WatchListener: Send {
    fn on_connect(&mut self) {}

    fn on_event(&mut self, event: WatchEvent);

    fn on_error(&mut self, error: Error) {
        tracing::warn!("Watch error: {}", error);
    }

    fn on_disconnect(&mut self) {}
}

/// Address of a watch on `kind`, resuming after `list`
pub fn watch_address(
    base_url: &str,
    catalog: &Catalog,
    version: Option<&str>,
    kind: &str,
    namespace: Option<&str>,
    list: Option<&ResourceList>,
) -> Result<String> {
    let mut builder = EndpointAddressBuilder::new(base_url, catalog)
        .kind(version, kind)?
        .watch(true);
    if let Some(namespace) = namespace {
        builder = builder.namespace(namespace);
    }
    if let Some(resource_version) = list.and_then(|l| l.resource_version.as_deref()) {
        builder = builder.param(RESOURCE_VERSION_PARAM, resource_version);
    }
    builder.build()
}

/// Translate a failed upgrade or abnormal close into the error taxonomy
pub fn translate_status(url: &str, code: u16, reason: &str) -> Error {
    Error::from_response(url, code, reason)
}

/// Routes channel messages for one watch to its listener
pub struct WatchChannel<L: WatchListener> {
    url: String,
    listener: L,
    materializers: MaterializerRegistry,
    connected: bool,
}

impl<L: WatchListener> WatchChannel<L> {
    pub fn new(url: String, listener: L, materializers: MaterializerRegistry) -> Self {
        Self {
            url,
            listener,
            materializers,
            connected: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// The channel was upgraded successfully
    pub fn connected(&mut self) {
        self.connected = true;
        self.listener.on_connect();
    }

    /// The channel closed; non-success codes are reported as errors first
    pub fn closed(&mut self, code: u16, reason: &str) {
        if !(200..300).contains(&code) && code != 1000 {
            self.listener
                .on_error(translate_status(&self.url, code, reason));
        }
        if self.connected {
            self.connected = false;
            self.listener.on_disconnect();
        }
    }

    /// Decode one message and deliver it
    pub fn dispatch(&mut self, message: &str) {
        match self.decode(message) {
            Ok(event) => self.listener.on_event(event),
            Err(error) => self.listener.on_error(error),
        }
    }

    fn decode(&self, message: &str) -> Result<WatchEvent> {
        let message: WatchMessage = serde_json::from_str(message)?;
        if message.change_type == ChangeType::Error {
            let status: Status = serde_json::from_value(message.object).unwrap_or_default();
            return Err(Error::from_response(&self.url, status.code, &status_body(&status)));
        }
        Ok(WatchEvent {
            change_type: message.change_type,
            resource: self.materializers.materialize(message.object)?,
        })
    }
}

fn status_body(status: &Status) -> String {
    serde_json::json!({
        "code": status.code,
        "message": status.message,
        "reason": status.reason,
    })
    .to_string()
}
